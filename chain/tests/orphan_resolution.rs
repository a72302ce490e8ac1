// Copyright 2019 The Chain Core Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A block arriving before its parent is buffered rather than rejected,
//! and is resolved - either automatically once the parent lands, or by
//! explicitly draining the orphan pool.

mod common;

use mwc_core::core::transaction::TransactionBody;
use mwc_chain::{ChainView, Status};
use mwc_util::static_secp_instance;
use tempfile::tempdir;

#[test]
fn a_block_seen_before_its_parent_is_buffered_then_resolved() {
	let secp_arc = static_secp_instance();
	let secp = secp_arc.lock().unwrap();

	let (genesis_block, _genesis_unspent, genesis_state) = common::genesis(&secp);
	let dir = tempdir().unwrap();
	let chain = common::setup(dir.path(), genesis_block);

	let (a1_out, a1_kernel, _blind) = common::coinbase_at(&secp, 1, 0);
	let a1_body = TransactionBody::new(vec![], vec![a1_out], vec![a1_kernel]);
	let (a1, a1_state) = genesis_state.build_block(a1_body, 1_700_000_000, common::pow_with_nonce(1));

	let (a2_out, a2_kernel, _blind) = common::coinbase_at(&secp, 2, 0);
	let a2_body = TransactionBody::new(vec![], vec![a2_out], vec![a2_kernel]);
	let (a2, _a2_state) = a1_state.build_block(a2_body, 1_700_000_060, common::pow_with_nonce(2));

	// `a2` arrives first: its parent `a1` is unknown, so it's buffered.
	assert_eq!(chain.add_block(a2.clone()).unwrap(), Status::Orphaned);
	assert_eq!(chain.orphan_count(), 1);
	assert!(chain.get_block_by_hash(&a2.hash()).is_err());

	// Nothing is ready to resolve yet.
	assert_eq!(chain.process_next_orphan().unwrap(), false);
	assert_eq!(chain.orphan_count(), 1);

	// `a1` arrives and is accepted; `a2` is automatically resolved as a
	// direct consequence, draining the orphan pool.
	assert_eq!(chain.add_block(a1.clone()).unwrap(), Status::Success);
	assert_eq!(chain.orphan_count(), 0);

	let confirmed = chain.get_tip(ChainView::Confirmed).unwrap();
	assert_eq!(confirmed.hash, a2.hash());
	assert_eq!(confirmed.height, 2);
	assert_eq!(chain.get_block_by_height(1).unwrap().hash(), a1.hash());
	assert_eq!(chain.get_block_by_height(2).unwrap().hash(), a2.hash());

	// Draining an already-empty pool is a no-op, not an error.
	assert_eq!(chain.process_next_orphan().unwrap(), false);
}
