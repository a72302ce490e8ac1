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

//! Two sibling blocks at the same height, arriving out of difficulty
//! order: the confirmed tip should follow whichever has accumulated the
//! most difficulty, not whichever arrived first.

mod common;

use mwc_core::core::transaction::TransactionBody;
use mwc_chain::{ChainView, Status};
use mwc_util::static_secp_instance;
use tempfile::tempdir;

#[test]
fn a_higher_difficulty_sibling_reorgs_the_confirmed_tip() {
	let secp_arc = static_secp_instance();
	let secp = secp_arc.lock().unwrap();

	let (genesis_block, _genesis_unspent, genesis_state) = common::genesis(&secp);
	let dir = tempdir().unwrap();
	let chain = common::setup(dir.path(), genesis_block);

	// `a` extends genesis and becomes the shared ancestor of both forks.
	let (a_out, a_kernel, _blind) = common::coinbase_at(&secp, 1, 0);
	let a_body = TransactionBody::new(vec![], vec![a_out], vec![a_kernel]);
	let (a, a_state) = genesis_state.build_block(a_body, 1_700_000_000, common::pow_with_nonce(100));
	assert_eq!(chain.add_block(a.clone()).unwrap(), Status::Success);

	// Sibling `b_prime`: built with a plain, unsearched nonce.
	let (bp_out, bp_kernel, _blind) = common::coinbase_at(&secp, 2, 0);
	let bp_body = TransactionBody::new(vec![], vec![bp_out], vec![bp_kernel]);
	let (b_prime, b_prime_state) = a_state.build_block(bp_body, 1_700_000_060, common::pow_with_nonce(1));

	// Sibling `b`: mined to guarantee it outweighs `b_prime`.
	let (b_out, b_kernel, _blind) = common::coinbase_at(&secp, 2, 1);
	let b_body = TransactionBody::new(vec![], vec![b_out], vec![b_kernel]);
	let b_pow = common::mine_pow_above(b_prime_state.header.total_difficulty - a_state.header.total_difficulty);
	let (b, b_state) = a_state.build_block(b_body, 1_700_000_061, b_pow);
	assert!(b.header.total_difficulty > b_prime.header.total_difficulty);

	// Headers arrive ahead of the full blocks, `header(b)` before
	// `header(b_prime)`: the candidate tip already tracks the eventual
	// winner before any full block shows up.
	assert_eq!(chain.add_header(b.header.clone()).unwrap(), Status::Success);
	assert_eq!(chain.add_header(b_prime.header.clone()).unwrap(), Status::Success);
	let candidate = chain.get_tip(ChainView::Candidate).unwrap();
	assert_eq!(candidate.hash, b.hash());

	// `block(b_prime)` arrives first and becomes confirmed, even though
	// it isn't the candidate tip.
	assert_eq!(chain.add_block(b_prime.clone()).unwrap(), Status::Success);
	let confirmed = chain.get_tip(ChainView::Confirmed).unwrap();
	assert_eq!(confirmed.hash, b_prime.hash());
	assert_eq!(chain.get_block_by_height(2).unwrap().hash(), b_prime.hash());

	// `block(b)` arrives next, outweighs `b_prime`, and reorgs the
	// confirmed chain at the same height.
	assert_eq!(chain.add_block(b.clone()).unwrap(), Status::Success);
	let confirmed = chain.get_tip(ChainView::Confirmed).unwrap();
	assert_eq!(confirmed.hash, b.hash());
	assert_eq!(confirmed.height, 2);
	assert_eq!(chain.get_block_by_height(2).unwrap().hash(), b.hash());

	// `block(c)` extends the new winner further.
	let (c_out, c_kernel, _blind) = common::coinbase_at(&secp, 3, 0);
	let c_body = TransactionBody::new(vec![], vec![c_out], vec![c_kernel]);
	let (c, _c_state) = b_state.build_block(c_body, 1_700_000_120, common::pow_with_nonce(2));
	assert_eq!(chain.add_block(c.clone()).unwrap(), Status::Success);
	let confirmed = chain.get_tip(ChainView::Confirmed).unwrap();
	assert_eq!(confirmed.hash, c.hash());
	assert_eq!(confirmed.height, 3);

	// `b_prime` is now a side block, displaced from the confirmed view by
	// `b`. Resubmitting it must still short-circuit as `AlreadyExists`
	// rather than re-running the validators and persisting it again.
	assert_eq!(chain.add_block(b_prime).unwrap(), Status::AlreadyExists);
}
