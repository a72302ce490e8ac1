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

//! A matured coinbase is spent on two competing branches; once one
//! branch outweighs the other, the output index should reflect only the
//! winning branch's spend, with the losing branch's own new output gone.

mod common;

use mwc_core::core::transaction::TransactionBody;
use mwc_chain::{ChainView, Status};
use mwc_util::static_secp_instance;
use tempfile::tempdir;

#[test]
fn only_the_winning_branchs_spend_survives_a_reorg() {
	let secp_arc = static_secp_instance();
	let secp = secp_arc.lock().unwrap();

	let (genesis_block, _genesis_unspent, genesis_state) = common::genesis(&secp);
	let dir = tempdir().unwrap();
	let chain = common::setup(dir.path(), genesis_block);

	// Block 1 carries the coinbase that both branches will later race to
	// spend, once it matures at height 1 + coinbase_maturity() (25 under
	// AutomatedTesting).
	let (o1, k1, o1_blind) = common::coinbase_at(&secp, 1, 0);
	let o1_unspent = common::Unspent {
		commit: o1.commit,
		features: o1.features,
		blind: o1_blind,
		value: mwc_core::consensus::REWARD,
	};
	let body1 = TransactionBody::new(vec![], vec![o1], vec![k1]);
	let mut timestamp = 1_700_000_000i64;
	let (block1, mut state) = genesis_state.build_block(body1, timestamp, common::pow_with_nonce(1));
	timestamp += 60;
	assert_eq!(chain.add_block(block1).unwrap(), Status::Success);

    // Blocks 2..=26 are plain coinbase-only blocks, bringing the chain
    // to height 26 - the first height at which the block-1 coinbase
    // (maturing at 1 + 25 = 26) can be spent.
	for height in 2..=26u64 {
		let (out, kernel, _blind) = common::coinbase_at(&secp, height, 0);
		let body = TransactionBody::new(vec![], vec![out], vec![kernel]);
		let pow = common::pow_with_nonce(height);
		let (block, next_state) = state.build_block(body, timestamp, pow);
		timestamp += 60;
		assert_eq!(chain.add_block(block).unwrap(), Status::Success);
		state = next_state;
	}
	let fork_state = state;
	assert_eq!(fork_state.header.height, 26);

	// Branch X: block 27 spends the block-1 coinbase, alongside its own
	// coinbase collecting the spend's 1-unit fee.
	let (x_input, x_output, x_kernel, x_unspent) = common::spend(&secp, "branch-x-change", &o1_unspent, 1);
	let (x_cb_out, x_cb_kernel, _blind) = common::coinbase_at(&secp, 27, 1);
	let x_body = TransactionBody::new(vec![x_input], vec![x_output, x_cb_out], vec![x_kernel, x_cb_kernel]);
	let (x27, _x27_state) = fork_state.build_block(x_body, timestamp, common::pow_with_nonce(27));
	timestamp += 60;
	assert_eq!(chain.add_block(x27.clone()).unwrap(), Status::Success);

	let confirmed = chain.get_tip(ChainView::Confirmed).unwrap();
	assert_eq!(confirmed.hash, x27.hash());
	assert!(chain.get_output_position(&x_unspent.commit).is_ok());
	assert!(chain.get_output_position(&o1_unspent.commit).is_err());

	// Branch Y: block 27' does not spend the coinbase, just a plain
	// coinbase of its own; stored as an unconfirmed side-block since `x27`
	// is already confirmed at the same height.
	let (y_out, y_kernel, _blind) = common::coinbase_at(&secp, 27, 0);
	let y_body = TransactionBody::new(vec![], vec![y_out], vec![y_kernel]);
	let (y27, y27_state) = fork_state.build_block(y_body, timestamp, common::pow_with_nonce(28));
	timestamp += 60;
	assert_eq!(chain.add_block(y27.clone()).unwrap(), Status::Success);
	assert_eq!(chain.get_tip(ChainView::Confirmed).unwrap().hash, x27.hash());

	// Block 28 on branch Y spends the same coinbase, and is mined heavy
	// enough to guarantee the Y branch now outweighs X, forcing a reorg.
	let (z_input, z_output, z_kernel, z_unspent) = common::spend(&secp, "branch-y-change", &o1_unspent, 1);
	let (z_cb_out, z_cb_kernel, _blind) = common::coinbase_at(&secp, 28, 1);
	let z_body = TransactionBody::new(vec![z_input], vec![z_output, z_cb_out], vec![z_kernel, z_cb_kernel]);
	let x27_total_difficulty = x27.header.total_difficulty;
	let needed = x27_total_difficulty.saturating_sub(y27_state.header.total_difficulty);
	let z_pow = common::mine_pow_above(needed);
	let (z28, _z28_state) = y27_state.build_block(z_body, timestamp, z_pow);
	assert!(z28.header.total_difficulty > x27_total_difficulty);

	assert_eq!(chain.add_block(z28.clone()).unwrap(), Status::Success);

	let confirmed = chain.get_tip(ChainView::Confirmed).unwrap();
	assert_eq!(confirmed.hash, z28.hash());
	assert_eq!(confirmed.height, 28);

	// The coinbase is still spent, but now by the Y/Z branch's kernel:
	// X's own change output is gone, Z's is live.
	assert!(chain.get_output_position(&o1_unspent.commit).is_err());
	assert!(chain.get_output_position(&x_unspent.commit).is_err());
	assert!(chain.get_output_position(&z_unspent.commit).is_ok());
}
