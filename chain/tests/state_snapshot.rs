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

//! A `TxHashSet` snapshot survives a zip round-trip: a fresh instance
//! loaded from the archive has identical MMR and leaf-set roots to the
//! one that produced it.

mod common;

use mwc_core::core::transaction::TransactionBody;
use mwc_chain::store::BlockDB;
use mwc_chain::txhashset::TxHashSet;
use mwc_util::static_secp_instance;
use tempfile::tempdir;

#[test]
fn a_snapshot_loaded_from_zip_has_the_same_roots() {
	let secp_arc = static_secp_instance();
	let secp = secp_arc.lock().unwrap();

	let (genesis_block, _genesis_unspent, genesis_state) = common::genesis(&secp);
	let (out1, kernel1, _blind) = common::coinbase_at(&secp, 1, 0);
	let body1 = TransactionBody::new(vec![], vec![out1], vec![kernel1]);
	let (block1, _state) = genesis_state.build_block(body1, 1_700_000_000, common::pow_with_nonce(1));

	let dir = tempdir().unwrap();
	let db = BlockDB::open(dir.path().join("db")).unwrap();
	let mut txhashset = TxHashSet::open(dir.path().join("txhashset")).unwrap();

	for block in [&genesis_block, &block1] {
		let ctx = db.begin_write().unwrap();
		txhashset.apply_block(block, &ctx).unwrap();
		ctx.commit().unwrap();
		txhashset.commit().unwrap();
	}

	let original_roots = txhashset.roots();

	let zip_path = dir.path().join("snapshot.zip");
	txhashset.snapshot(block1.hash(), &zip_path).unwrap();

	let reload_dir = dir.path().join("reloaded");
	let mut reloaded = TxHashSet::load_from_zip(&zip_path, &reload_dir).unwrap();
	let reloaded_roots = reloaded.roots();

	assert_eq!(original_roots, reloaded_roots);
}
