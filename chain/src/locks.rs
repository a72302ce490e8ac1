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

//! Lock ordering for the two stateful stores the chain manager guards:
//! `BlockDB` and `TxHashSet`, each single-writer/multi-reader. A writer
//! that needs both always takes `BlockDB` first, `TxHashSet` second;
//! readers only ever take one at a time. Fixing the order here, in one
//! place, is what keeps a concurrent header-sync reader and a block
//! writer from deadlocking on each other.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::store::BlockDB;
use crate::txhashset::TxHashSet;

/// Owns the two guarded stores and hands out guards in the fixed order.
pub struct ChainStore {
	db: RwLock<BlockDB>,
	txhashset: RwLock<TxHashSet>,
}

impl ChainStore {
	pub fn new(db: BlockDB, txhashset: TxHashSet) -> ChainStore {
		ChainStore {
			db: RwLock::new(db),
			txhashset: RwLock::new(txhashset),
		}
	}

	/// Read-only access to the block database alone.
	pub fn db_read(&self) -> RwLockReadGuard<'_, BlockDB> {
		self.db.read().unwrap()
	}

	/// Read-only access to the UTXO state alone.
	pub fn txhashset_read(&self) -> RwLockReadGuard<'_, TxHashSet> {
		self.txhashset.read().unwrap()
	}

	/// Acquires both stores for writing, `BlockDB` first. Any code path
	/// that needs to mutate both must go through this rather than taking
	/// the two locks separately, or a reversed acquisition elsewhere could
	/// deadlock against it.
	pub fn write_both(&self) -> (RwLockWriteGuard<'_, BlockDB>, RwLockWriteGuard<'_, TxHashSet>) {
		let db = self.db.write().unwrap();
		let txhashset = self.txhashset.write().unwrap();
		(db, txhashset)
	}
}
