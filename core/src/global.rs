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

//! Process-global chain type selector. The only consensus parameter that
//! varies by chain type in this core is coinbase maturity; everything
//! else in `consensus` is a fixed constant. Kept as a `RwLock` behind a
//! `lazy_static`, set once at process start by the surrounding server.

use std::sync::RwLock;

use crate::consensus::{COINBASE_MATURITY, TESTING_COINBASE_MATURITY};

/// Selects which set of chain parameters is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainTypes {
	/// Fast, low-maturity parameters for automated test suites.
	AutomatedTesting,
	/// Production parameters.
	Mainnet,
}

lazy_static! {
	static ref CHAIN_TYPE: RwLock<ChainTypes> = RwLock::new(ChainTypes::Mainnet);
}

/// Sets the process-wide chain type. Intended to be called once, early in
/// process start-up, before any header or block is processed.
pub fn set_chain_type(chain_type: ChainTypes) {
	let mut current = CHAIN_TYPE.write().unwrap();
	*current = chain_type;
}

/// The active chain type.
pub fn chain_type() -> ChainTypes {
	*CHAIN_TYPE.read().unwrap()
}

/// Coinbase maturity, in blocks, for the active chain type: 25 under
/// `AutomatedTesting`, 1440 on `Mainnet`.
pub fn coinbase_maturity() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => TESTING_COINBASE_MATURITY,
		ChainTypes::Mainnet => COINBASE_MATURITY,
	}
}

/// True when running under the automated-testing chain type.
pub fn is_automated_testing_mode() -> bool {
	chain_type() == ChainTypes::AutomatedTesting
}

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::Mutex;

	lazy_static! {
		static ref TEST_LOCK: Mutex<()> = Mutex::new(());
	}

	#[test]
	fn coinbase_maturity_follows_chain_type() {
		let _guard = TEST_LOCK.lock().unwrap();
		set_chain_type(ChainTypes::AutomatedTesting);
		assert_eq!(coinbase_maturity(), TESTING_COINBASE_MATURITY);
		set_chain_type(ChainTypes::Mainnet);
		assert_eq!(coinbase_maturity(), COINBASE_MATURITY);
	}
}
