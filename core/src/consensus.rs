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

//! Consensus-relevant constants. Tuning these is explicitly out of scope
//! for this core - they are fixed points the validators and chain manager
//! are written against, not knobs exposed to callers.

/// The fixed block subsidy paid to the coinbase output of every block.
pub const REWARD: u64 = 60_000_000_000;

/// Minimum fee a kernel must carry to be accepted.
pub const BASE_FEE: u64 = 1;

/// Coinbase maturity, in blocks, on mainnet: a coinbase output cannot be
/// spent until `height + COINBASE_MATURITY`.
pub const COINBASE_MATURITY: u64 = 1_440;

/// Coinbase maturity, in blocks, under the automated-testing chain type.
pub const TESTING_COINBASE_MATURITY: u64 = 25;

/// The maximum number of inputs, outputs or kernels a transaction body may
/// declare and still be deserializable - a DoS guard, not a block-size rule.
pub const MAX_IN_OUT_LEN: u64 = 50_000;

/// Default cap on the orphan pool; the oldest entry is evicted once full.
pub const MAX_ORPHAN_POOL_SIZE: usize = 512;

/// Size of the header LRU cache kept by the block database.
pub const HEADER_CACHE_SIZE: usize = 128;
