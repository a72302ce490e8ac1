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

//! Core data types: hashes, the blinding factor, transaction components,
//! blocks and the Merkle Mountain Range geometry that indexes them.

pub mod blinding;
pub mod block;
pub mod block_sums;
pub mod committed;
pub mod hash;
pub mod pedersen_ser;
pub mod pmmr;
pub mod transaction;

pub use self::blinding::BlindingFactor;
pub use self::block::{BlockHeader, FullBlock, ProofOfWork};
pub use self::block_sums::BlockSums;
pub use self::committed::Committed;
pub use self::hash::{Hash, Hashed};
pub use self::transaction::{
	KernelFeatures, OutputFeatures, OutputIdentity, TransactionBody, TransactionInput,
	TransactionKernel, TransactionOutput,
};
