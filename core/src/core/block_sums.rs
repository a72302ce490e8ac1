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

//! `BlockSums`: the running UTXO-sum and kernel-sum commitments carried
//! forward per block, letting the next block's kernel-sum check fold in
//! everything before it without re-summing the whole chain.

use mwc_util::secp::pedersen::Commitment;
use mwc_util::secp_static;

use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// Aggregate balance commitments for a block: the sum of all unspent
/// outputs and the sum of all kernel excesses, as of that block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSums {
	/// Running sum of unspent output commitments.
	pub utxo_sum: Commitment,
	/// Running sum of kernel excess commitments.
	pub kernel_sum: Commitment,
}

impl Default for BlockSums {
	fn default() -> BlockSums {
		let zero_commit = secp_static::commit_to_zero_value();
		BlockSums {
			utxo_sum: zero_commit,
			kernel_sum: zero_commit,
		}
	}
}

impl Writeable for BlockSums {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.utxo_sum.write(writer)?;
		self.kernel_sum.write(writer)
	}
}

impl Readable for BlockSums {
	fn read(reader: &mut dyn Reader) -> Result<BlockSums, ser::Error> {
		Ok(BlockSums {
			utxo_sum: Commitment::read(reader)?,
			kernel_sum: Commitment::read(reader)?,
		})
	}
}
