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

//! Small value types shared across the block database, the TxHashSet and
//! the chain manager: where an output lives in the MMRs, what replaces it
//! when it's spent, which chain view a query targets, and a chain tip.

use mwc_core::core::hash::Hash;
use mwc_core::ser::{self, Readable, Reader, Writeable, Writer};
use mwc_util::secp::pedersen::Commitment;

/// Where an unspent output lives: its position in the output (and
/// range-proof) MMRs, and the height of the block that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLocation {
	/// 1-based position in the output and range-proof MMRs.
	pub mmr_index: u64,
	/// Height of the block that created this output.
	pub height: u64,
}

impl Writeable for OutputLocation {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.mmr_index)?;
		writer.write_u64(self.height)
	}
}

impl Readable for OutputLocation {
	fn read(reader: &mut dyn Reader) -> Result<OutputLocation, ser::Error> {
		Ok(OutputLocation {
			mmr_index: reader.read_u64()?,
			height: reader.read_u64()?,
		})
	}
}

/// A spent output: its commitment, plus the location it occupied before
/// being spent. Recorded per-block so a rewind can restore exactly what
/// was unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpentOutput {
	/// Commitment of the spent output.
	pub commit: Commitment,
	/// Location the output occupied prior to being spent.
	pub location: OutputLocation,
}

impl Writeable for SpentOutput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.commit.write(writer)?;
		self.location.write(writer)
	}
}

impl Readable for SpentOutput {
	fn read(reader: &mut dyn Reader) -> Result<SpentOutput, ser::Error> {
		Ok(SpentOutput {
			commit: Commitment::read(reader)?,
			location: OutputLocation::read(reader)?,
		})
	}
}

/// Version-tagged list of spent outputs, as stored under
/// `SPENT_OUTPUTS[hash]`: `u8 version || u16 count || count * SpentOutput`.
const SPENT_OUTPUTS_VERSION: u8 = 1;

/// Wrapper giving `Vec<SpentOutput>` its on-disk framing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpentOutputs(pub Vec<SpentOutput>);

impl Writeable for SpentOutputs {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(SPENT_OUTPUTS_VERSION)?;
		writer.write_u16(self.0.len() as u16)?;
		for spent in &self.0 {
			spent.write(writer)?;
		}
		Ok(())
	}
}

impl Readable for SpentOutputs {
	fn read(reader: &mut dyn Reader) -> Result<SpentOutputs, ser::Error> {
		let _version = reader.read_u8()?;
		let count = reader.read_u16()?;
		let mut out = Vec::with_capacity(count as usize);
		for _ in 0..count {
			out.push(SpentOutput::read(reader)?);
		}
		Ok(SpentOutputs(out))
	}
}

/// Which of the two chain views a query or ingest targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainView {
	/// The best header chain by total difficulty, possibly ahead of
	/// `Confirmed`.
	Candidate,
	/// The longest fully-validated chain.
	Confirmed,
}

/// A chain's current head: its tip hash, height and accumulated
/// difficulty, enough to decide whether a competing branch wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tip {
	/// Hash of the tip block or header.
	pub hash: Hash,
	/// Height of the tip.
	pub height: u64,
	/// Total accumulated difficulty of the tip.
	pub total_difficulty: u128,
}

impl Tip {
	/// The all-zero genesis-parent tip: height 0, no difficulty.
	pub fn genesis(hash: Hash) -> Tip {
		Tip {
			hash,
			height: 0,
			total_difficulty: 0,
		}
	}
}

impl Writeable for Tip {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.hash.write(writer)?;
		writer.write_u64(self.height)?;
		writer.write_u128(self.total_difficulty)
	}
}

impl Readable for Tip {
	fn read(reader: &mut dyn Reader) -> Result<Tip, ser::Error> {
		Ok(Tip {
			hash: Hash::read(reader)?,
			height: reader.read_u64()?,
			total_difficulty: reader.read_u128()?,
		})
	}
}

/// Per-hash processing state tracked by the chain manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
	/// Never seen.
	Unknown,
	/// Header accepted, full block not yet seen.
	HeaderOnly,
	/// Full block received but its parent isn't confirmed yet.
	Orphan,
	/// Fully validated and applied.
	Confirmed,
	/// Failed validation; will not be retried.
	Rejected,
}
