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

//! `BlockHeader`, `ProofOfWork` and `FullBlock`. The header hash and the
//! block's `validated` flag are both one-shot memos over an otherwise
//! immutable value: a `Cell` guarded by ownership rather than a lock,
//! safe because nothing else can observe the value mid-mutation.

use std::cell::Cell;

use crate::core::blinding::BlindingFactor;
use crate::core::committed::Committed;
use crate::core::hash::{Hash, Hashed, ZERO_HASH};
use crate::core::transaction::{KernelFeatures, TransactionBody};
use crate::ser::{self, Readable, Reader, Writeable, Writer};
use mwc_util::secp::pedersen::Commitment;

/// A block's proof-of-work payload: a Cuckoo-style cycle solution plus the
/// secondary scaling factor needed to normalize its difficulty. Generating
/// a valid proof (mining) is out of scope here; only the structural shape
/// and a difficulty readout are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
	/// Secondary scaling factor used to normalize a secondary-algorithm
	/// proof's difficulty against the primary algorithm.
	pub secondary_scaling: u32,
	/// The nonce used to derive the proof seed.
	pub nonce: u64,
	/// The cycle's edge indices, in the order produced by the solver.
	pub proof_nonces: Vec<u64>,
}

impl ProofOfWork {
	/// An all-zero proof, used for genesis and in tests.
	pub fn zero() -> ProofOfWork {
		ProofOfWork {
			secondary_scaling: 0,
			nonce: 0,
			proof_nonces: vec![],
		}
	}

	/// Structural validity: edge indices must be non-empty and pairwise
	/// distinct. Full cycle verification is assumed to live in the
	/// external crypto library this core treats as a capability.
	pub fn is_well_formed(&self) -> bool {
		if self.proof_nonces.is_empty() {
			return false;
		}
		let mut sorted = self.proof_nonces.clone();
		sorted.sort_unstable();
		sorted.windows(2).all(|w| w[0] != w[1])
	}

	/// A difficulty value derived from the hash of the proof, scaled by
	/// `secondary_scaling`. Lower proof hash -> higher difficulty, as in
	/// any hashcash-style scheme.
	pub fn to_difficulty(&self) -> u128 {
		let h = self.hash();
		let leading = h.as_bytes().iter().take(16).fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
		let scale = u128::from(self.secondary_scaling.max(1));
		(u128::MAX / leading.max(1)) / scale
	}
}

impl Writeable for ProofOfWork {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u32(self.secondary_scaling)?;
		writer.write_u64(self.nonce)?;
		self.proof_nonces.write(writer)
	}
}

impl Readable for ProofOfWork {
	fn read(reader: &mut dyn Reader) -> Result<ProofOfWork, ser::Error> {
		let secondary_scaling = reader.read_u32()?;
		let nonce = reader.read_u64()?;
		let proof_nonces = Vec::<u64>::read(reader)?;
		Ok(ProofOfWork {
			secondary_scaling,
			nonce,
			proof_nonces,
		})
	}
}

/// A block header. Height, MMR sizes and accumulated difficulty describe
/// the chain position; the kernel offset and timestamp are consensus
/// inputs; the hash is a pure function of all of it, memoized on first
/// use.
#[derive(Debug, Clone)]
pub struct BlockHeader {
	/// Height of this block since genesis (height 0).
	pub height: u64,
	/// Hash of the block immediately preceding this one.
	pub previous: Hash,
	/// Size of the output MMR, in nodes, after applying this block.
	pub output_mmr_size: u64,
	/// Size of the kernel MMR, in nodes, after applying this block.
	pub kernel_mmr_size: u64,
	/// Total accumulated difficulty up to and including this block.
	pub total_difficulty: u128,
	/// Sum of the per-transaction kernel offsets aggregated into this
	/// block, carried forward cumulatively from genesis.
	pub total_kernel_offset: BlindingFactor,
	/// Block creation time, Unix seconds.
	pub timestamp: i64,
	/// The proof of work solving this header.
	pub pow: ProofOfWork,
	hash_cache: Cell<Option<Hash>>,
}

impl PartialEq for BlockHeader {
	fn eq(&self, other: &Self) -> bool {
		self.hash() == other.hash()
	}
}

impl Eq for BlockHeader {}

impl Default for BlockHeader {
	fn default() -> BlockHeader {
		BlockHeader {
			height: 0,
			previous: ZERO_HASH,
			output_mmr_size: 0,
			kernel_mmr_size: 0,
			total_difficulty: 0,
			total_kernel_offset: BlindingFactor::zero(),
			timestamp: 0,
			pow: ProofOfWork::zero(),
			hash_cache: Cell::new(None),
		}
	}
}

impl Writeable for BlockHeader {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.height)?;
		self.previous.write(writer)?;
		writer.write_u64(self.output_mmr_size)?;
		writer.write_u64(self.kernel_mmr_size)?;
		writer.write_u128(self.total_difficulty)?;
		self.total_kernel_offset.write(writer)?;
		writer.write_i64(self.timestamp)?;
		self.pow.write(writer)
	}
}

impl Readable for BlockHeader {
	fn read(reader: &mut dyn Reader) -> Result<BlockHeader, ser::Error> {
		let height = reader.read_u64()?;
		let previous = Hash::read(reader)?;
		let output_mmr_size = reader.read_u64()?;
		let kernel_mmr_size = reader.read_u64()?;
		let total_difficulty = reader.read_u128()?;
		let total_kernel_offset = BlindingFactor::read(reader)?;
		let timestamp = reader.read_i64()?;
		let pow = ProofOfWork::read(reader)?;
		Ok(BlockHeader {
			height,
			previous,
			output_mmr_size,
			kernel_mmr_size,
			total_difficulty,
			total_kernel_offset,
			timestamp,
			pow,
			hash_cache: Cell::new(None),
		})
	}
}

impl BlockHeader {
	/// The header's hash, computed once and memoized. Safe without a lock
	/// because a `BlockHeader` is never mutated after construction - the
	/// cache is filled at most once, always with the same value. Shadows
	/// the blanket `Hashed` impl this type also gets from `Writeable`;
	/// callers going through `.hash()` always hit this memoized path.
	pub fn hash(&self) -> Hash {
		if let Some(h) = self.hash_cache.get() {
			return h;
		}
		let h = <Self as Hashed>::hash(self);
		self.hash_cache.set(Some(h));
		h
	}
}

/// A full block: a header plus its transaction body (inputs, outputs,
/// kernels already sorted and cut-through-free). `validated` is a
/// monotone `false -> true` memo set by the validator once this exact
/// block instance has passed self-consistency and kernel-sum checks; it
/// is never persisted.
#[derive(Debug, Clone)]
pub struct FullBlock {
	/// The block header.
	pub header: BlockHeader,
	/// The block's transaction body.
	pub body: TransactionBody,
	validated: Cell<bool>,
}

impl FullBlock {
	/// Builds a new block from a header and body.
	pub fn new(header: BlockHeader, body: TransactionBody) -> FullBlock {
		FullBlock {
			header,
			body,
			validated: Cell::new(false),
		}
	}

	/// Whether this exact instance has already passed validation.
	pub fn is_validated(&self) -> bool {
		self.validated.get()
	}

	/// Marks this instance validated. Idempotent; never transitions back.
	pub fn mark_validated(&self) {
		self.validated.set(true);
	}

	/// The block's hash is its header's hash.
	pub fn hash(&self) -> Hash {
		self.header.hash()
	}
}

impl Writeable for FullBlock {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.header.write(writer)?;
		self.body.write(writer)
	}
}

impl Readable for FullBlock {
	fn read(reader: &mut dyn Reader) -> Result<FullBlock, ser::Error> {
		let header = BlockHeader::read(reader)?;
		let body = TransactionBody::read(reader)?;
		Ok(FullBlock::new(header, body))
	}
}

impl Committed for FullBlock {
	fn inputs_committed(&self) -> Vec<Commitment> {
		self.body.inputs_committed()
	}
	fn outputs_committed(&self) -> Vec<Commitment> {
		self.body.outputs_committed()
	}
	fn kernels_committed(&self) -> Vec<Commitment> {
		self.body.kernels_committed()
	}
}

impl FullBlock {
	/// True if exactly one kernel carries the `COINBASE` feature.
	pub fn has_single_coinbase_kernel(&self) -> bool {
		self.body
			.kernels
			.iter()
			.filter(|k| k.features.contains(KernelFeatures::COINBASE))
			.count()
			== 1
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn header_hash_is_memoized_and_stable() {
		let header = BlockHeader::default();
		let h1 = header.hash();
		let h2 = header.hash();
		assert_eq!(h1, h2);
	}

	#[test]
	fn different_heights_hash_differently() {
		let mut a = BlockHeader::default();
		a.height = 1;
		let mut b = BlockHeader::default();
		b.height = 2;
		assert_ne!(a.hash(), b.hash());
	}

	#[test]
	fn header_roundtrips_through_ser() {
		let mut header = BlockHeader::default();
		header.height = 42;
		header.total_difficulty = 1_000_000;
		let bytes = ser::ser_vec(&header).unwrap();
		let back: BlockHeader = ser::deserialize(&mut &bytes[..]).unwrap();
		assert_eq!(header.hash(), back.hash());
		assert_eq!(back.height, 42);
	}

	#[test]
	fn validated_flag_is_one_shot() {
		let block = FullBlock::new(BlockHeader::default(), TransactionBody::empty());
		assert!(!block.is_validated());
		block.mark_validated();
		assert!(block.is_validated());
	}

	#[test]
	fn malformed_pow_has_duplicate_nonces() {
		let pow = ProofOfWork {
			secondary_scaling: 1,
			nonce: 0,
			proof_nonces: vec![1, 2, 2, 3],
		};
		assert!(!pow.is_well_formed());
	}
}
