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

//! Inputs, outputs, kernels and the `TransactionBody` that holds them in
//! canonical (sorted, deduplicated) order. A body on its own carries no
//! kernel offset - that lives on the enclosing block header - so it
//! cannot be kernel-sum verified in isolation; see `Committed`.

use mwc_util::secp::pedersen::{Commitment, RangeProof};

use crate::core::committed::Committed;
use crate::core::hash::{Hash, Hashed};
use crate::ser::{self, Readable, Reader, Writeable, Writer};

bitflags! {
	/// Options for a transaction kernel.
	pub struct KernelFeatures: u8 {
		/// Plain kernel (the vast majority of kernels).
		const PLAIN = 0b0000_0000;
		/// Coinbase kernel - exactly one per block, carries no fee.
		const COINBASE = 0b0000_0001;
	}
}

bitflags! {
	/// Options for a transaction output.
	pub struct OutputFeatures: u8 {
		/// Plain output.
		const PLAIN = 0b0000_0000;
		/// Coinbase output - subject to maturity lock.
		const COINBASE = 0b0000_0001;
	}
}

/// A reference to a previously created output, identified by the
/// commitment it is spending.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransactionInput {
	/// The features of the output being spent.
	pub features: OutputFeatures,
	/// The commitment referencing the output being spent.
	pub commit: Commitment,
}

impl TransactionInput {
	/// Builds a new input.
	pub fn new(features: OutputFeatures, commit: Commitment) -> TransactionInput {
		TransactionInput { features, commit }
	}
}

impl Writeable for TransactionInput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.features.bits())?;
		self.commit.write(writer)
	}
}

impl Readable for TransactionInput {
	fn read(reader: &mut dyn Reader) -> Result<TransactionInput, ser::Error> {
		let features =
			OutputFeatures::from_bits(reader.read_u8()?).ok_or(ser::Error::CorruptedData)?;
		let commit = Commitment::read(reader)?;
		Ok(TransactionInput { features, commit })
	}
}

/// A transaction output: a commitment to a value plus a range proof that
/// the committed value is non-negative. The output hash covers only
/// `features ‖ commitment` - never the (large) range proof - since that
/// hash is what the output and leaf-set MMRs index by.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutput {
	/// Options for an output's structure or use.
	pub features: OutputFeatures,
	/// The homomorphic commitment representing the output amount.
	pub commit: Commitment,
	/// A proof that the commitment is to a non-negative value.
	pub proof: RangeProof,
}

impl Eq for TransactionOutput {}

impl TransactionOutput {
	/// Builds a new output.
	pub fn new(features: OutputFeatures, commit: Commitment, proof: RangeProof) -> TransactionOutput {
		TransactionOutput {
			features,
			commit,
			proof,
		}
	}

	/// The hash used to identify this output in the MMR and leaf-set:
	/// `BLAKE2b(features ‖ commitment)`, deliberately excluding the proof.
	pub fn id_hash(&self) -> Hash {
		let mut ctx = blake2_rfc::blake2b::Blake2b::new(crate::core::hash::HASH_SIZE);
		ctx.update(&[self.features.bits()]);
		ctx.update(self.commit.as_ref());
		let digest = ctx.finalize();
		Hash::from_bytes(digest.as_bytes()).expect("blake2b-256 output is exactly 32 bytes")
	}
}

impl Writeable for TransactionOutput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.features.bits())?;
		self.commit.write(writer)?;
		self.proof.write(writer)
	}
}

impl Readable for TransactionOutput {
	fn read(reader: &mut dyn Reader) -> Result<TransactionOutput, ser::Error> {
		let features =
			OutputFeatures::from_bits(reader.read_u8()?).ok_or(ser::Error::CorruptedData)?;
		let commit = Commitment::read(reader)?;
		let proof = RangeProof::read(reader)?;
		Ok(TransactionOutput {
			features,
			commit,
			proof,
		})
	}
}

/// The identity of an output as recorded in the output MMR and the
/// leaf-sets: `features ‖ commitment`, byte-for-byte what `id_hash`
/// hashes. Kept as its own `Writeable` type (rather than reusing
/// `TransactionOutput`) so the output MMR's leaf hash never depends on
/// the (large, separately-pruned) range proof.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutputIdentity {
	/// The features of the output this identifies.
	pub features: OutputFeatures,
	/// The commitment of the output this identifies.
	pub commit: Commitment,
}

impl<'a> From<&'a TransactionOutput> for OutputIdentity {
	fn from(output: &'a TransactionOutput) -> OutputIdentity {
		OutputIdentity {
			features: output.features,
			commit: output.commit,
		}
	}
}

impl Writeable for OutputIdentity {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.features.bits())?;
		self.commit.write(writer)
	}
}

impl Readable for OutputIdentity {
	fn read(reader: &mut dyn Reader) -> Result<OutputIdentity, ser::Error> {
		let features =
			OutputFeatures::from_bits(reader.read_u8()?).ok_or(ser::Error::CorruptedData)?;
		let commit = Commitment::read(reader)?;
		Ok(OutputIdentity { features, commit })
	}
}

/// A transaction kernel: the public remainder of a transaction's
/// commitments, carrying the fee and a signature proving the excess is a
/// valid public key (and hence that inputs and outputs balance).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransactionKernel {
	/// Options for a kernel's structure or use.
	pub features: KernelFeatures,
	/// Fee paid by this transaction.
	pub fee: u64,
	/// This kernel is not valid earlier than this block height.
	pub lock_height: u64,
	/// Remainder of the sum of all transaction commitments.
	pub excess: Commitment,
	/// The signature proving the excess is a valid public key, signing
	/// `(features, fee, lock_height)`.
	pub excess_sig: Vec<u8>,
}

impl Writeable for TransactionKernel {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.features.bits())?;
		writer.write_u64(self.fee)?;
		writer.write_u64(self.lock_height)?;
		self.excess.write(writer)?;
		writer.write_bytes(&self.excess_sig)
	}
}

impl Readable for TransactionKernel {
	fn read(reader: &mut dyn Reader) -> Result<TransactionKernel, ser::Error> {
		let features =
			KernelFeatures::from_bits(reader.read_u8()?).ok_or(ser::Error::CorruptedData)?;
		let fee = reader.read_u64()?;
		let lock_height = reader.read_u64()?;
		let excess = Commitment::read(reader)?;
		let excess_sig = reader.read_bytes()?;
		Ok(TransactionKernel {
			features,
			fee,
			lock_height,
			excess,
			excess_sig,
		})
	}
}

/// The sorted, deduplicated body of a transaction or block: inputs,
/// outputs and kernels, each in canonical (hash-ascending) order. A body
/// built through `new`/`with_*` is always in this order; `validate_sorted`
/// is the invariant checker run on anything deserialized from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionBody {
	/// List of inputs spent by the transaction.
	pub inputs: Vec<TransactionInput>,
	/// List of outputs the transaction produces.
	pub outputs: Vec<TransactionOutput>,
	/// List of kernels the transaction includes.
	pub kernels: Vec<TransactionKernel>,
}

/// Body self-consistency failures: anything checkable with no chain
/// context (sort order, cut-through).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// Inputs, outputs or kernels are not in strictly ascending order -
	/// this also catches a repeated hash, since two equal elements can
	/// never be strictly ordered.
	SortOrder,
	/// An output produced by this body is also spent by it.
	CutThrough,
}

impl TransactionBody {
	/// Builds an empty body.
	pub fn empty() -> TransactionBody {
		TransactionBody::default()
	}

	/// Builds a body from the given parts, sorting each collection into
	/// canonical order.
	pub fn new(
		mut inputs: Vec<TransactionInput>,
		mut outputs: Vec<TransactionOutput>,
		mut kernels: Vec<TransactionKernel>,
	) -> TransactionBody {
		inputs.sort_by_key(|i| i.commit.as_ref().to_vec());
		outputs.sort_by_key(|o| o.id_hash());
		kernels.sort_by_key(|k| k.hash());
		TransactionBody {
			inputs,
			outputs,
			kernels,
		}
	}

	/// Checks sort order, absence of duplicates and absence of
	/// cut-through (an output spent by the very body that creates it).
	pub fn validate_sorted(&self) -> Result<(), Error> {
		let commit_keys: Vec<Vec<u8>> = self.inputs.iter().map(|i| i.commit.as_ref().to_vec()).collect();
		if !is_sorted_unique(&commit_keys) {
			return Err(Error::SortOrder);
		}

		let output_hashes: Vec<Hash> = self.outputs.iter().map(|o| o.id_hash()).collect();
		if !is_sorted_unique(&output_hashes) {
			return Err(Error::SortOrder);
		}

		let kernel_hashes: Vec<Hash> = self.kernels.iter().map(|k| k.hash()).collect();
		if !is_sorted_unique(&kernel_hashes) {
			return Err(Error::SortOrder);
		}

		let spent: std::collections::HashSet<&[u8]> =
			self.inputs.iter().map(|i| i.commit.as_ref()).collect();
		for output in &self.outputs {
			if spent.contains(output.commit.as_ref()) {
				return Err(Error::CutThrough);
			}
		}

		Ok(())
	}

	/// Sum of kernel fees.
	pub fn fee(&self) -> u64 {
		self.kernels.iter().map(|k| k.fee).sum()
	}
}

fn is_sorted_unique<T: Ord>(items: &[T]) -> bool {
	items.windows(2).all(|w| w[0] < w[1])
}

impl Writeable for TransactionBody {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.inputs.write(writer)?;
		self.outputs.write(writer)?;
		self.kernels.write(writer)
	}
}

impl Readable for TransactionBody {
	fn read(reader: &mut dyn Reader) -> Result<TransactionBody, ser::Error> {
		let inputs = Vec::<TransactionInput>::read(reader)?;
		let outputs = Vec::<TransactionOutput>::read(reader)?;
		let kernels = Vec::<TransactionKernel>::read(reader)?;
		let body = TransactionBody {
			inputs,
			outputs,
			kernels,
		};
		body.validate_sorted().map_err(|_| ser::Error::CorruptedData)?;
		Ok(body)
	}
}

impl Committed for TransactionBody {
	fn inputs_committed(&self) -> Vec<Commitment> {
		self.inputs.iter().map(|i| i.commit).collect()
	}
	fn outputs_committed(&self) -> Vec<Commitment> {
		self.outputs.iter().map(|o| o.commit).collect()
	}
	fn kernels_committed(&self) -> Vec<Commitment> {
		self.kernels.iter().map(|k| k.excess).collect()
	}
}
