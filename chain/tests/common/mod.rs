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

//! Shared fixtures for the integration tests: a coinbase/spend builder
//! that produces genuinely valid kernel signatures and range proofs, a
//! `ChainState` that tracks the MMR bookkeeping a real block header has
//! to carry, and a small proof-of-work search helper standing in for
//! mining.

use std::path::Path;

use mwc_core::consensus::REWARD;
use mwc_core::core::block::{BlockHeader, FullBlock, ProofOfWork};
use mwc_core::core::blinding::BlindingFactor;
use mwc_core::core::hash::{hash_bytes, ZERO_HASH};
use mwc_core::core::pmmr;
use mwc_core::core::transaction::{
	KernelFeatures, OutputFeatures, TransactionBody, TransactionInput, TransactionKernel,
	TransactionOutput,
};
use mwc_core::global::{self, ChainTypes};
use mwc_util::secp::key::SecretKey;
use mwc_util::secp::pedersen::Commitment;
use mwc_util::secp::{Message, Secp256k1};

use mwc_chain::Chain;

/// Total MMR size, in nodes, after `n` leaves have been appended from
/// empty - the inverse of walking the tree leaf by leaf.
pub fn mmr_size_after(n_leaves: u64) -> u64 {
	pmmr::insertion_to_pmmr_index(n_leaves + 1) - 1
}

/// Derives a deterministic-but-distinct secret key from a label, rather
/// than pulling in a random number generator as a test-only dependency.
/// A label hash landing outside the curve's valid scalar range happens
/// with probability on the order of 2^-128, not worth guarding against.
pub fn labeled_key(secp: &Secp256k1, label: &str) -> SecretKey {
	let digest = hash_bytes(label.as_bytes());
	SecretKey::from_slice(secp, digest.as_bytes()).expect("label hash is a valid scalar")
}

/// The message a kernel's `excess_sig` signs, mirroring
/// `mwc_chain::validators`'s private kernel message construction exactly:
/// `BLAKE2b-256(features || fee_be || lock_height_be)`.
fn kernel_sig_message(features: u8, fee: u64, lock_height: u64) -> [u8; 32] {
	let mut buf = Vec::with_capacity(1 + 8 + 8);
	buf.push(features);
	buf.extend_from_slice(&fee.to_be_bytes());
	buf.extend_from_slice(&lock_height.to_be_bytes());
	let digest = hash_bytes(&buf);
	let mut out = [0u8; 32];
	out.copy_from_slice(digest.as_bytes());
	out
}

fn sign_kernel(secp: &Secp256k1, blind: &SecretKey, features: u8, fee: u64, lock_height: u64) -> Vec<u8> {
	let msg = Message::from_slice(&kernel_sig_message(features, fee, lock_height))
		.expect("32-byte digest is a valid message");
	let sig = secp.sign(&msg, blind).expect("signing with a valid secret key cannot fail");
	sig.serialize_der(secp)
}

/// Builds a coinbase output and its paired kernel for a block at `height`
/// carrying `fees` in accumulated transaction fees. Returns the output,
/// the kernel and the blinding factor backing both, so a later spend of
/// this output can be built against it.
pub fn coinbase_at(secp: &Secp256k1, height: u64, fees: u64) -> (TransactionOutput, TransactionKernel, SecretKey) {
	let blind = labeled_key(secp, &format!("coinbase-blind-{}-{}", height, fees));
	let value = REWARD + fees;
	let commit = secp.commit(value, blind).expect("pedersen commit");
	let proof = secp.range_proof(0, value, blind, commit);
	let output = TransactionOutput::new(OutputFeatures::COINBASE, commit, proof);

	let excess = secp.commit(0, blind).expect("commit to zero");
	let lock_height = height + global::coinbase_maturity();
	let excess_sig = sign_kernel(secp, &blind, KernelFeatures::COINBASE.bits(), 0, lock_height);
	let kernel = TransactionKernel {
		features: KernelFeatures::COINBASE,
		fee: 0,
		lock_height,
		excess,
		excess_sig,
	};
	(output, kernel, blind)
}

/// The blinding factor and value behind a previously created output,
/// enough to spend it.
#[derive(Clone, Copy)]
pub struct Unspent {
	pub commit: Commitment,
	pub features: OutputFeatures,
	pub blind: SecretKey,
	pub value: u64,
}

/// Spends `unspent` into a single new plain output, paying `fee`. Returns
/// the input/output/kernel triple plus the new output's own `Unspent`
/// handle so it can be chained into a further spend.
pub fn spend(secp: &Secp256k1, label: &str, unspent: &Unspent, fee: u64) -> (TransactionInput, TransactionOutput, TransactionKernel, Unspent) {
	let out_value = unspent.value - fee;
	let out_blind = labeled_key(secp, label);
	let out_commit = secp.commit(out_value, out_blind).expect("pedersen commit");
	let proof = secp.range_proof(0, out_value, out_blind, out_commit);
	let output = TransactionOutput::new(OutputFeatures::PLAIN, out_commit, proof);

	let excess_blind = secp
		.blind_sum(vec![out_blind], vec![unspent.blind])
		.expect("blind sum");
	let excess = secp.commit(0, excess_blind).expect("commit to zero");
	let excess_sig = sign_kernel(secp, &excess_blind, KernelFeatures::PLAIN.bits(), fee, 0);
	let kernel = TransactionKernel {
		features: KernelFeatures::PLAIN,
		fee,
		lock_height: 0,
		excess,
		excess_sig,
	};
	let input = TransactionInput::new(unspent.features, unspent.commit);
	let new_unspent = Unspent {
		commit: out_commit,
		features: OutputFeatures::PLAIN,
		blind: out_blind,
		value: out_value,
	};
	(input, output, kernel, new_unspent)
}

/// Searches nonces for a proof of work whose `to_difficulty()` exceeds
/// `min_difficulty`, standing in for mining against a target. The
/// difficulty distribution is heavy-tailed (`to_difficulty` scales as
/// `1/leading_hash_bytes`), so even a fairly demanding target is found
/// within a small fraction of the search bound in practice.
pub fn mine_pow_above(min_difficulty: u128) -> ProofOfWork {
	for nonce in 0..2_000_000u64 {
		let pow = ProofOfWork {
			secondary_scaling: 1,
			nonce,
			proof_nonces: vec![1, 2, 3, 4],
		};
		if pow.to_difficulty() > min_difficulty {
			return pow;
		}
	}
	panic!("no nonce found with difficulty above {} within search bound", min_difficulty);
}

/// A well-formed proof of work for a fixed nonce, difficulty left
/// whatever its hash happens to produce.
pub fn pow_with_nonce(nonce: u64) -> ProofOfWork {
	ProofOfWork {
		secondary_scaling: 1,
		nonce,
		proof_nonces: vec![1, 2, 3, 4],
	}
}

/// Tracks the running MMR leaf counts and the last header built, so
/// successive test blocks can declare the exact `output_mmr_size` and
/// `kernel_mmr_size` a real `TxHashSet` would end up at. Cloning forks
/// the bookkeeping, letting two competing branches be built from the
/// same ancestor independently.
#[derive(Clone)]
pub struct ChainState {
	pub header: BlockHeader,
	pub output_count: u64,
	pub kernel_count: u64,
}

impl ChainState {
	/// Builds the next block on top of this state, returning the block
	/// and the state positioned after it (which a caller may fork from
	/// again without ever committing the block to a `Chain`).
	pub fn build_block(&self, body: TransactionBody, timestamp: i64, pow: ProofOfWork) -> (FullBlock, ChainState) {
		let output_count = self.output_count + body.outputs.len() as u64;
		let kernel_count = self.kernel_count + body.kernels.len() as u64;

		let mut header = BlockHeader::default();
		header.height = self.header.height + 1;
		header.previous = self.header.hash();
		header.output_mmr_size = mmr_size_after(output_count);
		header.kernel_mmr_size = mmr_size_after(kernel_count);
		header.total_difficulty = self.header.total_difficulty + pow.to_difficulty();
		header.total_kernel_offset = BlindingFactor::zero();
		header.timestamp = timestamp;
		header.pow = pow;

		let block = FullBlock::new(header.clone(), body);
		let next = ChainState {
			header,
			output_count,
			kernel_count,
		};
		(block, next)
	}
}

/// Builds a genesis block carrying a single coinbase output/kernel pair,
/// and the initial `ChainState` positioned at it.
pub fn genesis(secp: &Secp256k1) -> (FullBlock, Unspent, ChainState) {
	let (output, kernel, blind) = coinbase_at(secp, 0, 0);
	let unspent = Unspent {
		commit: output.commit,
		features: OutputFeatures::COINBASE,
		blind,
		value: REWARD,
	};
	let body = TransactionBody::new(vec![], vec![output], vec![kernel]);

	let mut header = BlockHeader::default();
	header.height = 0;
	header.previous = ZERO_HASH;
	header.output_mmr_size = mmr_size_after(1);
	header.kernel_mmr_size = mmr_size_after(1);
	header.total_difficulty = 0;
	header.total_kernel_offset = BlindingFactor::zero();
	header.timestamp = 0;
	header.pow = ProofOfWork::zero();

	let block = FullBlock::new(header.clone(), body);
	let state = ChainState {
		header,
		output_count: 1,
		kernel_count: 1,
	};
	(block, unspent, state)
}

/// Opens a fresh chain under `dir`, seeded with `genesis_block`, under
/// the fast automated-testing consensus parameters (25-block coinbase
/// maturity rather than mainnet's 1440).
pub fn setup(dir: &Path, genesis_block: FullBlock) -> Chain {
	mwc_util::init_test_logger();
	global::set_chain_type(ChainTypes::AutomatedTesting);
	Chain::init(dir.join("db"), dir.join("txhashset"), genesis_block).expect("chain init")
}

