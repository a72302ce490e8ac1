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

//! The `Committed` trait: the kernel-sum identity that ties inputs,
//! outputs, kernels, the per-block kernel offset and the coinbase
//! overage together. This is the one check that actually enforces
//! conservation of value in a Mimblewimble block.

use mwc_util::secp::pedersen::Commitment;
use mwc_util::secp::{self};
use mwc_util::{secp_static, static_secp_instance};

use crate::core::blinding::BlindingFactor;

/// Errors arising from summing and verifying commitments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// A secp operation (summing, key recovery) failed.
	Secp(secp::Error),
	/// The kernel sum (plus offset) did not equal the UTXO sum.
	KernelSumMismatch,
}

impl From<secp::Error> for Error {
	fn from(e: secp::Error) -> Error {
		Error::Secp(e)
	}
}

/// Implemented by anything that carries committed inputs, outputs and
/// kernels - a `TransactionBody` or a `FullBlock`. Supplies the kernel-sum
/// math; callers only need to enumerate the commitments involved.
pub trait Committed {
	/// Sums the kernel excesses (plus an optional extra, e.g. a prior
	/// block's running kernel sum), and separately the same sum with the
	/// kernel offset's commit-to-zero folded in.
	fn sum_kernel_excesses(
		&self,
		offset: &BlindingFactor,
		extra_excess: Option<&Commitment>,
	) -> Result<(Commitment, Commitment), Error> {
		let zero_commit = secp_static::commit_to_zero_value();

		let mut kernel_commits = self.kernels_committed();
		if let Some(extra) = extra_excess {
			kernel_commits.push(*extra);
		}
		kernel_commits.retain(|x| *x != zero_commit);

		let kernel_sum = {
			let secp = static_secp_instance();
			let secp = secp.lock().unwrap();
			secp.commit_sum(kernel_commits, vec![])?
		};

		let kernel_sum_plus_offset = {
			let secp = static_secp_instance();
			let secp = secp.lock().unwrap();
			let mut commits = vec![kernel_sum];
			if *offset != BlindingFactor::zero() {
				let key = offset.secret_key(&secp)?;
				let offset_commit = secp.commit(0, key)?;
				commits.push(offset_commit);
			}
			secp.commit_sum(commits, vec![])?
		};

		Ok((kernel_sum, kernel_sum_plus_offset))
	}

	/// Sums output commitments minus input commitments, folding the
	/// signed `overage` in as an extra output (positive) or input
	/// (negative) commitment.
	fn sum_commitments(
		&self,
		overage: i64,
		extra_commit: Option<&Commitment>,
	) -> Result<Commitment, Error> {
		let zero_commit = secp_static::commit_to_zero_value();

		let mut input_commits = self.inputs_committed();
		let mut output_commits = self.outputs_committed();

		if overage != 0 {
			let over_commit = {
				let secp = static_secp_instance();
				let secp = secp.lock().unwrap();
				secp.commit_value(overage.unsigned_abs())?
			};
			if overage < 0 {
				input_commits.push(over_commit);
			} else {
				output_commits.push(over_commit);
			}
		}

		if let Some(extra) = extra_commit {
			output_commits.push(*extra);
		}

		output_commits.retain(|x| *x != zero_commit);
		input_commits.retain(|x| *x != zero_commit);

		let secp = static_secp_instance();
		let secp = secp.lock().unwrap();
		Ok(secp.commit_sum(output_commits, input_commits)?)
	}

	/// Input commitments to sum.
	fn inputs_committed(&self) -> Vec<Commitment>;

	/// Output commitments to sum.
	fn outputs_committed(&self) -> Vec<Commitment>;

	/// Kernel excess commitments to sum.
	fn kernels_committed(&self) -> Vec<Commitment>;

	/// Verifies that the sum of outputs minus inputs (plus overage)
	/// equals the sum of kernel excesses (plus offset), optionally
	/// folding in a prior block's running sums. Returns the new
	/// `(utxo_sum, kernel_sum)` pair to persist as `BlockSums` on success.
	fn verify_kernel_sums(
		&self,
		overage: i64,
		kernel_offset: BlindingFactor,
		prev_output_sum: Option<&Commitment>,
		prev_kernel_sum: Option<&Commitment>,
	) -> Result<(Commitment, Commitment), Error> {
		let utxo_sum = self.sum_commitments(overage, prev_output_sum)?;
		let (kernel_sum, kernel_sum_plus_offset) =
			self.sum_kernel_excesses(&kernel_offset, prev_kernel_sum)?;

		if utxo_sum != kernel_sum_plus_offset {
			return Err(Error::KernelSumMismatch);
		}

		Ok((utxo_sum, kernel_sum))
	}
}
