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

//! The UTXO state: three append-only MMRs (kernel, output, range-proof)
//! plus two leaf-sets marking which output/range-proof leaves are still
//! unspent. `apply_block` and `rewind` are the only ways its size ever
//! changes; both are driven entirely by what's recorded in the block
//! database, never by re-deriving state from the blocks themselves.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use croaring::Bitmap;
use log::debug;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use mwc_core::core::block::FullBlock;
use mwc_core::core::hash::Hash;
use mwc_core::core::pmmr::PMMR;
use mwc_core::core::transaction::{OutputFeatures, OutputIdentity};
use mwc_core::global;
use mwc_util::secp::pedersen::RangeProof;

use mwc_store::PMMRBackend;
use mwc_store::LeafSet;

use crate::error::Error;
use crate::store::WriteContext;
use crate::types::{OutputLocation, SpentOutput};

const KERNEL_SUBDIR: &str = "kernel";
const OUTPUT_SUBDIR: &str = "output";
const RPROOF_SUBDIR: &str = "rangeproof";
const LEAFSET_FILE: &str = "pmmr_leafset.bin";

/// Roots of the three MMRs and the leaf-set's UTXO bitmap root, as
/// returned to a peer negotiating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roots {
	pub kernel_root: Hash,
	pub output_root: Hash,
	pub rangeproof_root: Hash,
	pub leafset_root: Hash,
}

/// The full on-disk UTXO state: three MMRs plus two leaf-sets, all
/// positioned at the same "flushed header".
pub struct TxHashSet {
	root_dir: PathBuf,
	kernel_backend: PMMRBackend<mwc_core::core::transaction::TransactionKernel>,
	output_backend: PMMRBackend<OutputIdentity>,
	rproof_backend: PMMRBackend<RangeProof>,
	output_leaf_set: LeafSet,
	rproof_leaf_set: LeafSet,
}

impl TxHashSet {
	/// Opens (or creates) the TxHashSet rooted at `root_dir`.
	pub fn open<P: AsRef<Path>>(root_dir: P) -> Result<TxHashSet, Error> {
		let root_dir = root_dir.as_ref().to_path_buf();
		let kernel_dir = root_dir.join(KERNEL_SUBDIR);
		let output_dir = root_dir.join(OUTPUT_SUBDIR);
		let rproof_dir = root_dir.join(RPROOF_SUBDIR);
		fs::create_dir_all(&output_dir)?;
		fs::create_dir_all(&rproof_dir)?;

		let kernel_backend = PMMRBackend::open(&kernel_dir)?;
		let output_backend = PMMRBackend::open(&output_dir)?;
		let rproof_backend = PMMRBackend::open(&rproof_dir)?;
		let output_leaf_set = LeafSet::open(output_dir.join(LEAFSET_FILE))?;
		let rproof_leaf_set = LeafSet::open(rproof_dir.join(LEAFSET_FILE))?;

		Ok(TxHashSet {
			root_dir,
			kernel_backend,
			output_backend,
			rproof_backend,
			output_leaf_set,
			rproof_leaf_set,
		})
	}

	fn kernel_pmmr(
		&mut self,
	) -> PMMR<'_, mwc_core::core::transaction::TransactionKernel, PMMRBackend<mwc_core::core::transaction::TransactionKernel>>
	{
		let size = self.kernel_backend.unpruned_size();
		PMMR::at(&mut self.kernel_backend, size)
	}

	fn output_pmmr(&mut self) -> PMMR<'_, OutputIdentity, PMMRBackend<OutputIdentity>> {
		let size = self.output_backend.unpruned_size();
		PMMR::at(&mut self.output_backend, size)
	}

	fn rproof_pmmr(&mut self) -> PMMR<'_, RangeProof, PMMRBackend<RangeProof>> {
		let size = self.rproof_backend.unpruned_size();
		PMMR::at(&mut self.rproof_backend, size)
	}

	/// Current MMR/leaf-set roots.
	pub fn roots(&mut self) -> Roots {
		let num_outputs = self.output_backend.unpruned_size();
		Roots {
			kernel_root: self.kernel_pmmr().root(),
			output_root: self.output_pmmr().root(),
			rangeproof_root: self.rproof_pmmr().root(),
			leafset_root: self.output_leaf_set.root(num_outputs),
		}
	}

	/// Applies a fully-validated block: unsets spent leaves, appends new
	/// outputs/kernels/proofs, and records the block's spend trail in the
	/// block database so a later rewind can undo exactly this much.
	pub fn apply_block(&mut self, block: &FullBlock, db: &WriteContext) -> Result<(), Error> {
		let mut spent = Vec::with_capacity(block.body.inputs.len());
		let mut spent_positions = Vec::with_capacity(block.body.inputs.len());

		for input in &block.body.inputs {
			let loc = db
				.get_output_pos(&input.commit)?
				.ok_or_else(|| Error::BadData("input spends unknown output".to_string()))?;
			if !self.output_leaf_set.includes(loc.mmr_index) {
				return Err(Error::BadData("input spends an already-spent output".into()));
			}
			if input.features.contains(OutputFeatures::COINBASE) {
				let matures_at = loc.height + global::coinbase_maturity();
				if block.header.height < matures_at {
					return Err(Error::BadData(format!(
						"coinbase at height {} not mature until height {}, spent at {}",
						loc.height, matures_at, block.header.height
					)));
				}
			}
			self.output_leaf_set.remove(loc.mmr_index);
			self.rproof_leaf_set.remove(loc.mmr_index);
			db.delete_output_pos(&input.commit)?;
			spent_positions.push(loc.mmr_index as u32);
			spent.push(SpentOutput {
				commit: input.commit,
				location: loc,
			});
		}

		for output in &block.body.outputs {
			if db.get_output_pos(&output.commit)?.is_some() {
				return Err(Error::BadData("duplicate unspent commitment".into()));
			}
			let identity = OutputIdentity::from(output);
			let pos = self
				.output_pmmr()
				.push(identity)
				.map_err(Error::InvalidState)?;
			self.rproof_pmmr()
				.push(output.proof.clone())
				.map_err(Error::InvalidState)?;
			self.output_leaf_set.add(pos);
			self.rproof_leaf_set.add(pos);
			db.put_output_pos(
				&output.commit,
				&OutputLocation {
					mmr_index: pos,
					height: block.header.height,
				},
			)?;
		}

		for kernel in &block.body.kernels {
			self.kernel_pmmr()
				.push(kernel.clone())
				.map_err(Error::InvalidState)?;
		}

		if self.output_backend.unpruned_size() != block.header.output_mmr_size {
			return Err(Error::InvalidState(format!(
				"output mmr size {} disagrees with header {}",
				self.output_backend.unpruned_size(),
				block.header.output_mmr_size
			)));
		}
		if self.kernel_backend.unpruned_size() != block.header.kernel_mmr_size {
			return Err(Error::InvalidState(format!(
				"kernel mmr size {} disagrees with header {}",
				self.kernel_backend.unpruned_size(),
				block.header.kernel_mmr_size
			)));
		}

		let hash = block.hash();
		let input_bitmap: Bitmap = spent_positions.into_iter().collect();
		db.put_input_bitmap(&hash, &input_bitmap.serialize())?;
		db.put_spent_outputs(&hash, &spent)?;
		Ok(())
	}

	/// Unwinds exactly the effect of applying `block`, restoring the MMR
	/// sizes and leaf-set membership recorded by `parent_header`. The
	/// caller is responsible for walking back block-by-block (and later
	/// forward-applying the target branch); this only undoes one step.
	pub fn rewind_block(
		&mut self,
		block: &FullBlock,
		parent_header: &mwc_core::core::block::BlockHeader,
		db: &WriteContext,
	) -> Result<(), Error> {
		let hash = block.hash();
		let spent = db.get_spent_outputs(&hash)?;

		self.output_pmmr()
			.rewind(parent_header.output_mmr_size)
			.map_err(Error::InvalidState)?;
		self.rproof_pmmr()
			.rewind(parent_header.output_mmr_size)
			.map_err(Error::InvalidState)?;
		self.kernel_pmmr()
			.rewind(parent_header.kernel_mmr_size)
			.map_err(Error::InvalidState)?;

		let num_leaves = mwc_core::core::pmmr::n_leaves(parent_header.output_mmr_size);
		let extras: Vec<u64> = spent.iter().map(|s| s.location.mmr_index).collect();
		self.output_leaf_set.rewind(num_leaves, &extras);
		self.rproof_leaf_set.rewind(num_leaves, &extras);

		for output in &block.body.outputs {
			db.delete_output_pos(&output.commit)?;
		}
		for spent_output in &spent {
			db.put_output_pos(&spent_output.commit, &spent_output.location)?;
		}

		debug!("rewound txhashset past block {}", hash);
		Ok(())
	}

	/// Commits all pending leaf-set changes (MMR appends are always
	/// durable once flushed; only the leaf-sets buffer a delta).
	pub fn commit(&mut self) -> Result<(), Error> {
		self.kernel_backend.flush()?;
		self.output_backend.flush()?;
		self.rproof_backend.flush()?;
		self.output_leaf_set.commit()?;
		self.rproof_leaf_set.commit()?;
		Ok(())
	}

	/// Discards unflushed MMR appends and pending leaf-set changes.
	pub fn rollback(&mut self) {
		self.kernel_backend.discard();
		self.output_backend.discard();
		self.rproof_backend.discard();
		self.output_leaf_set.rollback();
		self.rproof_leaf_set.rollback();
	}

	/// Copies the MMR and leaf-set files into a staging directory,
	/// snapshots the leaf-sets under `header`'s hash, and bundles the
	/// three subdirectories into a zip at `dest_zip`.
	pub fn snapshot<P: AsRef<Path>>(&mut self, header_hash: Hash, dest_zip: P) -> Result<PathBuf, Error> {
		self.output_leaf_set.snapshot(header_hash)?;
		self.rproof_leaf_set.snapshot(header_hash)?;

		let dest_zip = dest_zip.as_ref().to_path_buf();
		let file = File::create(&dest_zip)?;
		let mut zip = ZipWriter::new(file);
		// The `zip` dependency is pulled in with default features disabled,
		// so only the `Stored` (uncompressed) method is available.
		let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);

		for subdir in &[KERNEL_SUBDIR, OUTPUT_SUBDIR, RPROOF_SUBDIR] {
			let dir = self.root_dir.join(subdir);
			for entry in fs::read_dir(&dir)? {
				let entry = entry?;
				if !entry.file_type()?.is_file() {
					continue;
				}
				let rel = format!("{}/{}", subdir, entry.file_name().to_string_lossy());
				zip.start_file(rel, options)?;
				let mut buf = Vec::new();
				File::open(entry.path())?.read_to_end(&mut buf)?;
				zip.write_all(&buf)?;
			}
		}
		zip.finish()?;
		Ok(dest_zip)
	}

	/// Loads a state-snapshot zip produced by `snapshot` into a fresh
	/// TxHashSet rooted at `root_dir`.
	pub fn load_from_zip<P: AsRef<Path>>(zip_path: P, root_dir: P) -> Result<TxHashSet, Error> {
		let root_dir = root_dir.as_ref().to_path_buf();
		fs::create_dir_all(&root_dir)?;
		let file = File::open(zip_path.as_ref())?;
		let mut archive = ZipArchive::new(file)?;
		for i in 0..archive.len() {
			let mut entry = archive.by_index(i)?;
			let out_path = root_dir.join(entry.name());
			if let Some(parent) = out_path.parent() {
				fs::create_dir_all(parent)?;
			}
			let mut buf = Vec::new();
			entry.read_to_end(&mut buf)?;
			File::create(out_path)?.write_all(&buf)?;
		}
		TxHashSet::open(root_dir)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn open_creates_subdirectories() {
		let dir = tempdir().unwrap();
		let mut txhashset = TxHashSet::open(dir.path()).unwrap();
		assert!(dir.path().join(KERNEL_SUBDIR).exists());
		assert!(dir.path().join(OUTPUT_SUBDIR).exists());
		let roots = txhashset.roots();
		assert_eq!(roots.kernel_root, mwc_core::core::hash::ZERO_HASH);
	}
}
