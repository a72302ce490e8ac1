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

//! Unspent-leaf bitmap: a thin façade over `BitmapFile` adding the one
//! operation a leaf-set needs beyond plain bit twiddling - a Merkle
//! root over the bitmap's own bytes, so a peer can verify the UTXO set
//! without transferring it.

use std::io;
use std::path::{Path, PathBuf};

use mwc_core::core::hash::{self, Hash};
use mwc_core::core::pmmr;

use crate::bitmap_file::BitmapFile;

/// Number of bitmap bytes hashed into a single leaf of the root MMR.
const CHUNK_BYTES: usize = 1024;

/// Facade over a `BitmapFile` tracking which MMR leaf positions are
/// still unspent.
pub struct LeafSet {
	path: PathBuf,
	bitmap: BitmapFile,
}

impl LeafSet {
	/// Opens the leaf-set bitmap file at `path`.
	pub fn open<P: AsRef<Path>>(path: P) -> io::Result<LeafSet> {
		let path = path.as_ref().to_path_buf();
		let bitmap = BitmapFile::open(&path)?;
		Ok(LeafSet { path, bitmap })
	}

	/// Marks MMR position `pos` (1-based) as present/unspent.
	pub fn add(&mut self, pos: u64) {
		self.bitmap.set(pos as u32);
	}

	/// Marks MMR position `pos` (1-based) as spent.
	pub fn remove(&mut self, pos: u64) {
		self.bitmap.unset(pos as u32);
	}

	/// Whether `pos` is currently marked unspent.
	pub fn includes(&self, pos: u64) -> bool {
		self.bitmap.is_set(pos as u32)
	}

	/// Truncates to `num_leaves` then re-adds `extras` - used to restore
	/// leaves that a rewound block had spent.
	pub fn rewind(&mut self, num_leaves: u64, extras: &[u64]) {
		let extras: Vec<u32> = extras.iter().map(|&p| p as u32).collect();
		self.bitmap.rewind(num_leaves as u32, &extras);
	}

	/// Commits pending set/unset calls to disk.
	pub fn commit(&mut self) -> io::Result<()> {
		self.bitmap.commit()
	}

	/// Discards pending set/unset calls.
	pub fn rollback(&mut self) {
		self.bitmap.rollback()
	}

	/// Number of unspent positions.
	pub fn len(&self) -> u64 {
		self.bitmap.len()
	}

	/// Whether no position is currently unspent.
	pub fn is_empty(&self) -> bool {
		self.bitmap.is_empty()
	}

	/// Writes a snapshot of the committed bitmap tagged with a short hash
	/// of `block_hash`, as used when bundling a state-snapshot zip.
	pub fn snapshot(&self, block_hash: Hash) -> io::Result<()> {
		let snap_path = format!("{}.{}", self.path.display(), block_hash.to_short_hex());
		self.bitmap.snapshot(snap_path)
	}

	/// Builds a "UTXO bitmap root": chunks the bitmap covering
	/// `num_outputs` leaf positions into `CHUNK_BYTES`-byte pieces, hashes
	/// each chunk, and bags the resulting hashes the same way a MMR bags
	/// its peaks. Lets a remote peer verify the unspent set without
	/// transferring it.
	pub fn root(&self, num_outputs: u64) -> Hash {
		let num_bytes = ((num_outputs + 7) / 8) as usize;
		let num_chunks = (num_bytes + CHUNK_BYTES - 1) / CHUNK_BYTES.max(1);
		if num_chunks == 0 {
			return hash::ZERO_HASH;
		}

		let chunk_hashes: Vec<Hash> = (0..num_chunks)
			.map(|chunk_idx| {
				let mut buf = [0u8; CHUNK_BYTES];
				for (i, byte) in buf.iter_mut().enumerate() {
					let byte_idx = chunk_idx * CHUNK_BYTES + i;
					if byte_idx < num_bytes {
						*byte = self.bitmap.get_byte(byte_idx);
					}
				}
				hash::hash_bytes(&buf)
			})
			.collect();

		// Chunk hashes are not a MMR (no parent nodes are ever materialized
		// for them) - they are simply bagged as a flat peak sequence, the
		// same right-to-left fold the real MMRs use for their own peaks.
		pmmr::bag_peaks(&chunk_hashes)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn add_remove_includes() {
		let dir = tempdir().unwrap();
		let mut ls = LeafSet::open(dir.path().join("leafset.bin")).unwrap();
		ls.add(1);
		ls.add(2);
		assert!(ls.includes(1));
		ls.remove(1);
		assert!(!ls.includes(1));
		assert!(ls.includes(2));
	}

	#[test]
	fn root_is_deterministic_and_content_sensitive() {
		let dir = tempdir().unwrap();
		let mut ls = LeafSet::open(dir.path().join("leafset.bin")).unwrap();
		ls.add(1);
		ls.commit().unwrap();
		let root_a = ls.root(64);
		let root_a_again = ls.root(64);
		assert_eq!(root_a, root_a_again);

		ls.add(2);
		ls.commit().unwrap();
		let root_b = ls.root(64);
		assert_ne!(root_a, root_b);
	}

	#[test]
	fn rewind_restores_prior_membership() {
		let dir = tempdir().unwrap();
		let mut ls = LeafSet::open(dir.path().join("leafset.bin")).unwrap();
		ls.add(1);
		ls.add(2);
		ls.commit().unwrap();
		ls.remove(1);
		ls.commit().unwrap();
		ls.rewind(3, &[1]);
		assert!(ls.includes(1));
		assert!(ls.includes(2));
	}
}
