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

//! File-backed Roaring bitmap with transactional set/unset semantics.
//! Changes land in an in-memory delta bitmap; `commit` serializes the
//! merged result to a temp file and renames it over the live file so a
//! crash mid-write never leaves a half-written bitmap on disk.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use croaring::Bitmap;

/// A persisted, transactionally-updated bitmap over `u32` positions.
pub struct BitmapFile {
	path: PathBuf,
	bitmap: Bitmap,
	delta_add: Bitmap,
	delta_remove: Bitmap,
}

impl BitmapFile {
	/// Opens the bitmap file at `path`, reading its current content if it
	/// exists, or starting from an empty bitmap otherwise.
	pub fn open<P: AsRef<Path>>(path: P) -> io::Result<BitmapFile> {
		let path = path.as_ref().to_path_buf();
		let bitmap = if path.exists() {
			let mut file = File::open(&path)?;
			let mut buf = vec![];
			file.read_to_end(&mut buf)?;
			Bitmap::deserialize(&buf)
		} else {
			Bitmap::create()
		};
		Ok(BitmapFile {
			path,
			bitmap,
			delta_add: Bitmap::create(),
			delta_remove: Bitmap::create(),
		})
	}

	/// Sets position `i`, pending until `commit`.
	pub fn set(&mut self, i: u32) {
		self.delta_add.add(i);
		self.delta_remove.remove(i);
	}

	/// Unsets position `i`, pending until `commit`.
	pub fn unset(&mut self, i: u32) {
		self.delta_remove.add(i);
		self.delta_add.remove(i);
	}

	/// Whether `i` is set, taking the pending delta into account.
	pub fn is_set(&self, i: u32) -> bool {
		if self.delta_add.contains(i) {
			true
		} else if self.delta_remove.contains(i) {
			false
		} else {
			self.bitmap.contains(i)
		}
	}

	/// Single byte covering 8 consecutive positions starting at `i * 8`,
	/// as used when chunking the bitmap for root computation.
	pub fn get_byte(&self, i: usize) -> u8 {
		let mut byte = 0u8;
		for bit in 0..8u32 {
			if self.is_set((i as u32) * 8 + bit) {
				byte |= 1 << bit;
			}
		}
		byte
	}

	/// Materializes the bitmap (pending delta included) as a `Bitmap`.
	pub fn to_roaring(&self) -> Bitmap {
		let mut merged = self.bitmap.clone();
		merged.or_inplace(&self.delta_add);
		merged.andnot_inplace(&self.delta_remove);
		merged
	}

	/// Truncates to the first `num_leaves` positions, then re-adds the
	/// positions listed in `extras` - used to replay spent leaves back
	/// into the set during a rewind.
	pub fn rewind(&mut self, num_leaves: u32, extras: &[u32]) {
		self.delta_add = Bitmap::create();
		self.delta_remove = Bitmap::create();
		let allowed: Bitmap = (0..num_leaves).collect();
		self.bitmap.and_inplace(&allowed);
		for &pos in extras {
			self.bitmap.add(pos);
		}
	}

	/// Merges the pending delta into the live bitmap and writes it to
	/// disk via temp file + rename.
	pub fn commit(&mut self) -> io::Result<()> {
		self.bitmap.or_inplace(&self.delta_add);
		self.bitmap.andnot_inplace(&self.delta_remove);
		self.delta_add = Bitmap::create();
		self.delta_remove = Bitmap::create();
		self.bitmap.run_optimize();

		let tmp_path = self.path.with_extension("tmp");
		{
			let mut file = BufWriter::new(File::create(&tmp_path)?);
			file.write_all(&self.bitmap.serialize())?;
			file.flush()?;
		}
		fs::rename(&tmp_path, &self.path)?;
		Ok(())
	}

	/// Discards the pending delta without touching the file on disk.
	pub fn rollback(&mut self) {
		self.delta_add = Bitmap::create();
		self.delta_remove = Bitmap::create();
	}

	/// Number of set positions, delta included.
	pub fn len(&self) -> u64 {
		self.to_roaring().cardinality()
	}

	/// Whether no position is set, delta included.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Serializes the committed bitmap to `dest_path`, tagged for a
	/// state snapshot.
	pub fn snapshot<P: AsRef<Path>>(&self, dest_path: P) -> io::Result<()> {
		let mut snap = self.bitmap.clone();
		snap.run_optimize();
		let mut file = BufWriter::new(File::create(dest_path)?);
		file.write_all(&snap.serialize())?;
		file.flush()?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn set_unset_is_set() {
		let dir = tempdir().unwrap();
		let mut bm = BitmapFile::open(dir.path().join("bitmap.bin")).unwrap();
		bm.set(3);
		bm.set(9);
		assert!(bm.is_set(3));
		assert!(bm.is_set(9));
		assert!(!bm.is_set(4));
		bm.unset(3);
		assert!(!bm.is_set(3));
	}

	#[test]
	fn commit_persists_across_reopen() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("bitmap.bin");
		{
			let mut bm = BitmapFile::open(&path).unwrap();
			bm.set(1);
			bm.set(100);
			bm.commit().unwrap();
		}
		let bm2 = BitmapFile::open(&path).unwrap();
		assert!(bm2.is_set(1));
		assert!(bm2.is_set(100));
		assert!(!bm2.is_set(2));
	}

	#[test]
	fn unset_after_commit_clears_bit_on_next_commit() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("bitmap.bin");
		let mut bm = BitmapFile::open(&path).unwrap();
		bm.set(3);
		bm.set(9);
		bm.commit().unwrap();
		assert!(bm.is_set(3));

		bm.unset(3);
		bm.commit().unwrap();
		assert!(!bm.is_set(3));
		assert!(bm.is_set(9));

		let bm2 = BitmapFile::open(&path).unwrap();
		assert!(!bm2.is_set(3));
		assert!(bm2.is_set(9));
	}

	#[test]
	fn rollback_discards_pending_delta() {
		let dir = tempdir().unwrap();
		let mut bm = BitmapFile::open(dir.path().join("bitmap.bin")).unwrap();
		bm.set(5);
		bm.rollback();
		assert!(!bm.is_set(5));
	}

	#[test]
	fn rewind_truncates_then_readds_extras() {
		let dir = tempdir().unwrap();
		let mut bm = BitmapFile::open(dir.path().join("bitmap.bin")).unwrap();
		for i in 0..10u32 {
			bm.set(i);
		}
		bm.commit().unwrap();
		bm.rewind(5, &[7]);
		assert!(bm.is_set(0));
		assert!(bm.is_set(4));
		assert!(!bm.is_set(5));
		assert!(bm.is_set(7));
	}
}
