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

//! File-backed `Backend<T>` for the pure MMR geometry in `mwc_core`: a
//! hash log addressed by node position plus a data log addressed by
//! leaf insertion order. Both are append-only flat files; pruning the
//! leaf-set does not remove anything from either file, so a rewind is
//! always just a truncation.

use std::io;
use std::path::Path;

use mwc_core::core::hash::Hash;
use mwc_core::core::pmmr::{self, Backend};

use crate::flatfile::AppendOnlyFile;

const HASH_FILE: &str = "pmmr_hash.bin";
const DATA_FILE: &str = "pmmr_data.bin";

/// Persistent `Backend<T>` combining an append-only hash log and an
/// append-only data log under `data_dir`.
pub struct PMMRBackend<T>
where
	T: mwc_core::ser::Writeable + mwc_core::ser::Readable,
{
	hash_file: AppendOnlyFile<Hash>,
	data_file: AppendOnlyFile<T>,
}

impl<T> PMMRBackend<T>
where
	T: mwc_core::ser::Writeable + mwc_core::ser::Readable,
{
	/// Opens (or creates) the hash and data logs under `data_dir`.
	pub fn open<P: AsRef<Path>>(data_dir: P) -> io::Result<PMMRBackend<T>> {
		let data_dir = data_dir.as_ref();
		std::fs::create_dir_all(data_dir)?;
		let hash_file = AppendOnlyFile::open(data_dir.join(HASH_FILE))?;
		let data_file = AppendOnlyFile::open(data_dir.join(DATA_FILE))?;
		Ok(PMMRBackend { hash_file, data_file })
	}

	/// Writes buffered hash and data entries to disk.
	pub fn flush(&mut self) -> io::Result<()> {
		self.hash_file.flush()?;
		self.data_file.flush()
	}

	/// Discards buffered, unflushed entries.
	pub fn discard(&mut self) {
		self.hash_file.discard();
		self.data_file.discard();
	}
}

impl<T> Backend<T> for PMMRBackend<T>
where
	T: mwc_core::ser::Writeable + mwc_core::ser::Readable,
{
	fn append(&mut self, data: Vec<(Hash, Option<T>)>) -> Result<(), String> {
		for (hash, elem) in data {
			self.hash_file
				.append_elmt(&hash)
				.map_err(|e| format!("{}", e))?;
			if let Some(elem) = elem {
				self.data_file
					.append_elmt(&elem)
					.map_err(|e| format!("{}", e))?;
			}
		}
		Ok(())
	}

	fn get_hash(&self, pos: u64) -> Option<Hash> {
		if pos == 0 {
			return None;
		}
		self.hash_file.read_at(pos - 1)
	}

	fn get_data(&self, pos: u64) -> Option<T> {
		let n = pmmr::leaf_pos_to_insertion_index(pos)?;
		self.data_file.read_at(n - 1)
	}

	fn rewind(&mut self, pos: u64) -> Result<(), String> {
		self.hash_file.rewind(pos).map_err(|e| format!("{}", e))?;
		let num_leaves = pmmr::n_leaves(pos);
		self.data_file
			.rewind(num_leaves)
			.map_err(|e| format!("{}", e))?;
		Ok(())
	}

	fn unpruned_size(&self) -> u64 {
		self.hash_file.size_in_elmts()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use mwc_core::core::hash::Hashed;
	use mwc_core::core::pmmr::PMMR;
	use tempfile::tempdir;

	#[test]
	fn push_flush_reopen_and_read_back() {
		let dir = tempdir().unwrap();
		let root_after;
		{
			let mut backend: PMMRBackend<u64> = PMMRBackend::open(dir.path()).unwrap();
			let mut pmmr: PMMR<u64, PMMRBackend<u64>> = PMMR::at(&mut backend, 0);
			for i in 0..5u64 {
				pmmr.push(i).unwrap();
			}
			root_after = pmmr.root();
			backend.flush().unwrap();
		}

		let mut backend: PMMRBackend<u64> = PMMRBackend::open(dir.path()).unwrap();
		let pmmr: PMMR<u64, PMMRBackend<u64>> = PMMR::at(&mut backend, 8);
		assert_eq!(pmmr.root(), root_after);
		assert_eq!(pmmr.get_data(1), Some(0u64));
		assert_eq!(pmmr.get_hash(1), Some(0u64.hash()));
	}

	#[test]
	fn rewind_truncates_both_logs() {
		let dir = tempdir().unwrap();
		let mut backend: PMMRBackend<u64> = PMMRBackend::open(dir.path()).unwrap();
		let mut pmmr: PMMR<u64, PMMRBackend<u64>> = PMMR::at(&mut backend, 0);
		for i in 0..5u64 {
			pmmr.push(i).unwrap();
		}
		let size_after_three = {
			// Size after exactly 3 leaves have been pushed (positions 1,2,4
			// hold leaves 0,1,2; position 3 holds their shared parent).
			pmmr.rewind(4).unwrap();
			pmmr.unpruned_size()
		};
		assert_eq!(size_after_three, 4);
		assert_eq!(pmmr.get_data(1), Some(0u64));
		assert_eq!(pmmr.get_data(2), Some(1u64));
		assert_eq!(pmmr.get_data(4), Some(2u64));
	}
}
