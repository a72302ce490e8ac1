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

//! Append-only flat file backing a MMR hash log or data file: a large,
//! length-prefixed vector of serialized elements on disk, readable at
//! any position and truncatable, but only ever appended to in order.
//!
//! Writes land in an in-memory buffer until `flush`; `discard` drops
//! the buffer instead. Reads after a flush go through a memory map so
//! the OS page cache does the work, mirroring how the hash log is
//! consulted on every MMR append.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use mwc_core::ser::{self, Readable, Writeable};

/// Byte range of a single length-prefixed record within the file.
#[derive(Clone, Copy)]
struct Entry {
	start: u64,
	len: u32,
}

/// Append-only file of length-prefixed `T` records, indexed by position
/// (0-based; callers doing 1-based MMR positions subtract 1 first).
pub struct AppendOnlyFile<T> {
	path: PathBuf,
	file: File,
	mmap: Option<memmap::Mmap>,
	entries: Vec<Entry>,
	buffer: Vec<u8>,
	buffer_entries: Vec<Entry>,
	_marker: PhantomData<T>,
}

impl<T> AppendOnlyFile<T>
where
	T: Writeable + Readable,
{
	/// Opens (creating if necessary) the file at `path`, replaying its
	/// existing length-prefixed records to rebuild the position index.
	pub fn open<P: AsRef<Path>>(path: P) -> io::Result<AppendOnlyFile<T>> {
		let path = path.as_ref().to_path_buf();
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.open(&path)?;

		let mut aof = AppendOnlyFile {
			path,
			file,
			mmap: None,
			entries: vec![],
			buffer: vec![],
			buffer_entries: vec![],
			_marker: PhantomData,
		};
		aof.reindex()?;
		Ok(aof)
	}

	fn reindex(&mut self) -> io::Result<()> {
		self.entries.clear();
		self.file.seek(SeekFrom::Start(0))?;
		let mut offset = 0u64;
		loop {
			let len = match self.file.read_u32::<BigEndian>() {
				Ok(len) => len,
				Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
				Err(e) => return Err(e),
			};
			let start = offset + 4;
			self.file.seek(SeekFrom::Current(i64::from(len)))?;
			self.entries.push(Entry { start, len });
			offset = start + u64::from(len);
		}
		self.remap()
	}

	fn remap(&mut self) -> io::Result<()> {
		let file_len = self.file.metadata()?.len();
		self.mmap = if file_len == 0 {
			None
		} else {
			Some(unsafe { memmap::Mmap::map(&self.file)? })
		};
		Ok(())
	}

	/// Number of elements present, including buffered but unflushed ones.
	pub fn size_in_elmts(&self) -> u64 {
		(self.entries.len() + self.buffer_entries.len()) as u64
	}

	/// Appends a single element to the in-memory buffer. Not durable
	/// until `flush` is called.
	pub fn append_elmt(&mut self, data: &T) -> io::Result<()> {
		let bytes =
			ser::ser_vec(data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{}", e)))?;
		let file_len = self.file.metadata()?.len();
		let already_buffered: u64 = self.buffer.len() as u64;
		let start = file_len + already_buffered + 4;
		self.buffer
			.write_u32::<BigEndian>(bytes.len() as u32)?;
		self.buffer.extend_from_slice(&bytes);
		self.buffer_entries.push(Entry {
			start,
			len: bytes.len() as u32,
		});
		Ok(())
	}

	/// Reads the element at 0-based position `idx`, if present.
	pub fn read_at(&self, idx: u64) -> Option<T> {
		let idx = idx as usize;
		if idx < self.entries.len() {
			let e = self.entries[idx];
			let mmap = self.mmap.as_ref()?;
			let slice = &mmap[e.start as usize..(e.start + u64::from(e.len)) as usize];
			ser::deserialize(&mut &slice[..]).ok()
		} else if idx < self.entries.len() + self.buffer_entries.len() {
			let e = self.buffer_entries[idx - self.entries.len()];
			let file_len = self.file.metadata().ok()?.len();
			let rel_start = (e.start - file_len) as usize;
			let slice = &self.buffer[rel_start..rel_start + e.len as usize];
			ser::deserialize(&mut &slice[..]).ok()
		} else {
			None
		}
	}

	/// Truncates the file (and any buffered, unflushed tail) to exactly
	/// `num_elmts` elements.
	pub fn rewind(&mut self, num_elmts: u64) -> io::Result<()> {
		let num_elmts = num_elmts as usize;
		if num_elmts >= self.entries.len() + self.buffer_entries.len() {
			return Ok(());
		}
		if num_elmts >= self.entries.len() {
			let file_len = self.file.metadata()?.len();
			self.buffer_entries.truncate(num_elmts - self.entries.len());
			let keep_bytes = self
				.buffer_entries
				.last()
				.map(|e| e.start + u64::from(e.len))
				.unwrap_or(file_len);
			let keep = (keep_bytes - file_len) as usize;
			self.buffer.truncate(keep);
			return Ok(());
		}

		self.buffer.clear();
		self.buffer_entries.clear();
		let new_len = if num_elmts == 0 {
			0
		} else {
			let last = self.entries[num_elmts - 1];
			last.start + u64::from(last.len)
		};
		self.entries.truncate(num_elmts);
		self.file.set_len(new_len)?;
		self.remap()
	}

	/// Writes the buffered tail to disk and remaps for reads.
	pub fn flush(&mut self) -> io::Result<()> {
		if self.buffer.is_empty() {
			return Ok(());
		}
		self.file.seek(SeekFrom::End(0))?;
		self.file.write_all(&self.buffer)?;
		self.file.sync_all()?;
		self.entries.append(&mut self.buffer_entries);
		self.buffer.clear();
		self.remap()
	}

	/// Discards the buffered, unflushed tail.
	pub fn discard(&mut self) {
		self.buffer.clear();
		self.buffer_entries.clear();
	}

	/// Path of the underlying file.
	pub fn path(&self) -> &Path {
		&self.path
	}
}

/// Removes a flat file and its backing path if present; used when a
/// staging copy is discarded.
pub fn remove_if_present(path: &Path) -> io::Result<()> {
	if path.exists() {
		fs::remove_file(path)?;
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use mwc_core::core::hash::Hash;
	use tempfile::tempdir;

	fn h(b: u8) -> Hash {
		Hash::from_bytes(&[b; 32]).unwrap()
	}

	#[test]
	fn append_flush_and_read_back() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("hashes.bin");
		let mut f: AppendOnlyFile<Hash> = AppendOnlyFile::open(&path).unwrap();
		f.append_elmt(&h(1)).unwrap();
		f.append_elmt(&h(2)).unwrap();
		assert_eq!(f.size_in_elmts(), 2);
		assert_eq!(f.read_at(0), Some(h(1)));
		f.flush().unwrap();
		assert_eq!(f.read_at(1), Some(h(2)));

		// Reopening replays the length-prefixed records from disk.
		drop(f);
		let f2: AppendOnlyFile<Hash> = AppendOnlyFile::open(&path).unwrap();
		assert_eq!(f2.size_in_elmts(), 2);
		assert_eq!(f2.read_at(0), Some(h(1)));
		assert_eq!(f2.read_at(1), Some(h(2)));
	}

	#[test]
	fn discard_drops_unflushed_tail() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("hashes.bin");
		let mut f: AppendOnlyFile<Hash> = AppendOnlyFile::open(&path).unwrap();
		f.append_elmt(&h(1)).unwrap();
		f.flush().unwrap();
		f.append_elmt(&h(2)).unwrap();
		f.discard();
		assert_eq!(f.size_in_elmts(), 1);
		assert_eq!(f.read_at(0), Some(h(1)));
	}

	#[test]
	fn rewind_truncates_flushed_records() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("hashes.bin");
		let mut f: AppendOnlyFile<Hash> = AppendOnlyFile::open(&path).unwrap();
		for i in 0..5u8 {
			f.append_elmt(&h(i)).unwrap();
		}
		f.flush().unwrap();
		f.rewind(2).unwrap();
		assert_eq!(f.size_in_elmts(), 2);
		assert_eq!(f.read_at(0), Some(h(0)));
		assert_eq!(f.read_at(1), Some(h(1)));
		f.append_elmt(&h(9)).unwrap();
		f.flush().unwrap();
		assert_eq!(f.read_at(2), Some(h(9)));
	}
}
