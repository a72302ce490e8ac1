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

//! The opaque 32-byte hash used pervasively to identify headers, blocks,
//! transaction components and MMR nodes, plus the `Hashed` trait that
//! derives one from a type's canonical serialization via BLAKE2b-256.

use std::cmp::Ordering;
use std::fmt;

use blake2_rfc::blake2b::Blake2b;

use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// Size of a hash in bytes.
pub const HASH_SIZE: usize = 32;

/// A hash to uniquely identify a header, block, kernel, output or MMR node.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Hash([u8; HASH_SIZE]);

/// The hash of nothing, used as the "no previous block" marker in the
/// genesis header and to seed peak-bagging when an MMR is empty.
pub const ZERO_HASH: Hash = Hash([0; HASH_SIZE]);

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl PartialOrd for Hash {
	fn partial_cmp(&self, other: &Hash) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Hash {
	fn cmp(&self, other: &Hash) -> Ordering {
		self.0.cmp(&other.0)
	}
}

impl Hash {
	/// Returns a byte slice view of this hash.
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	/// Builds a hash from a 32-byte array.
	pub fn from_bytes(bytes: &[u8]) -> Result<Hash, ser::Error> {
		if bytes.len() != HASH_SIZE {
			return Err(ser::Error::CorruptedData);
		}
		let mut h = [0; HASH_SIZE];
		h.copy_from_slice(bytes);
		Ok(Hash(h))
	}

	/// Hex representation of this hash.
	pub fn to_hex(&self) -> String {
		mwc_util::to_hex(&self.0)
	}

	/// A shortened hex representation, used for filenames such as the
	/// block-hash-tagged leaf-set snapshot.
	pub fn to_short_hex(&self) -> String {
		let hex = self.to_hex();
		hex[..12].to_owned()
	}

	/// Hashes this hash together with another, as used when bagging MMR
	/// peaks: `H(left || right)`.
	pub fn hash_with(&self, other: Hash) -> Hash {
		let mut ctx = Blake2b::new(HASH_SIZE);
		ctx.update(&self.0);
		ctx.update(&other.0);
		let blake_hash = ctx.finalize();
		let mut h = [0; HASH_SIZE];
		h.copy_from_slice(blake_hash.as_bytes());
		Hash(h)
	}
}

impl Writeable for Hash {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(&self.0)
	}
}

impl Readable for Hash {
	fn read(reader: &mut dyn Reader) -> Result<Hash, ser::Error> {
		let v = reader.read_fixed_bytes(HASH_SIZE)?;
		let mut a = [0; HASH_SIZE];
		a.copy_from_slice(&v);
		Ok(Hash(a))
	}
}

/// Hashes a raw byte slice directly with BLAKE2b-256, bypassing the
/// `Writeable` codec - used where the input is already a flat buffer
/// rather than a serializable type, such as a chunk of a leaf-set bitmap.
pub fn hash_bytes(data: &[u8]) -> Hash {
	let mut ctx = Blake2b::new(HASH_SIZE);
	ctx.update(data);
	let blake_hash = ctx.finalize();
	let mut h = [0; HASH_SIZE];
	h.copy_from_slice(blake_hash.as_bytes());
	Hash(h)
}

/// Implemented by anything that can compute its own BLAKE2b-256 hash from
/// its canonical binary serialization. The derived hash is a pure function
/// of the bytes - types that cache it do so as a memo over an otherwise
/// immutable value, never as mutable state.
pub trait Hashed {
	/// Hashes the canonical serialization of `self`.
	fn hash(&self) -> Hash;
}

impl<W: Writeable> Hashed for W {
	fn hash(&self) -> Hash {
		let mut ctx = Blake2b::new(HASH_SIZE);
		ser::serialize(&mut HashWriter(&mut ctx), self).expect("serialization into a hasher cannot fail");
		let blake_hash = ctx.finalize();
		let mut h = [0; HASH_SIZE];
		h.copy_from_slice(blake_hash.as_bytes());
		Hash(h)
	}
}

/// Adapts a `Blake2b` context to `std::io::Write` so `ser::serialize` can
/// feed it directly without materializing an intermediate `Vec<u8>`.
struct HashWriter<'a>(&'a mut Blake2b);

impl<'a> std::io::Write for HashWriter<'a> {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.0.update(buf);
		Ok(buf.len())
	}
	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn hash_of_u64_is_deterministic() {
		let a: u64 = 42;
		let b: u64 = 42;
		assert_eq!(a.hash(), b.hash());
		assert_ne!(a.hash(), 43u64.hash());
	}

	#[test]
	fn hash_with_combines_both_sides() {
		let a = 1u64.hash();
		let b = 2u64.hash();
		assert_eq!(a.hash_with(b), a.hash_with(b));
		assert_ne!(a.hash_with(b), b.hash_with(a));
	}

	#[test]
	fn hex_roundtrip() {
		let h = 7u64.hash();
		assert_eq!(h.to_hex().len(), 64);
	}
}
