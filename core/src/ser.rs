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

//! Binary encoding layer used throughout the chain core. Big-endian
//! fixed-width integers, length-prefixed byte arrays and variable
//! collections, `0|1`-prefixed optionals. Implement `Writeable`/`Readable`
//! on a type and use `serialize`/`deserialize` (or `ser_vec`) on it.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use failure::Fail;

/// Default cap on a single declared length prefix, guarding against a
/// corrupt or hostile buffer claiming an absurd allocation.
pub const DEFAULT_MAX_READ_LEN: u64 = 10 * 1024 * 1024;

/// Errors arising from serializing or deserializing a binary stream.
#[derive(Debug, Fail)]
pub enum Error {
	/// Wraps an io error produced when reading or writing.
	#[fail(display = "IO error: {}", _0)]
	IOErr(String),
	/// Expected a given value that wasn't found.
	#[fail(display = "unexpected data: expected {:?}, got {:?}", expected, received)]
	UnexpectedData {
		/// What we expected to read.
		expected: Vec<u8>,
		/// What we actually read.
		received: Vec<u8>,
	},
	/// Data wasn't in a consumable format.
	#[fail(display = "corrupted data")]
	CorruptedData,
	/// A declared length exceeded the configured cap.
	#[fail(display = "read of {} bytes exceeds the {} byte limit", _0, _1)]
	TooLargeReadErr(u64, u64),
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::IOErr(format!("{}", e))
	}
}

/// Writes primitives to an underlying `Write` in the wire format.
pub trait Writer {
	fn write_u8(&mut self, n: u8) -> Result<(), Error> {
		self.write_fixed_bytes(&[n])
	}
	fn write_u16(&mut self, n: u16) -> Result<(), Error> {
		let mut buf = [0u8; 2];
		BigEndian::write_u16(&mut buf, n);
		self.write_fixed_bytes(&buf)
	}
	fn write_u32(&mut self, n: u32) -> Result<(), Error> {
		let mut buf = [0u8; 4];
		BigEndian::write_u32(&mut buf, n);
		self.write_fixed_bytes(&buf)
	}
	fn write_i32(&mut self, n: i32) -> Result<(), Error> {
		self.write_u32(n as u32)
	}
	fn write_u64(&mut self, n: u64) -> Result<(), Error> {
		let mut buf = [0u8; 8];
		BigEndian::write_u64(&mut buf, n);
		self.write_fixed_bytes(&buf)
	}
	fn write_i64(&mut self, n: i64) -> Result<(), Error> {
		self.write_u64(n as u64)
	}
	fn write_u128(&mut self, n: u128) -> Result<(), Error> {
		self.write_fixed_bytes(&n.to_be_bytes())
	}
	fn write_bool(&mut self, b: bool) -> Result<(), Error> {
		self.write_u8(if b { 1 } else { 0 })
	}
	/// Writes a length-prefixed byte slice (u64 count prefix).
	fn write_bytes<T: AsRef<[u8]>>(&mut self, bytes: T) -> Result<(), Error> {
		let b = bytes.as_ref();
		self.write_u64(b.len() as u64)?;
		self.write_fixed_bytes(b)
	}
	/// Writes raw bytes with no length prefix - the reader already knows
	/// the length (used for fixed-size fields such as hashes).
	fn write_fixed_bytes<T: AsRef<[u8]>>(&mut self, bytes: T) -> Result<(), Error>;
}

/// Reads primitives from an underlying `Read`, enforcing the configured
/// maximum length on any declared size prefix.
pub trait Reader {
	fn read_u8(&mut self) -> Result<u8, Error>;
	fn read_u16(&mut self) -> Result<u16, Error>;
	fn read_u32(&mut self) -> Result<u32, Error>;
	fn read_i32(&mut self) -> Result<i32, Error> {
		Ok(self.read_u32()? as i32)
	}
	fn read_u64(&mut self) -> Result<u64, Error>;
	fn read_i64(&mut self) -> Result<i64, Error> {
		Ok(self.read_u64()? as i64)
	}
	fn read_u128(&mut self) -> Result<u128, Error>;
	fn read_bool(&mut self) -> Result<bool, Error> {
		match self.read_u8()? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(Error::CorruptedData),
		}
	}
	/// Reads a length-prefixed byte vector, rejecting a declared length
	/// beyond this reader's configured cap.
	fn read_bytes(&mut self) -> Result<Vec<u8>, Error> {
		let len = self.read_u64()?;
		self.read_fixed_bytes(len as usize)
	}
	/// Reads exactly `len` bytes with no length prefix.
	fn read_fixed_bytes(&mut self, len: usize) -> Result<Vec<u8>, Error>;
	/// Consumes a u64 count prefix for a variable-length collection,
	/// checked against the cap to avoid pre-allocating on bad input.
	fn read_count(&mut self) -> Result<u64, Error>;
	/// Errors unless the next byte equals `val`.
	fn expect_u8(&mut self, val: u8) -> Result<u8, Error> {
		let b = self.read_u8()?;
		if b != val {
			return Err(Error::UnexpectedData {
				expected: vec![val],
				received: vec![b],
			});
		}
		Ok(b)
	}
}

/// A type that can write itself to a `Writer`.
pub trait Writeable {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error>;
}

/// A type that can read itself from a `Reader`.
pub trait Readable: Sized {
	fn read(reader: &mut dyn Reader) -> Result<Self, Error>;
}

/// A `Writeable` whose serialized length is fixed and known up front -
/// required for elements stored in an MMR data file, which is addressed
/// by `position * record_len` rather than by a length prefix.
pub trait PMMRable: Writeable + Readable + Clone + Send + Sync {
	/// The length in bytes of this type's serialization. Must be constant
	/// across all instances.
	fn len() -> usize;
}

macro_rules! impl_int {
	($int:ty, $w:ident, $r:ident) => {
		impl Writeable for $int {
			fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
				writer.$w(*self)
			}
		}
		impl Readable for $int {
			fn read(reader: &mut dyn Reader) -> Result<$int, Error> {
				reader.$r()
			}
		}
	};
}

impl_int!(u8, write_u8, read_u8);
impl_int!(u16, write_u16, read_u16);
impl_int!(u32, write_u32, read_u32);
impl_int!(u64, write_u64, read_u64);
impl_int!(i32, write_i32, read_i32);
impl_int!(i64, write_i64, read_i64);
impl_int!(u128, write_u128, read_u128);

impl<T: Writeable> Writeable for Option<T> {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		match self {
			Some(v) => {
				writer.write_u8(1)?;
				v.write(writer)
			}
			None => writer.write_u8(0),
		}
	}
}

impl<T: Readable> Readable for Option<T> {
	fn read(reader: &mut dyn Reader) -> Result<Option<T>, Error> {
		match reader.read_u8()? {
			0 => Ok(None),
			1 => Ok(Some(T::read(reader)?)),
			_ => Err(Error::CorruptedData),
		}
	}
}

impl<T: Writeable> Writeable for Vec<T> {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_u64(self.len() as u64)?;
		for item in self {
			item.write(writer)?;
		}
		Ok(())
	}
}

impl<T: Readable> Readable for Vec<T> {
	fn read(reader: &mut dyn Reader) -> Result<Vec<T>, Error> {
		let count = reader.read_count()?;
		let mut out = Vec::with_capacity(count.min(4096) as usize);
		for _ in 0..count {
			out.push(T::read(reader)?);
		}
		Ok(out)
	}
}

/// A `Writer` that writes into any `std::io::Write`.
pub struct BinWriter<'a> {
	sink: &'a mut dyn Write,
}

impl<'a> BinWriter<'a> {
	pub fn new(sink: &'a mut dyn Write) -> BinWriter<'a> {
		BinWriter { sink }
	}
}

impl<'a> Writer for BinWriter<'a> {
	fn write_fixed_bytes<T: AsRef<[u8]>>(&mut self, bytes: T) -> Result<(), Error> {
		self.sink.write_all(bytes.as_ref())?;
		Ok(())
	}
}

/// A `Reader` that reads from any `std::io::Read`, enforcing `max_len` on
/// every declared length prefix it consumes.
pub struct BinReader<'a> {
	source: &'a mut dyn Read,
	max_len: u64,
}

impl<'a> BinReader<'a> {
	pub fn new(source: &'a mut dyn Read) -> BinReader<'a> {
		BinReader {
			source,
			max_len: DEFAULT_MAX_READ_LEN,
		}
	}

	pub fn with_limit(source: &'a mut dyn Read, max_len: u64) -> BinReader<'a> {
		BinReader { source, max_len }
	}
}

impl<'a> Reader for BinReader<'a> {
	fn read_u8(&mut self) -> Result<u8, Error> {
		Ok(self.source.read_u8()?)
	}
	fn read_u16(&mut self) -> Result<u16, Error> {
		Ok(self.source.read_u16::<BigEndian>()?)
	}
	fn read_u32(&mut self) -> Result<u32, Error> {
		Ok(self.source.read_u32::<BigEndian>()?)
	}
	fn read_u64(&mut self) -> Result<u64, Error> {
		Ok(self.source.read_u64::<BigEndian>()?)
	}
	fn read_u128(&mut self) -> Result<u128, Error> {
		let mut buf = [0u8; 16];
		self.source.read_exact(&mut buf)?;
		Ok(u128::from_be_bytes(buf))
	}
	fn read_fixed_bytes(&mut self, len: usize) -> Result<Vec<u8>, Error> {
		if len as u64 > self.max_len {
			return Err(Error::TooLargeReadErr(len as u64, self.max_len));
		}
		let mut buf = vec![0u8; len];
		self.source.read_exact(&mut buf)?;
		Ok(buf)
	}
	fn read_count(&mut self) -> Result<u64, Error> {
		let count = self.read_u64()?;
		if count > self.max_len {
			return Err(Error::TooLargeReadErr(count, self.max_len));
		}
		Ok(count)
	}
}

/// Serializes a `Writeable` into any `std::io::Write`.
pub fn serialize<W: Writeable>(sink: &mut dyn Write, thing: &W) -> Result<(), Error> {
	let mut writer = BinWriter::new(sink);
	thing.write(&mut writer)
}

/// Serializes a `Writeable` into a freshly allocated `Vec<u8>`.
pub fn ser_vec<W: Writeable>(thing: &W) -> Result<Vec<u8>, Error> {
	let mut vec = Vec::new();
	serialize(&mut vec, thing)?;
	Ok(vec)
}

/// Deserializes a `Readable` from any `std::io::Read`, using the default
/// length cap.
pub fn deserialize<T: Readable>(source: &mut dyn Read) -> Result<T, Error> {
	let mut reader = BinReader::new(source);
	T::read(&mut reader)
}

/// Deserializes a `Readable`, enforcing a caller-supplied length cap
/// instead of `DEFAULT_MAX_READ_LEN` (used when decoding a message whose
/// own framing already bounds the buffer to less than 10 MiB).
pub fn deserialize_with_limit<T: Readable>(source: &mut dyn Read, max_len: u64) -> Result<T, Error> {
	let mut reader = BinReader::with_limit(source, max_len);
	T::read(&mut reader)
}

#[cfg(test)]
mod test {
	use super::*;

	#[derive(Debug, PartialEq, Eq, Clone)]
	struct Pair(u32, u64);

	impl Writeable for Pair {
		fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
			writer.write_u32(self.0)?;
			writer.write_u64(self.1)
		}
	}

	impl Readable for Pair {
		fn read(reader: &mut dyn Reader) -> Result<Pair, Error> {
			Ok(Pair(reader.read_u32()?, reader.read_u64()?))
		}
	}

	#[test]
	fn roundtrip_struct() {
		let p = Pair(7, 1234567890123);
		let bytes = ser_vec(&p).unwrap();
		let back: Pair = deserialize(&mut &bytes[..]).unwrap();
		assert_eq!(p, back);
	}

	#[test]
	fn roundtrip_vec_and_option() {
		let v: Vec<u64> = vec![1, 2, 3, 4];
		let bytes = ser_vec(&v).unwrap();
		let back: Vec<u64> = deserialize(&mut &bytes[..]).unwrap();
		assert_eq!(v, back);

		let o: Option<u32> = Some(99);
		let bytes = ser_vec(&o).unwrap();
		let back: Option<u32> = deserialize(&mut &bytes[..]).unwrap();
		assert_eq!(o, back);

		let n: Option<u32> = None;
		let bytes = ser_vec(&n).unwrap();
		let back: Option<u32> = deserialize(&mut &bytes[..]).unwrap();
		assert_eq!(n, back);
	}

	#[test]
	fn oversized_length_prefix_is_rejected() {
		// Declares a 1 GiB byte array without actually providing the bytes.
		let mut buf = Vec::new();
		buf.write_u64::<BigEndian>(1 << 30).unwrap();
		let mut reader = BinReader::new(&mut &buf[..]);
		let res = reader.read_bytes();
		assert!(matches!(res, Err(Error::TooLargeReadErr(_, _))));
	}

	#[test]
	fn u128_roundtrip() {
		let n: u128 = 340_282_366_920_938_463_463_374_607_431_768_211_455;
		let bytes = ser_vec(&n).unwrap();
		let back: u128 = deserialize(&mut &bytes[..]).unwrap();
		assert_eq!(n, back);
	}
}
