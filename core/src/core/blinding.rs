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

//! `BlindingFactor`, a 32-byte scalar wrapper around a secp256k1 secret
//! key. Kept here rather than behind a key-derivation crate because the
//! header and kernel offset need it without pulling in wallet/mnemonic
//! concerns.

use std::cmp::min;
use std::fmt;

use mwc_util::secp::constants::SECRET_KEY_SIZE;
use mwc_util::secp::key::{SecretKey, ZERO_KEY};
use mwc_util::secp::{self, Secp256k1};

use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// A blinding factor, stored as a raw scalar rather than a `SecretKey` so
/// it can be all-zero (the additive identity) without tripping secp's
/// "not a valid secret key" check.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct BlindingFactor([u8; SECRET_KEY_SIZE]);

impl fmt::Debug for BlindingFactor {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "BlindingFactor({})", self.to_hex())
	}
}

impl AsRef<[u8]> for BlindingFactor {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl BlindingFactor {
	/// Wraps a secp secret key as a blinding factor.
	pub fn from_secret_key(skey: SecretKey) -> BlindingFactor {
		BlindingFactor::from_slice(skey.as_ref())
	}

	/// Builds a blinding factor from raw bytes, zero-padding on the right
	/// if fewer than 32 bytes are given.
	pub fn from_slice(data: &[u8]) -> BlindingFactor {
		let mut inner = [0u8; SECRET_KEY_SIZE];
		let n = min(SECRET_KEY_SIZE, data.len());
		inner[..n].copy_from_slice(&data[..n]);
		BlindingFactor(inner)
	}

	/// The additive identity - the all-zero scalar.
	pub fn zero() -> BlindingFactor {
		BlindingFactor([0u8; SECRET_KEY_SIZE])
	}

	/// Hex representation of the underlying bytes.
	pub fn to_hex(&self) -> String {
		mwc_util::to_hex(&self.0)
	}

	/// Recovers a usable secp `SecretKey`. The all-zero blinding factor is
	/// not itself a valid secret key under secp's rules, so it maps to
	/// secp's own zero key constant rather than round-tripping through
	/// `SecretKey::from_slice`.
	pub fn secret_key(&self, secp: &Secp256k1) -> Result<SecretKey, secp::Error> {
		if *self == BlindingFactor::zero() {
			Ok(ZERO_KEY)
		} else {
			SecretKey::from_slice(secp, &self.0)
		}
	}
}

impl Writeable for BlindingFactor {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(&self.0)
	}
}

impl Readable for BlindingFactor {
	fn read(reader: &mut dyn Reader) -> Result<BlindingFactor, ser::Error> {
		let data = reader.read_fixed_bytes(SECRET_KEY_SIZE)?;
		Ok(BlindingFactor::from_slice(&data))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn zero_is_not_a_valid_secp_secret_key_but_resolves_anyway() {
		let secp = Secp256k1::with_caps(mwc_util::secp::ContextFlag::None);
		let zero = BlindingFactor::zero();
		assert_eq!(zero.secret_key(&secp).unwrap(), ZERO_KEY);
	}

	#[test]
	fn roundtrip_through_ser() {
		let bf = BlindingFactor::from_slice(&[7u8; SECRET_KEY_SIZE]);
		let bytes = ser::ser_vec(&bf).unwrap();
		let back: BlindingFactor = ser::deserialize(&mut &bytes[..]).unwrap();
		assert_eq!(bf, back);
	}
}
