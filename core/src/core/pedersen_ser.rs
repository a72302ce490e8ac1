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

//! `Writeable`/`Readable` for the secp types that flow through the wire
//! format: a fixed 33-byte Pedersen commitment and a variable-length
//! range proof. Both live in an external crate, so these impls are the
//! only place the codec and secp meet.

use mwc_util::secp::constants::{MAX_PROOF_SIZE, PEDERSEN_COMMITMENT_SIZE};
use mwc_util::secp::pedersen::{Commitment, RangeProof};

use crate::ser::{self, Readable, Reader, Writeable, Writer};

impl Writeable for Commitment {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(self.as_ref())
	}
}

impl Readable for Commitment {
	fn read(reader: &mut dyn Reader) -> Result<Commitment, ser::Error> {
		let data = reader.read_fixed_bytes(PEDERSEN_COMMITMENT_SIZE)?;
		Ok(Commitment::from_vec(data))
	}
}

impl Writeable for RangeProof {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_bytes(self.bytes())
	}
}

impl Readable for RangeProof {
	fn read(reader: &mut dyn Reader) -> Result<RangeProof, ser::Error> {
		let data = reader.read_bytes()?;
		if data.len() > MAX_PROOF_SIZE {
			return Err(ser::Error::CorruptedData);
		}
		let mut proof = [0u8; MAX_PROOF_SIZE];
		proof[..data.len()].copy_from_slice(&data);
		Ok(RangeProof {
			proof,
			plen: data.len(),
		})
	}
}
