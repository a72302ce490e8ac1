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

//! Minimal hex encode/decode. `serde` doesn't do hex for us and pulling in
//! a dedicated crate for something this small isn't worth it.

use std::fmt::Write;
use std::num::ParseIntError;

/// Encodes the provided bytes into a lower-case hex string.
pub fn to_hex(bytes: &[u8]) -> String {
	let mut s = String::with_capacity(bytes.len() * 2);
	for byte in bytes {
		write!(&mut s, "{:02x}", byte).expect("string write cannot fail");
	}
	s
}

/// Decodes a hex string (with or without a leading "0x") into bytes.
pub fn from_hex(hex_str: &str) -> Result<Vec<u8>, ParseIntError> {
	let trimmed = if hex_str.starts_with("0x") {
		&hex_str[2..]
	} else {
		hex_str
	};
	(0..trimmed.len())
		.step_by(2)
		.map(|i| u8::from_str_radix(&trimmed[i..i + 2], 16))
		.collect()
}
