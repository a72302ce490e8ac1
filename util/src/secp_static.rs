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

//! Process-wide secp256k1 context. Building a context is expensive enough
//! (it generates the precomputed tables) that every crate sharing one
//! instance is worth the `lazy_static` plumbing.

use crate::secp::{ContextFlag, Secp256k1};
use rand::thread_rng;
use std::sync::{Arc, Mutex};

lazy_static! {
	/// Static reference to a secp instance with full (sign + commit + verify)
	/// capabilities, shared by every crate in the workspace.
	pub static ref SECP256K1: Arc<Mutex<Secp256k1>> =
		Arc::new(Mutex::new(Secp256k1::with_caps(ContextFlag::Commit)));
}

/// Returns the static instance, re-randomizing it first as a defense
/// against side-channel attacks on repeated use of the same context.
pub fn static_secp_instance() -> Arc<Mutex<Secp256k1>> {
	let mut secp = SECP256K1.lock().unwrap();
	secp.randomize(&mut thread_rng());
	SECP256K1.clone()
}

/// A Pedersen commitment to the value zero, used to pad a commitment sum
/// without perturbing it and as the sentinel filtered out of summed
/// commitment lists before calling into secp.
pub fn commit_to_zero_value() -> crate::secp::pedersen::Commitment {
	let secp = static_secp_instance();
	let secp = secp.lock().unwrap();
	secp.commit_value(0).expect("commit to zero value never fails")
}
