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

//! Low-level utilities shared across the chain core crates: hex encoding,
//! a process-wide secp256k1 context and a test-only logger initializer.
//! Deliberately small - configuration loading and log sink wiring belong
//! to the surrounding server process, not to this core.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#[macro_use]
extern crate lazy_static;

// Re-export so downstream crates only need one name for the crypto façade.
pub extern crate grin_secp256k1zkp as secp;

pub mod hex;
pub mod secp_static;

pub use crate::hex::{from_hex, to_hex};
pub use crate::secp_static::static_secp_instance;

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

/// Initializes a simple env_logger-backed sink for use in test binaries.
/// Idempotent - safe to call from every test that needs log output.
pub fn init_test_logger() {
	LOGGER_INIT.call_once(|| {
		let _ = env_logger::Builder::from_default_env()
			.is_test(true)
			.try_init();
	});
}
