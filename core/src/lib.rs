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

//! Data model, binary codec and Merkle Mountain Range geometry shared by
//! the block database and TxHashSet. Deterministic given its inputs - no
//! wall-clock or network I/O happens in this crate.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate lazy_static;

pub mod consensus;
pub mod core;
pub mod global;
pub mod ser;

pub use crate::core::hash;
