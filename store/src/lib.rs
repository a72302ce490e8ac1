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

//! File-backed storage primitives: the append-only flat file underlying
//! both a MMR hash log and its data log, a roaring bitmap file with
//! transactional commit/rollback, a leaf-set built on top of it, a
//! `Backend<T>` implementation wiring the flat files into `mwc_core`'s
//! pure MMR geometry, and the LMDB key/value substrate `BlockDB` is
//! layered on by the chain crate.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#[macro_use]
extern crate failure_derive;

pub mod bitmap_file;
pub mod flatfile;
pub mod leaf_set;
pub mod lmdb;
pub mod pmmr;

pub use crate::bitmap_file::BitmapFile;
pub use crate::leaf_set::LeafSet;
pub use crate::lmdb::{Batch, Error, SerIterator, Store};
pub use crate::pmmr::PMMRBackend;
