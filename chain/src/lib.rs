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

//! The chain manager: a block database, a UTXO state (`TxHashSet`), the
//! validators that gate entry into either, and the `Chain` facade that
//! ties them together behind a fixed lock order.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#[macro_use]
extern crate failure_derive;

pub mod chain;
pub mod error;
pub mod locks;
pub mod store;
pub mod txhashset;
pub mod types;
pub mod validators;

pub use crate::chain::Chain;
pub use crate::error::{Error, Status};
pub use crate::types::{BlockStatus, ChainView, Tip};
