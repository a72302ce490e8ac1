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

//! Error taxonomy shared by the block database, the TxHashSet and the
//! chain manager. Kinds, not type hierarchies: every fallible operation
//! in this crate returns one of these variants, never a raw string.

use mwc_core::core::committed;
use mwc_core::ser;
use mwc_store::lmdb;

/// Errors surfaced across the chain core.
#[derive(Debug, Fail)]
pub enum Error {
	/// Malformed bytes on deserialization.
	#[fail(display = "codec error: {}", _0)]
	Codec(String),
	/// The underlying key/value store failed. Fatal to the write in
	/// progress, recoverable across process restarts.
	#[fail(display = "db I/O error: {}", _0)]
	DbIO(String),
	/// A consensus-rule violation: sum mismatch, bad range proof, wrong
	/// MMR size, sort-order violation. The offending block is marked
	/// `REJECTED` and is not retried.
	#[fail(display = "bad data: {}", _0)]
	BadData(String),
	/// Parent of an ingested header or block is unknown; buffered in the
	/// orphan pool. Not fatal.
	#[fail(display = "orphaned block, parent {} unknown", _0)]
	Orphaned(String),
	/// An internal invariant was broken (e.g. MMR size disagrees with
	/// the header declaring it). Aborts the current write and escalates.
	#[fail(display = "invalid internal state: {}", _0)]
	InvalidState(String),
	/// Session token unknown or expired (wallet collaborator boundary
	/// only; the chain core never produces this variant itself).
	#[fail(display = "session error: {}", _0)]
	Session(String),
}

impl From<ser::Error> for Error {
	fn from(e: ser::Error) -> Error {
		Error::Codec(format!("{}", e))
	}
}

impl From<lmdb::Error> for Error {
	fn from(e: lmdb::Error) -> Error {
		match e {
			lmdb::Error::NotFoundErr(msg) => Error::BadData(format!("not found: {}", msg)),
			other => Error::DbIO(format!("{}", other)),
		}
	}
}

impl From<committed::Error> for Error {
	fn from(e: committed::Error) -> Error {
		Error::BadData(format!("{:?}", e))
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Error {
		Error::DbIO(format!("{}", e))
	}
}

impl From<zip::result::ZipError> for Error {
	fn from(e: zip::result::ZipError) -> Error {
		Error::DbIO(format!("{}", e))
	}
}

impl From<String> for Error {
	fn from(e: String) -> Error {
		Error::InvalidState(e)
	}
}

/// Whether this error should abort and roll back the current write
/// transaction rather than simply being reported to the caller.
impl Error {
	pub fn is_fatal_to_write(&self) -> bool {
		matches!(self, Error::DbIO(_) | Error::InvalidState(_))
	}
}

/// Status values returned on ingest, matching the external control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	/// Accepted and committed.
	Success,
	/// Already present; no-op.
	AlreadyExists,
	/// Parent unknown; buffered for later.
	Orphaned,
	/// Failed validation; marked `REJECTED`.
	Invalid,
	/// Declared transactions are missing from the local pool (reserved
	/// for the surrounding server; the core never returns this itself).
	TransactionsMissing,
}
