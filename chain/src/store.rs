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

//! The block database: a single LMDB-backed key space split into
//! column-family-style regions by a one-byte prefix, plus a small LRU
//! cache of recently-committed headers sitting in front of it.

use std::path::Path;
use std::sync::{Arc, Mutex};

use lru_cache::LruCache;

use mwc_core::consensus::HEADER_CACHE_SIZE;
use mwc_core::core::block::{BlockHeader, FullBlock};
use mwc_core::core::block_sums::BlockSums;
use mwc_core::core::hash::Hash;
use mwc_store::lmdb::{self, option_to_not_found, Batch, Store};
use mwc_util::secp::pedersen::Commitment;

use crate::error::Error;
use crate::types::{ChainView, OutputLocation, SpentOutput, SpentOutputs, Tip};

const HEADER_PREFIX: u8 = b'H';
const BLOCK_PREFIX: u8 = b'B';
const BLOCK_SUMS_PREFIX: u8 = b'S';
const OUTPUT_POS_PREFIX: u8 = b'O';
const INPUT_BITMAP_PREFIX: u8 = b'I';
const SPENT_OUTPUTS_PREFIX: u8 = b'P';
const HEIGHT_HASH_PREFIX: u8 = b'h';
const TIP_PREFIX: u8 = b'T';
const REJECTED_PREFIX: u8 = b'R';

fn view_tag(view: ChainView) -> u8 {
	match view {
		ChainView::Candidate => b'c',
		ChainView::Confirmed => b'f',
	}
}

fn keyed(prefix: u8, suffix: &[u8]) -> Vec<u8> {
	let mut key = Vec::with_capacity(1 + suffix.len());
	key.push(prefix);
	key.extend_from_slice(suffix);
	key
}

fn height_key(view: ChainView, height: u64) -> Vec<u8> {
	let mut key = vec![HEIGHT_HASH_PREFIX, view_tag(view)];
	key.extend_from_slice(&height.to_be_bytes());
	key
}

fn tip_key(view: ChainView) -> Vec<u8> {
	vec![TIP_PREFIX, view_tag(view)]
}

/// The block database. Owns the LMDB environment's `Store` handle and a
/// bounded cache of recently-committed headers.
pub struct BlockDB {
	store: Store,
	header_cache: Mutex<LruCache<Hash, BlockHeader>>,
}

impl BlockDB {
	/// Opens (creating if necessary) the block database under `root_path`.
	pub fn open<P: AsRef<Path>>(root_path: P) -> Result<BlockDB, Error> {
		let env = Arc::new(lmdb::new_env(
			root_path.as_ref().to_string_lossy().into_owned(),
		));
		let store = Store::open(env, "chain");
		Ok(BlockDB {
			store,
			header_cache: Mutex::new(LruCache::new(HEADER_CACHE_SIZE)),
		})
	}

	/// Looks up a header by hash, preferring the in-memory cache.
	pub fn get_header(&self, hash: &Hash) -> Result<BlockHeader, Error> {
		if let Some(h) = self.header_cache.lock().unwrap().get_mut(hash) {
			return Ok(h.clone());
		}
		let key = keyed(HEADER_PREFIX, hash.as_bytes());
		let header: BlockHeader =
			option_to_not_found(self.store.get_ser(&key), "header").map_err(Error::from)?;
		self.header_cache.lock().unwrap().insert(*hash, header.clone());
		Ok(header)
	}

	/// Whether a header for `hash` is known.
	pub fn has_header(&self, hash: &Hash) -> Result<bool, Error> {
		if self.header_cache.lock().unwrap().contains_key(hash) {
			return Ok(true);
		}
		let key = keyed(HEADER_PREFIX, hash.as_bytes());
		Ok(self.store.exists(&key)?)
	}

	/// Looks up a full block by hash.
	pub fn get_block(&self, hash: &Hash) -> Result<FullBlock, Error> {
		let key = keyed(BLOCK_PREFIX, hash.as_bytes());
		option_to_not_found(self.store.get_ser(&key), "block").map_err(Error::from)
	}

	/// Looks up the balance sums recorded for `hash`.
	pub fn get_block_sums(&self, hash: &Hash) -> Result<BlockSums, Error> {
		let key = keyed(BLOCK_SUMS_PREFIX, hash.as_bytes());
		option_to_not_found(self.store.get_ser(&key), "block_sums").map_err(Error::from)
	}

	/// Looks up where an (unspent) output currently lives.
	pub fn get_output_pos(&self, commit: &Commitment) -> Result<OutputLocation, Error> {
		let key = keyed(OUTPUT_POS_PREFIX, commit.0.as_ref());
		option_to_not_found(self.store.get_ser(&key), "output_pos").map_err(Error::from)
	}

	/// The hash at `height` within the given chain view, if any.
	pub fn get_height_hash(&self, view: ChainView, height: u64) -> Result<Option<Hash>, Error> {
		Ok(self.store.get_ser(&height_key(view, height))?)
	}

	/// The current tip of the given chain view.
	pub fn get_tip(&self, view: ChainView) -> Result<Tip, Error> {
		option_to_not_found(self.store.get_ser(&tip_key(view)), "tip").map_err(Error::from)
	}

	/// Opens a write transaction. Header puts are buffered and only
	/// promoted into the LRU cache once the transaction commits.
	pub fn begin_write(&self) -> Result<WriteContext<'_>, Error> {
		Ok(WriteContext {
			db: self,
			batch: self.store.batch()?,
			uncommitted: Vec::new(),
		})
	}

	/// Whether `hash` has been permanently rejected by a validator.
	pub fn is_rejected(&self, hash: &Hash) -> Result<bool, Error> {
		let key = keyed(REJECTED_PREFIX, hash.as_bytes());
		Ok(self.store.exists(&key)?)
	}

	/// Records `hash` as permanently rejected, committed immediately and
	/// independently of any in-flight write transaction so a failed
	/// validator never has to thread the record through its own rollback.
	pub fn mark_rejected(&self, hash: &Hash) -> Result<(), Error> {
		let batch = self.store.batch()?;
		let key = keyed(REJECTED_PREFIX, hash.as_bytes());
		batch.put(&key, Vec::new())?;
		batch.commit()?;
		Ok(())
	}
}

/// A buffered write transaction against the block database.
pub struct WriteContext<'a> {
	db: &'a BlockDB,
	batch: Batch<'a>,
	uncommitted: Vec<(Hash, BlockHeader)>,
}

impl<'a> WriteContext<'a> {
	/// Buffers a header put, read-your-writes visible immediately.
	pub fn put_header(&mut self, header: &BlockHeader) -> Result<(), Error> {
		let hash = header.hash();
		let key = keyed(HEADER_PREFIX, hash.as_bytes());
		self.batch.put_ser(&key, header)?;
		self.uncommitted.push((hash, header.clone()));
		Ok(())
	}

	/// Looks up a header, preferring this transaction's own writes, then
	/// the base database.
	pub fn get_header(&self, hash: &Hash) -> Result<BlockHeader, Error> {
		if let Some((_, h)) = self.uncommitted.iter().rev().find(|(h, _)| h == hash) {
			return Ok(h.clone());
		}
		let key = keyed(HEADER_PREFIX, hash.as_bytes());
		if let Some(header) = self.batch.get_ser(&key)? {
			return Ok(header);
		}
		self.db.get_header(hash)
	}

	/// Buffers a full block put.
	pub fn put_block(&self, block: &FullBlock) -> Result<(), Error> {
		let key = keyed(BLOCK_PREFIX, block.hash().as_bytes());
		self.batch.put_ser(&key, block)?;
		Ok(())
	}

	pub fn get_block(&self, hash: &Hash) -> Result<FullBlock, Error> {
		let key = keyed(BLOCK_PREFIX, hash.as_bytes());
		if let Some(block) = self.batch.get_ser(&key)? {
			return Ok(block);
		}
		self.db.get_block(hash)
	}

	/// Buffers a `BlockSums` put.
	pub fn put_block_sums(&self, hash: &Hash, sums: &BlockSums) -> Result<(), Error> {
		let key = keyed(BLOCK_SUMS_PREFIX, hash.as_bytes());
		self.batch.put_ser(&key, sums)?;
		Ok(())
	}

	pub fn get_block_sums(&self, hash: &Hash) -> Result<BlockSums, Error> {
		let key = keyed(BLOCK_SUMS_PREFIX, hash.as_bytes());
		if let Some(sums) = self.batch.get_ser(&key)? {
			return Ok(sums);
		}
		self.db.get_block_sums(hash)
	}

	/// Buffers an `OutputLocation` put.
	pub fn put_output_pos(&self, commit: &Commitment, loc: &OutputLocation) -> Result<(), Error> {
		let key = keyed(OUTPUT_POS_PREFIX, commit.0.as_ref());
		self.batch.put_ser(&key, loc)?;
		Ok(())
	}

	pub fn get_output_pos(&self, commit: &Commitment) -> Result<Option<OutputLocation>, Error> {
		let key = keyed(OUTPUT_POS_PREFIX, commit.0.as_ref());
		if let Some(loc) = self.batch.get_ser(&key)? {
			return Ok(Some(loc));
		}
		Ok(self.db.get_output_pos(commit).ok())
	}

	/// Removes an `OutputLocation` row, e.g. when unwinding a block that
	/// created the output.
	pub fn delete_output_pos(&self, commit: &Commitment) -> Result<(), Error> {
		let key = keyed(OUTPUT_POS_PREFIX, commit.0.as_ref());
		self.batch.delete(&key)?;
		Ok(())
	}

	/// Buffers the Roaring-encoded input bitmap for a block.
	pub fn put_input_bitmap(&self, hash: &Hash, bytes: &[u8]) -> Result<(), Error> {
		let key = keyed(INPUT_BITMAP_PREFIX, hash.as_bytes());
		self.batch.put(&key, bytes.to_vec())?;
		Ok(())
	}

	/// Buffers the spent-output list for a block.
	pub fn put_spent_outputs(&self, hash: &Hash, spent: &[SpentOutput]) -> Result<(), Error> {
		let key = keyed(SPENT_OUTPUTS_PREFIX, hash.as_bytes());
		self.batch.put_ser(&key, &SpentOutputs(spent.to_vec()))?;
		Ok(())
	}

	pub fn get_spent_outputs(&self, hash: &Hash) -> Result<Vec<SpentOutput>, Error> {
		let key = keyed(SPENT_OUTPUTS_PREFIX, hash.as_bytes());
		if let Some(SpentOutputs(spent)) = self.batch.get_ser(&key)? {
			return Ok(spent);
		}
		Ok(self.db.get_spent_outputs(hash).unwrap_or_default())
	}

	/// Records `hash` at `height` in the given chain view's height index.
	pub fn set_height_hash(&self, view: ChainView, height: u64, hash: &Hash) -> Result<(), Error> {
		self.batch.put_ser(&height_key(view, height), hash)?;
		Ok(())
	}

	/// Removes the height-index entry, used when a reorg shortens a view.
	pub fn delete_height_hash(&self, view: ChainView, height: u64) -> Result<(), Error> {
		self.batch.delete(&height_key(view, height))?;
		Ok(())
	}

	/// Reads the height-index entry, preferring this transaction's own
	/// writes. Used to find the common ancestor of two branches without a
	/// separate read-only pass over the base database.
	pub fn get_height_hash(&self, view: ChainView, height: u64) -> Result<Option<Hash>, Error> {
		let key = height_key(view, height);
		if let Some(hash) = self.batch.get_ser(&key)? {
			return Ok(Some(hash));
		}
		self.db.get_height_hash(view, height)
	}

	/// Updates the recorded tip for a chain view.
	pub fn set_tip(&self, view: ChainView, tip: &Tip) -> Result<(), Error> {
		self.batch.put_ser(&tip_key(view), tip)?;
		Ok(())
	}

	/// Finalizes the transaction and promotes buffered header writes into
	/// the shared LRU cache.
	pub fn commit(self) -> Result<(), Error> {
		self.batch.commit()?;
		let mut cache = self.db.header_cache.lock().unwrap();
		for (hash, header) in self.uncommitted {
			cache.insert(hash, header);
		}
		Ok(())
	}

	/// Discards all buffered writes; the underlying LMDB transaction is
	/// dropped without committing.
	pub fn rollback(self) {
		drop(self.batch);
	}
}

impl BlockDB {
	fn get_spent_outputs(&self, hash: &Hash) -> Result<Vec<SpentOutput>, Error> {
		let key = keyed(SPENT_OUTPUTS_PREFIX, hash.as_bytes());
		match self.store.get_ser::<SpentOutputs>(&key)? {
			Some(SpentOutputs(spent)) => Ok(spent),
			None => Ok(Vec::new()),
		}
	}

	/// Looks up the Roaring-encoded input bitmap recorded for a block.
	pub fn get_input_bitmap(&self, hash: &Hash) -> Result<Vec<u8>, Error> {
		let key = keyed(INPUT_BITMAP_PREFIX, hash.as_bytes());
		option_to_not_found(self.store.get(&key), "input_bitmap").map_err(Error::from)
	}
}
