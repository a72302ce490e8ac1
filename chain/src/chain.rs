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

//! Facade over the block database and the UTXO state: the two chain
//! views (candidate, header-only; confirmed, fully validated), the
//! orphan pool, and the reorg orchestration that keeps them consistent.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use log::debug;

use mwc_core::core::block::{BlockHeader, FullBlock};
use mwc_core::core::block_sums::BlockSums;
use mwc_core::core::hash::Hash;

use crate::error::{Error, Status};
use crate::locks::ChainStore;
use crate::store::{BlockDB, WriteContext};
use crate::txhashset::TxHashSet;
use crate::types::{ChainView, Tip};
use crate::validators;

/// Default cap on the orphan pool; overridable per [`Chain::init_with_capacity`].
pub use mwc_core::consensus::MAX_ORPHAN_POOL_SIZE;

/// A block buffered because its parent isn't confirmed yet, indexed both
/// by its own hash and by the parent hash it's waiting on.
struct OrphanPoolInner {
	blocks: HashMap<Hash, FullBlock>,
	by_parent: HashMap<Hash, Vec<Hash>>,
	order: VecDeque<Hash>,
}

/// Bounded FIFO pool of orphaned blocks. Unlike a height-based eviction
/// policy, the oldest *arrival* is evicted once the pool is full -
/// simplest to reason about and cheap to maintain with just a deque.
struct OrphanPool {
	capacity: usize,
	inner: Mutex<OrphanPoolInner>,
}

impl OrphanPool {
	fn new(capacity: usize) -> OrphanPool {
		OrphanPool {
			capacity,
			inner: Mutex::new(OrphanPoolInner {
				blocks: HashMap::new(),
				by_parent: HashMap::new(),
				order: VecDeque::new(),
			}),
		}
	}

	fn insert(&self, block: FullBlock) {
		let hash = block.hash();
		let parent = block.header.previous;
		let mut inner = self.inner.lock().unwrap();
		if inner.blocks.contains_key(&hash) {
			return;
		}
		inner.by_parent.entry(parent).or_default().push(hash);
		inner.order.push_back(hash);
		inner.blocks.insert(hash, block);

		while inner.order.len() > self.capacity {
			if let Some(oldest) = inner.order.pop_front() {
				if let Some(b) = inner.blocks.remove(&oldest) {
					if let Some(siblings) = inner.by_parent.get_mut(&b.header.previous) {
						siblings.retain(|h| *h != oldest);
					}
				}
				debug!("orphan pool full, evicted oldest entry {}", oldest);
			}
		}
	}

	/// Removes and returns every orphan directly waiting on `parent`.
	fn take_children(&self, parent: &Hash) -> Vec<FullBlock> {
		let mut inner = self.inner.lock().unwrap();
		let hashes = inner.by_parent.remove(parent).unwrap_or_default();
		let mut out = Vec::with_capacity(hashes.len());
		for h in hashes {
			inner.order.retain(|x| *x != h);
			if let Some(b) = inner.blocks.remove(&h) {
				out.push(b);
			}
		}
		out
	}

	/// Removes and returns the oldest orphan whose parent satisfies
	/// `ready`, if any.
	fn take_ready<F: Fn(&Hash) -> bool>(&self, ready: F) -> Option<FullBlock> {
		let mut inner = self.inner.lock().unwrap();
		let hash = inner
			.order
			.iter()
			.copied()
			.find(|h| inner.blocks.get(h).map(|b| ready(&b.header.previous)).unwrap_or(false))?;
		inner.order.retain(|h| *h != hash);
		let block = inner.blocks.remove(&hash)?;
		if let Some(siblings) = inner.by_parent.get_mut(&block.header.previous) {
			siblings.retain(|h| *h != hash);
		}
		Some(block)
	}

	fn len(&self) -> usize {
		self.inner.lock().unwrap().blocks.len()
	}
}

/// Whether a competing header/block at the same total difficulty as the
/// current tip should replace it: the lexicographically lower hash wins.
fn beats(total_difficulty: u128, hash: Hash, tip: &Tip) -> bool {
	total_difficulty > tip.total_difficulty || (total_difficulty == tip.total_difficulty && hash < tip.hash)
}

/// Rewrites a view's height->hash index along the branch ending at
/// `header`, stopping as soon as it reaches a height whose existing
/// entry already agrees (the common ancestor with whatever was indexed
/// before), and drops any now-stale entries above the new tip's height.
fn reindex_view(ctx: &mut WriteContext, view: ChainView, header: &BlockHeader, old_tip: Tip) -> Result<(), Error> {
	if old_tip.height > header.height {
		for h in (header.height + 1)..=old_tip.height {
			ctx.delete_height_hash(view, h)?;
		}
	}

	let mut cur = header.clone();
	loop {
		let hash = cur.hash();
		if ctx.get_height_hash(view, cur.height)? == Some(hash) {
			break;
		}
		ctx.set_height_hash(view, cur.height, &hash)?;
		if cur.height == 0 {
			break;
		}
		cur = ctx.get_header(&cur.previous)?;
	}
	Ok(())
}

/// Facade over the block database and UTXO state: maintains the
/// candidate/confirmed chain views, the orphan pool, and orchestrates
/// reorgs across both stores transactionally.
pub struct Chain {
	store: ChainStore,
	orphans: OrphanPool,
	sync_status: AtomicBool,
}

impl Chain {
	/// Opens (or creates) a chain rooted at `db_root`/`txhashset_root`,
	/// bootstrapping from `genesis` if no confirmed tip is recorded yet.
	/// `genesis` is trusted as-is: it is persisted and applied to the
	/// UTXO state directly, without running the self-consistency or
	/// kernel-sum validators that gate every later block.
	pub fn init<P: AsRef<Path>>(db_root: P, txhashset_root: P, genesis: FullBlock) -> Result<Chain, Error> {
		Chain::init_with_capacity(db_root, txhashset_root, genesis, MAX_ORPHAN_POOL_SIZE)
	}

	/// As [`Chain::init`], with an explicit orphan-pool capacity.
	pub fn init_with_capacity<P: AsRef<Path>>(
		db_root: P,
		txhashset_root: P,
		genesis: FullBlock,
		orphan_pool_size: usize,
	) -> Result<Chain, Error> {
		let db = BlockDB::open(db_root)?;
		let txhashset = TxHashSet::open(txhashset_root)?;
		let chain = Chain {
			store: ChainStore::new(db, txhashset),
			orphans: OrphanPool::new(orphan_pool_size),
			sync_status: AtomicBool::new(false),
		};

		let has_tip = chain.store.db_read().get_tip(ChainView::Confirmed).is_ok();
		if !has_tip {
			chain.bootstrap_genesis(genesis)?;
		}
		Ok(chain)
	}

	fn bootstrap_genesis(&self, genesis: FullBlock) -> Result<(), Error> {
		let hash = genesis.hash();
		let tip = Tip::genesis(hash);
		let (db, mut txhashset) = self.store.write_both();

		let mut ctx = db.begin_write()?;
		ctx.put_header(&genesis.header)?;
		ctx.put_block(&genesis)?;
		txhashset.apply_block(&genesis, &ctx)?;
		ctx.put_block_sums(&hash, &BlockSums::default())?;
		ctx.set_height_hash(ChainView::Confirmed, 0, &hash)?;
		ctx.set_tip(ChainView::Confirmed, &tip)?;
		ctx.set_height_hash(ChainView::Candidate, 0, &hash)?;
		ctx.set_tip(ChainView::Candidate, &tip)?;

		match txhashset.commit().and_then(|_| ctx.commit()) {
			Ok(()) => {
				genesis.mark_validated();
				Ok(())
			}
			Err(e) => {
				txhashset.rollback();
				Err(e)
			}
		}
	}

	/// Accepts a header into the candidate chain: verifies proof of work,
	/// monotonic timestamp and the difficulty-accumulation rule against a
	/// known parent, then advances (and possibly reorganizes) the
	/// candidate tip if this header out-weighs it.
	pub fn add_header(&self, header: BlockHeader) -> Result<Status, Error> {
		let hash = header.hash();
		let db = self.store.db_read();
		if db.has_header(&hash)? {
			return Ok(Status::AlreadyExists);
		}
		if db.is_rejected(&hash)? {
			return Ok(Status::Invalid);
		}
		drop(db);

		match self.ingest_header(&header) {
			Ok(()) => Ok(Status::Success),
			Err(Error::Orphaned(parent)) => {
				debug!("header {} orphaned, unknown parent {}", hash, parent);
				Ok(Status::Orphaned)
			}
			Err(Error::BadData(msg)) => {
				debug!("header {} rejected: {}", hash, msg);
				self.store.db_read().mark_rejected(&hash)?;
				Ok(Status::Invalid)
			}
			Err(e) => Err(e),
		}
	}

	fn ingest_header(&self, header: &BlockHeader) -> Result<(), Error> {
		if !header.pow.is_well_formed() {
			return Err(Error::BadData("malformed proof of work".into()));
		}

		let (db, _txhashset) = self.store.write_both();
		if !db.has_header(&header.previous)? {
			return Err(Error::Orphaned(header.previous.to_hex()));
		}
		let parent = db.get_header(&header.previous)?;
		if header.timestamp <= parent.timestamp {
			return Err(Error::BadData("header timestamp does not advance".into()));
		}
		let required = parent.total_difficulty + header.pow.to_difficulty();
		if header.total_difficulty != required {
			return Err(Error::BadData(format!(
				"header declares total difficulty {}, expected {}",
				header.total_difficulty, required
			)));
		}

		let mut ctx = db.begin_write()?;
		ctx.put_header(header)?;
		let old_tip = db.get_tip(ChainView::Candidate)?;
		if beats(header.total_difficulty, header.hash(), &old_tip) {
			reindex_view(&mut ctx, ChainView::Candidate, header, old_tip)?;
			ctx.set_tip(
				ChainView::Candidate,
				&Tip {
					hash: header.hash(),
					height: header.height,
					total_difficulty: header.total_difficulty,
				},
			)?;
		}
		ctx.commit()
	}

	/// Accepts a full block: runs the self-consistency, coinbase and
	/// kernel-sum validators, persists the header and body, and extends
	/// or reorganizes the confirmed chain if this block's branch now
	/// out-weighs it. A block whose parent isn't yet confirmed is
	/// buffered in the orphan pool.
	pub fn add_block(&self, block: FullBlock) -> Result<Status, Error> {
		let hash = block.hash();
		let db = self.store.db_read();
		// `BlockSums` is written both when a block extends/reorgs onto the
		// confirmed tip and when it's accepted as a lighter-weight side
		// branch (see `ingest_block`), so this alone catches a resubmit of
		// either kind without needing a second, view-specific check.
		if db.get_block_sums(&hash).is_ok() {
			return Ok(Status::AlreadyExists);
		}
		if db.is_rejected(&hash)? {
			return Ok(Status::Invalid);
		}
		drop(db);

		match self.ingest_block(&block) {
			Ok(()) => {
				self.resolve_orphans(hash)?;
				Ok(Status::Success)
			}
			Err(Error::Orphaned(parent)) => {
				debug!("block {} orphaned, unknown/unconfirmed parent {}", hash, parent);
				self.orphans.insert(block);
				Ok(Status::Orphaned)
			}
			Err(Error::BadData(msg)) => {
				debug!("block {} rejected: {}", hash, msg);
				self.store.db_read().mark_rejected(&hash)?;
				Ok(Status::Invalid)
			}
			Err(e) => Err(e),
		}
	}

	fn ingest_block(&self, block: &FullBlock) -> Result<(), Error> {
		if !block.header.pow.is_well_formed() {
			return Err(Error::BadData("malformed proof of work".into()));
		}
		validators::validate_body_self_consistency(&block.body)?;
		validators::validate_coinbase(block)?;

		let hash = block.hash();
		let (db, mut txhashset) = self.store.write_both();

		if !db.has_header(&block.header.previous)? {
			return Err(Error::Orphaned(block.header.previous.to_hex()));
		}
		let parent_header = db.get_header(&block.header.previous)?;
		if block.header.timestamp <= parent_header.timestamp {
			return Err(Error::BadData("header timestamp does not advance".into()));
		}
		let required = parent_header.total_difficulty + block.header.pow.to_difficulty();
		if block.header.total_difficulty != required {
			return Err(Error::BadData(format!(
				"header declares total difficulty {}, expected {}",
				block.header.total_difficulty, required
			)));
		}

		// A parent with no recorded BlockSums has never passed the
		// validators itself, confirmed or not: treat it the same as an
		// unknown parent.
		if db.get_block_sums(&block.header.previous).is_err() {
			return Err(Error::Orphaned(block.header.previous.to_hex()));
		}

		let result = (|| -> Result<(), Error> {
			let mut ctx = db.begin_write()?;
			ctx.put_header(&block.header)?;

			let old_candidate = db.get_tip(ChainView::Candidate)?;
			if beats(block.header.total_difficulty, hash, &old_candidate) {
				reindex_view(&mut ctx, ChainView::Candidate, &block.header, old_candidate)?;
				ctx.set_tip(
					ChainView::Candidate,
					&Tip {
						hash,
						height: block.header.height,
						total_difficulty: block.header.total_difficulty,
					},
				)?;
			}

			let confirmed_tip = db.get_tip(ChainView::Confirmed)?;
			if !beats(block.header.total_difficulty, hash, &confirmed_tip) {
				// Valid, but not a better branch than the current confirmed
				// tip: record it (so a later block can extend it) without
				// touching the shared UTXO state.
				let parent_sums = db.get_block_sums(&block.header.previous)?;
				let sums = validators::verify_block_sums(block, Some(&parent_sums))?;
				ctx.put_block(block)?;
				ctx.put_block_sums(&hash, &sums)?;
				return ctx.commit();
			}

			if block.header.previous == confirmed_tip.hash {
				let parent_sums = db.get_block_sums(&block.header.previous)?;
				let sums = validators::verify_block_sums(block, Some(&parent_sums))?;
				ctx.put_block(block)?;
				txhashset.apply_block(block, &ctx)?;
				ctx.put_block_sums(&hash, &sums)?;
				ctx.set_height_hash(ChainView::Confirmed, block.header.height, &hash)?;
				ctx.set_tip(
					ChainView::Confirmed,
					&Tip {
						hash,
						height: block.header.height,
						total_difficulty: block.header.total_difficulty,
					},
				)?;
				txhashset.commit()?;
				return ctx.commit();
			}

			self.reorg_to(&db, &ctx, &mut txhashset, block, confirmed_tip)?;
			txhashset.commit()?;
			ctx.commit()
		})();

		if result.is_err() {
			txhashset.rollback();
		}
		result
	}

	/// Walks the confirmed chain back to the common ancestor with
	/// `block`'s branch, rewinding the UTXO state and the height index
	/// past it, then forward-applies every block on the target branch -
	/// including ones already persisted as unconfirmed side-blocks by an
	/// earlier `add_block` call - ending with `block` itself.
	fn reorg_to(
		&self,
		db: &BlockDB,
		ctx: &WriteContext,
		txhashset: &mut TxHashSet,
		block: &FullBlock,
		confirmed_tip: Tip,
	) -> Result<(), Error> {
		let hash = block.hash();
		let mut branch = vec![block.clone()];
		let mut cur_hash = block.header.previous;
		let mut cur_height = block.header.height - 1;
		let fork_hash;
		loop {
			if db.get_height_hash(ChainView::Confirmed, cur_height)? == Some(cur_hash) {
				fork_hash = cur_hash;
				break;
			}
			let b = db.get_block(&cur_hash)?;
			let next_hash = b.header.previous;
			branch.push(b);
			if cur_height == 0 {
				return Err(Error::InvalidState("reorg walked past genesis without finding a common ancestor".into()));
			}
			cur_hash = next_hash;
			cur_height -= 1;
		}
		branch.reverse();

		let mut unwind_hash = confirmed_tip.hash;
		let mut unwind_height = confirmed_tip.height;
		while unwind_height > cur_height {
			let b = db.get_block(&unwind_hash)?;
			let parent_header = db.get_header(&b.header.previous)?;
			txhashset.rewind_block(&b, &parent_header, ctx)?;
			ctx.delete_height_hash(ChainView::Confirmed, unwind_height)?;
			unwind_hash = b.header.previous;
			unwind_height -= 1;
		}

		let mut prior_sums = db.get_block_sums(&fork_hash)?;
		for b in &branch {
			let sums = validators::verify_block_sums(b, Some(&prior_sums))?;
			let bh = b.hash();
			ctx.put_block(b)?;
			txhashset.apply_block(b, ctx)?;
			ctx.put_block_sums(&bh, &sums)?;
			ctx.set_height_hash(ChainView::Confirmed, b.header.height, &bh)?;
			prior_sums = sums;
		}

		ctx.set_tip(
			ChainView::Confirmed,
			&Tip {
				hash,
				height: block.header.height,
				total_difficulty: block.header.total_difficulty,
			},
		)
	}

	fn resolve_orphans(&self, parent: Hash) -> Result<(), Error> {
		for child in self.orphans.take_children(&parent) {
			self.add_block(child)?;
		}
		Ok(())
	}

	/// Pops the oldest orphan whose parent is now confirmed and re-runs
	/// `add_block` on it. Returns whether any progress was made.
	pub fn process_next_orphan(&self) -> Result<bool, Error> {
		let ready = self
			.orphans
			.take_ready(|parent| self.store.db_read().get_block_sums(parent).is_ok());
		match ready {
			Some(block) => {
				self.add_block(block)?;
				Ok(true)
			}
			None => Ok(false),
		}
	}

	/// The current tip of the requested view.
	pub fn get_tip(&self, view: ChainView) -> Result<Tip, Error> {
		self.store.db_read().get_tip(view)
	}

	/// Looks up a full block by hash.
	pub fn get_block_by_hash(&self, hash: &Hash) -> Result<FullBlock, Error> {
		self.store.db_read().get_block(hash)
	}

	/// Looks up a full block by its height on the confirmed chain.
	pub fn get_block_by_height(&self, height: u64) -> Result<FullBlock, Error> {
		let db = self.store.db_read();
		let hash = db
			.get_height_hash(ChainView::Confirmed, height)?
			.ok_or_else(|| Error::BadData(format!("no confirmed block at height {}", height)))?;
		db.get_block(&hash)
	}

	/// Looks up the recorded balance sums for a confirmed (or
	/// side-branch) block.
	pub fn get_block_sums(&self, hash: &Hash) -> Result<BlockSums, Error> {
		self.store.db_read().get_block_sums(hash)
	}

	/// Looks up where an unspent output currently lives.
	pub fn get_output_position(&self, commit: &mwc_util::secp::pedersen::Commitment) -> Result<crate::types::OutputLocation, Error> {
		self.store.db_read().get_output_pos(commit)
	}

	/// Current size of the orphan pool.
	pub fn orphan_count(&self) -> usize {
		self.orphans.len()
	}

	/// Records whether a background sync driver is currently catching
	/// up. A pure sink: the chain manager itself doesn't change behavior
	/// based on it, it only makes the status available to callers (e.g.
	/// to decide whether to broadcast newly accepted blocks).
	pub fn update_sync_status(&self, syncing: bool) {
		self.sync_status.store(syncing, std::sync::atomic::Ordering::Relaxed);
	}

	/// Whether a background sync driver last reported itself as syncing.
	pub fn is_syncing(&self) -> bool {
		self.sync_status.load(std::sync::atomic::Ordering::Relaxed)
	}
}
