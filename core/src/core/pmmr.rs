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

//! Pure Merkle Mountain Range geometry, plus the generic `PMMR<T, B>`
//! wrapper that drives an arbitrary `Backend<T>` through append, rewind
//! and root computation. Node positions are 1-based, as in the original
//! MMR paper, so that on-disk state stays interchangeable across peers.
//!
//! The height sequence of a MMR (0,0,1,0,0,1,2,...) is identical to the
//! postorder traversal heights of an (infinite) perfect binary tree. All
//! geometry below - height, peaks, family - is derived from that one
//! observation using only bit tricks on the position, with no need to
//! materialize the tree.

use std::marker::PhantomData;

use crate::core::hash::Hash;

/// True if position `pos` is a leaf (height 0) in the MMR.
pub fn is_leaf(pos: u64) -> bool {
	height(pos) == 0
}

/// Height of the node at `pos` in the postorder traversal of the implied
/// binary tree. Leaves are height 0.
pub fn height(pos: u64) -> u64 {
	if pos == 0 {
		return 0;
	}
	let mut pos = pos;
	while !all_ones(pos) {
		pos = jump_left(pos);
	}
	most_significant_pos(pos) - 1
}

/// Positions of the peaks of a MMR of the given total size, left to right.
/// Returns an empty vector if `size` does not describe a valid MMR shape
/// (a set of siblings with no parent yet appended).
pub fn peaks(size: u64) -> Vec<u64> {
	if size == 0 {
		return vec![];
	}
	if height(size + 1) > height(size) {
		return vec![];
	}

	let mut top = 1u64;
	while (top - 1) <= size {
		top <<= 1;
	}
	top = (top >> 1) - 1;
	if top == 0 {
		return vec![];
	}

	let mut result = vec![top];
	let mut peak = top;
	loop {
		peak = jump_right_sibling(peak);
		while peak > size {
			match move_down_left(peak) {
				Some(p) => peak = p,
				None => return result,
			}
		}
		result.push(peak);
	}
}

/// Parent and sibling positions of `pos` within its subtree.
pub fn family(pos: u64) -> (u64, u64) {
	let h = height(pos);
	let sibling = if is_left_sibling(pos) {
		jump_right_sibling(pos)
	} else {
		jump_left_sibling(pos)
	};
	let parent = if is_left_sibling(pos) {
		pos + (1 << (h + 1))
	} else {
		pos + 1
	};
	(parent, sibling)
}

/// Whether `pos` is the left (as opposed to right) child of its parent.
pub fn is_left_sibling(pos: u64) -> bool {
	jump_right_sibling(pos) > pos
}

/// Number of leaves present in a (valid) MMR of the given size.
pub fn n_leaves(size: u64) -> u64 {
	peaks(size).into_iter().map(|peak| 1 << height(peak)).sum()
}

/// Node position (1-based) of the `n`th leaf inserted (`n` also 1-based).
/// Closed form: used by file-backed storage to address a leaf's data
/// record directly, without walking the tree.
pub fn insertion_to_pmmr_index(n: u64) -> u64 {
	if n == 0 {
		return 0;
	}
	let sz = n - 1;
	2 * sz - sz.count_ones() + 1
}

/// Inverse of `insertion_to_pmmr_index`: given the node position of a
/// leaf, returns its 1-based insertion order, or `None` if `pos` is not
/// in fact a leaf position.
pub fn leaf_pos_to_insertion_index(pos: u64) -> Option<u64> {
	if !is_leaf(pos) {
		return None;
	}
	let (mut lo, mut hi) = (1u64, pos);
	while lo < hi {
		let mid = lo + (hi - lo) / 2;
		if insertion_to_pmmr_index(mid) < pos {
			lo = mid + 1;
		} else {
			hi = mid;
		}
	}
	if insertion_to_pmmr_index(lo) == pos {
		Some(lo)
	} else {
		None
	}
}

/// Bags a list of peak hashes (left to right) into a single MMR root by
/// folding right to left: `H(peaks[0] || H(peaks[1] || H(... || peaks[n])))`.
/// Returns `ZERO_HASH` for an empty MMR.
pub fn bag_peaks(peak_hashes: &[Hash]) -> Hash {
	match peak_hashes.split_last() {
		None => crate::core::hash::ZERO_HASH,
		Some((last, rest)) => rest
			.iter()
			.rev()
			.fold(*last, |acc, peak| peak.hash_with(acc)),
	}
}

fn all_ones(pos: u64) -> bool {
	if pos == 0 {
		return false;
	}
	let mut bit = 1u64;
	while pos >= bit {
		if pos & bit == 0 {
			return false;
		}
		bit <<= 1;
	}
	true
}

fn most_significant_pos(pos: u64) -> u64 {
	let mut p = 0u64;
	let mut bit = 1u64;
	while pos >= bit {
		bit <<= 1;
		p += 1;
	}
	p
}

fn jump_left(pos: u64) -> u64 {
	pos - ((1 << (most_significant_pos(pos) - 1)) - 1)
}

fn move_down_left(pos: u64) -> Option<u64> {
	let h = height(pos);
	if h == 0 {
		return None;
	}
	Some(pos - (1 << h))
}

fn jump_right_sibling(pos: u64) -> u64 {
	pos + (1 << (height(pos) + 1)) - 1
}

fn jump_left_sibling(pos: u64) -> u64 {
	pos - ((1 << (height(pos) + 1)) - 1)
}

/// Storage contract a `PMMR` drives. Implementations own the durable
/// append-only hash log (and, for leaf-bearing trees, a parallel data
/// file); `PMMR` itself holds no state beyond the backend and its size.
pub trait Backend<T> {
	/// Appends new (hash, optional leaf data) pairs starting at the
	/// backend's current size. Non-leaf parent hashes carry `None` data.
	fn append(&mut self, data: Vec<(Hash, Option<T>)>) -> Result<(), String>;

	/// Hash stored at `pos`, if any.
	fn get_hash(&self, pos: u64) -> Option<Hash>;

	/// Leaf data stored at `pos`, if `pos` is a leaf and still carries data.
	fn get_data(&self, pos: u64) -> Option<T>;

	/// Truncates the backend to exactly `pos` nodes.
	fn rewind(&mut self, pos: u64) -> Result<(), String>;

	/// Current size of the backend, in nodes.
	fn unpruned_size(&self) -> u64;
}

/// Drives an arbitrary `Backend<T>` through the append-only MMR protocol.
pub struct PMMR<'a, T, B>
where
	B: Backend<T>,
{
	/// Total size, in nodes, of the MMR this instance is positioned at.
	pub last_pos: u64,
	backend: &'a mut B,
	_marker: PhantomData<T>,
}

impl<'a, T, B> PMMR<'a, T, B>
where
	B: Backend<T>,
	T: Clone + crate::ser::Writeable,
{
	/// Positions a new `PMMR` view over `backend` at the given size.
	pub fn at(backend: &'a mut B, last_pos: u64) -> PMMR<'a, T, B> {
		PMMR {
			last_pos,
			backend,
			_marker: PhantomData,
		}
	}

	/// Appends a new leaf element, writing its hash and any resulting
	/// parent hashes. Returns the position the leaf was written at.
	pub fn push(&mut self, elmt: T) -> Result<u64, String> {
		let elmt_pos = self.last_pos + 1;
		let leaf_hash = crate::core::hash::Hashed::hash(&elmt);

		let mut to_append = vec![(leaf_hash, Some(elmt.clone()))];
		let mut pos = elmt_pos;
		let mut current_hash = leaf_hash;

		// Climb while the node just written has a left sibling already
		// present in the tree, emitting the parent hash each time.
		while is_left_sibling_materialized(pos, self.last_pos) {
			let (parent_pos, sibling_pos) = family(pos);
			let sibling_hash = self
				.backend
				.get_hash(sibling_pos)
				.ok_or_else(|| format!("missing sibling hash at {}", sibling_pos))?;
			let parent_hash = sibling_hash.hash_with(current_hash);
			to_append.push((parent_hash, None));
			current_hash = parent_hash;
			pos = parent_pos;
		}

		let new_size = self.last_pos + to_append.len() as u64;
		self.backend.append(to_append)?;
		self.last_pos = new_size;
		Ok(elmt_pos)
	}

	/// Current root: the bagged peaks of the MMR at `last_pos`.
	pub fn root(&self) -> Hash {
		let peak_hashes: Vec<Hash> = peaks(self.last_pos)
			.into_iter()
			.filter_map(|pos| self.backend.get_hash(pos))
			.collect();
		bag_peaks(&peak_hashes)
	}

	/// Hash stored at `pos`.
	pub fn get_hash(&self, pos: u64) -> Option<Hash> {
		self.backend.get_hash(pos)
	}

	/// Leaf data stored at `pos`.
	pub fn get_data(&self, pos: u64) -> Option<T> {
		self.backend.get_data(pos)
	}

	/// Truncates the MMR to `pos` nodes.
	pub fn rewind(&mut self, pos: u64) -> Result<(), String> {
		self.backend.rewind(pos)?;
		self.last_pos = pos;
		Ok(())
	}

	/// Current size, in nodes.
	pub fn unpruned_size(&self) -> u64 {
		self.last_pos
	}
}

/// Whether the node about to occupy `pos` (with the tree currently sized
/// `size_before`) completes a pair whose left sibling already exists -
/// i.e. whether appending should continue climbing to write a parent.
fn is_left_sibling_materialized(pos: u64, _size_before: u64) -> bool {
	!is_left_sibling(pos)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn leaf_heights() {
		assert_eq!(height(1), 0);
		assert_eq!(height(2), 0);
		assert_eq!(height(3), 1);
		assert_eq!(height(4), 0);
		assert_eq!(height(7), 2);
	}

	#[test]
	fn is_leaf_matches_height() {
		assert!(is_leaf(1));
		assert!(!is_leaf(3));
		assert!(is_leaf(4));
	}

	#[test]
	fn peaks_of_small_sizes() {
		assert_eq!(peaks(1), vec![1]);
		assert_eq!(peaks(3), vec![3]);
		assert_eq!(peaks(4), vec![3, 4]);
		assert_eq!(peaks(7), vec![7]);
		assert_eq!(peaks(10), vec![7, 9, 10]);
		// 2 is mid-tree: one leaf with no parent yet - invalid shape.
		assert_eq!(peaks(2), Vec::<u64>::new());
	}

	#[test]
	fn insertion_index_roundtrips_through_leaf_positions() {
		// Leaves land at 1, 2, 4, 5, 8, 9, 11, ... (1-based positions of
		// the first few leaves in the MMR produced by sequential pushes).
		let leaf_positions: Vec<u64> = (1..20).filter(|&p| is_leaf(p)).collect();
		for (i, &pos) in leaf_positions.iter().enumerate() {
			let n = (i + 1) as u64;
			assert_eq!(insertion_to_pmmr_index(n), pos);
			assert_eq!(leaf_pos_to_insertion_index(pos), Some(n));
		}
	}

	#[test]
	fn non_leaf_position_has_no_insertion_index() {
		assert_eq!(leaf_pos_to_insertion_index(3), None);
	}

	struct VecBackend {
		hashes: Vec<Hash>,
		data: Vec<Option<u64>>,
	}

	impl Backend<u64> for VecBackend {
		fn append(&mut self, d: Vec<(Hash, Option<u64>)>) -> Result<(), String> {
			for (h, v) in d {
				self.hashes.push(h);
				self.data.push(v);
			}
			Ok(())
		}
		fn get_hash(&self, pos: u64) -> Option<Hash> {
			self.hashes.get((pos - 1) as usize).cloned()
		}
		fn get_data(&self, pos: u64) -> Option<u64> {
			self.data.get((pos - 1) as usize).cloned().flatten()
		}
		fn rewind(&mut self, pos: u64) -> Result<(), String> {
			self.hashes.truncate(pos as usize);
			self.data.truncate(pos as usize);
			Ok(())
		}
		fn unpruned_size(&self) -> u64 {
			self.hashes.len() as u64
		}
	}

	#[test]
	fn push_and_root_over_seven_leaves() {
		let mut backend = VecBackend {
			hashes: vec![],
			data: vec![],
		};
		let mut pmmr: PMMR<u64, VecBackend> = PMMR::at(&mut backend, 0);
		for i in 0..7u64 {
			pmmr.push(i).unwrap();
		}
		// 7 leaves produce a single perfect-tree peak at position 11,
		// i.e. a MMR size of 11 nodes (7 leaves + 3 height-1 + 1 height-2).
		assert_eq!(pmmr.unpruned_size(), 11);
		assert_eq!(peaks(pmmr.unpruned_size()), vec![11]);
		let root = pmmr.root();
		assert_ne!(root, crate::core::hash::ZERO_HASH);
	}

	#[test]
	fn rewind_restores_prior_root() {
		let mut backend = VecBackend {
			hashes: vec![],
			data: vec![],
		};
		let mut pmmr: PMMR<u64, VecBackend> = PMMR::at(&mut backend, 0);
		pmmr.push(1u64).unwrap();
		let size_after_one = pmmr.unpruned_size();
		let root_after_one = pmmr.root();
		pmmr.push(2u64).unwrap();
		pmmr.push(3u64).unwrap();
		pmmr.rewind(size_after_one).unwrap();
		assert_eq!(pmmr.root(), root_after_one);
		assert_eq!(pmmr.get_data(1), Some(1u64));
	}
}
