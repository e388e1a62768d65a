//! Bounded open-file LRU pool (C6): keeps at most `capacity` [`Cvf2Reader`]s open, evicting the
//! least-recently-used slot to admit a new tile.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::reader::Cvf2Reader;
use crate::tile::index::Tile;

struct Slot {
	/// Index into the tile array this slot currently holds a reader for, if any.
	tile_index: Option<usize>,
	reader: Option<Cvf2Reader>,
	last_access: u64,
}

/// A bounded pool of open [`Cvf2Reader`]s, keyed by tile index.
///
/// Acquisition is a short, coarse-grained critical section (§12.5): find-or-evict a slot, then
/// open or reuse its reader. This is guarded by a plain [`Mutex`] rather than a lock-free
/// structure, matching the reference workspace's preference for straightforward `std::sync`
/// primitives.
pub struct LruPool {
	slots: Mutex<Vec<Slot>>,
	clock: AtomicU64,

	opens: AtomicU64,
	closes: AtomicU64,
	open_failed: AtomicU64,
}

impl LruPool {
	pub fn new(capacity: usize) -> Self {
		let slots = (0..capacity).map(|_| Slot { tile_index: None, reader: None, last_access: 0 }).collect();
		Self { slots: Mutex::new(slots), clock: AtomicU64::new(0), opens: AtomicU64::new(0), closes: AtomicU64::new(0), open_failed: AtomicU64::new(0) }
	}

	pub fn open_count(&self) -> u64 { self.opens.load(Ordering::Relaxed) }

	pub fn close_count(&self) -> u64 { self.closes.load(Ordering::Relaxed) }

	pub fn open_failed_count(&self) -> u64 { self.open_failed.load(Ordering::Relaxed) }

	/// Acquires a reader for `tile`, opening its file if it is not already resident, evicting the
	/// least-recently-used slot if the pool is full. Calls `f` with the reader while holding the
	/// pool's lock, since readers are not `Send`-shared across threads (§5).
	pub fn with_reader<R>(&self, tile_index: usize, tile: &Tile, f: impl FnOnce(&mut Cvf2Reader) -> R) -> Option<R> {
		let mut slots = self.slots.lock().unwrap();
		let now = self.clock.fetch_add(1, Ordering::Relaxed);

		if let Some(slot) = slots.iter_mut().find(|s| s.tile_index == Some(tile_index)) {
			slot.last_access = now;
			return Some(f(slot.reader.as_mut().unwrap()));
		}

		let victim = slots
			.iter()
			.position(|s| s.reader.is_none())
			.unwrap_or_else(|| slots.iter().enumerate().min_by_key(|(_, s)| s.last_access).unwrap().0);

		if slots[victim].reader.take().is_some() {
			self.closes.fetch_add(1, Ordering::Relaxed);
			log::debug!("evicting tile slot {victim} to admit tile {tile_index}");
		}

		match Cvf2Reader::open(&tile.file_path) {
			Ok(reader) => {
				self.opens.fetch_add(1, Ordering::Relaxed);
				slots[victim] = Slot { tile_index: Some(tile_index), reader: Some(reader), last_access: now };
				Some(f(slots[victim].reader.as_mut().unwrap()))
			},
			Err(e) => {
				self.open_failed.fetch_add(1, Ordering::Relaxed);
				slots[victim] = Slot { tile_index: None, reader: None, last_access: 0 };
				log::warn!("failed to open tile {}: {e}", tile.file_path.display());
				None
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::length_unit::LengthUnit;
	use crate::tile::index::TileErrorFlags;
	use crate::writer::Cvf2Writer;
	use std::path::PathBuf;

	fn make_tile(dir: &std::path::Path, name: &str, fill: i64) -> Tile {
		let path = dir.join(name);
		let mut writer = Cvf2Writer::new(2, 2, LengthUnit::Meter, 2, 2);
		writer.open(&path).unwrap();
		for _ in 0..4 {
			writer.push_value(fill).unwrap();
		}
		writer.finish().unwrap();
		Tile {
			file_path: path,
			x_index: 0,
			y_index: 0,
			x_offset: 0,
			y_offset: 0,
			width: 2,
			height: 2,
			valid: true,
			error_flags: TileErrorFlags::empty(),
		}
	}

	#[test]
	fn reuses_resident_tile_without_reopening() {
		let dir = tempfile::tempdir().unwrap();
		let tile = make_tile(dir.path(), "a.cvf", 5);
		let pool = LruPool::new(16);

		for _ in 0..3 {
			let v = pool.with_reader(0, &tile, |r| r.value_at(0, 0, false).unwrap()).unwrap();
			assert_eq!(v, 5);
		}
		assert_eq!(pool.open_count(), 1);
		assert_eq!(pool.close_count(), 0);
	}

	#[test]
	fn eviction_sequence_matches_expected_close_pattern() {
		let dir = tempfile::tempdir().unwrap();
		let a = make_tile(dir.path(), "a.cvf", 1);
		let b = make_tile(dir.path(), "b.cvf", 2);
		let c = make_tile(dir.path(), "c.cvf", 3);
		let pool = LruPool::new(2);

		pool.with_reader(0, &a, |_| ()); // A
		pool.with_reader(1, &b, |_| ()); // B
		pool.with_reader(0, &a, |_| ()); // A (hit, bump)
		pool.with_reader(2, &c, |_| ()); // evicts B
		pool.with_reader(1, &b, |_| ()); // evicts A

		assert_eq!(pool.open_count(), 5);
		assert_eq!(pool.close_count(), 2);
	}

	#[test]
	fn open_failure_is_counted_and_returns_none() {
		let pool = LruPool::new(16);
		let tile = Tile {
			file_path: PathBuf::from("/nonexistent/path/x.cvf"),
			x_index: 0,
			y_index: 0,
			x_offset: 0,
			y_offset: 0,
			width: 0,
			height: 0,
			valid: false,
			error_flags: TileErrorFlags::empty(),
		};
		let result = pool.with_reader(0, &tile, |_| ());
		assert!(result.is_none());
		assert_eq!(pool.open_failed_count(), 1);
	}
}
