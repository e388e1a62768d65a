//! Tile manager: ties the scan/start passes (C5), the LRU pool (C6), and the query/pyramid paths
//! (C7, C8) together behind the `Created` → `Scanned` → `Running` state machine (§4.9).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CvfError, Result};
use crate::fix::BboxFix;
use crate::tile::index::{self, ScanReport, Tile};
use crate::tile::pool::LruPool;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum State {
	Created,
	Scanned,
	Running,
}

/// Aggregates many CVF2 files laid out on a regular tile grid.
pub struct TileManager {
	dir: PathBuf,
	tile_width: u32,
	tile_height: u32,
	min_file_size: u64,
	max_file_size: u64,
	max_tiles: u64,

	state: State,
	srid: i32,
	union_bbox: BboxFix,
	x_tile_count: u32,
	y_tile_count: u32,
	tiles: Arc<[Tile]>,
	last_scan: Option<index::ScanResult>,

	pool: LruPool,
}

impl TileManager {
	pub fn new(dir: impl AsRef<Path>, tile_width: u32, tile_height: u32, pool_capacity: usize) -> Self {
		Self {
			dir: dir.as_ref().to_path_buf(),
			tile_width,
			tile_height,
			min_file_size: 0,
			max_file_size: u64::MAX,
			max_tiles: 1_000_000,
			state: State::Created,
			srid: 0,
			union_bbox: BboxFix::default(),
			x_tile_count: 0,
			y_tile_count: 0,
			tiles: Arc::from(Vec::new().into_boxed_slice()),
			last_scan: None,
			pool: LruPool::new(pool_capacity),
		}
	}

	pub fn set_file_size_range(&mut self, min: u64, max: u64) {
		self.min_file_size = min;
		self.max_file_size = max;
	}

	pub fn set_max_tiles(&mut self, max: u64) { self.max_tiles = max; }

	/// Runs (or re-runs; idempotent per §4.9) the scan pass over the configured directory.
	pub fn scan(&mut self) -> Result<ScanReport> {
		let result = index::scan_pass(
			&self.dir,
			self.tile_width,
			self.tile_height,
			self.min_file_size,
			self.max_file_size,
			self.max_tiles,
		)?;

		self.srid = result.srid;
		self.union_bbox = result.union_bbox;
		self.x_tile_count = result.x_tile_count;
		self.y_tile_count = result.y_tile_count;
		let report = result.report;
		self.last_scan = Some(result);
		self.state = State::Scanned;
		Ok(report)
	}

	/// Allocates the tile array from the most recent scan and transitions to `Running`.
	pub fn start(&mut self) -> Result<u64> {
		if self.state == State::Created {
			return Err(CvfError::config("tile manager must be scanned before start"));
		}
		let scan = self.last_scan.as_ref().expect("scanned state implies a scan result");
		let (tiles, multi_init_count) = index::start_pass(scan, self.tile_width, self.tile_height)?;
		self.tiles = Arc::from(tiles.into_boxed_slice());
		self.state = State::Running;
		Ok(multi_init_count)
	}

	pub fn srid(&self) -> i32 { self.srid }

	pub fn union_bbox(&self) -> BboxFix { self.union_bbox }

	pub fn tile_width(&self) -> u32 { self.tile_width }

	pub fn tile_height(&self) -> u32 { self.tile_height }

	pub fn x_tile_count(&self) -> u32 { self.x_tile_count }

	pub fn y_tile_count(&self) -> u32 { self.y_tile_count }

	pub(crate) fn tiles(&self) -> &Arc<[Tile]> { &self.tiles }

	pub(crate) fn pool(&self) -> &LruPool { &self.pool }

	pub fn open_count(&self) -> u64 { self.pool.open_count() }

	pub fn close_count(&self) -> u64 { self.pool.close_count() }
}

// Multi-file scenarios exercising scan/start/query together live in `geo/tests/tile_manager.rs`,
// where a real temp directory of fixture CVF2 files can be built (§1.4).
