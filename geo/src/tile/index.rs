//! Tile index and scan (C5): discovers candidate CVF2 files, derives the union extent, and lays
//! out the tile grid.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CvfError, Result};
use crate::fix::BboxFix;
use crate::reader::Cvf2Reader;

/// Anomalies recorded on a [`Tile`] during the start pass. A hand-rolled flag set rather than
/// pulling in the `bitflags` crate for four bits.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct TileErrorFlags(u8);

impl TileErrorFlags {
	pub const OFFSET_NEGATIVE: TileErrorFlags = TileErrorFlags(1 << 0);
	pub const SIZE_TOO_LARGE: TileErrorFlags = TileErrorFlags(1 << 1);
	pub const OFFSET_PLUS_SIZE_TOO_LARGE: TileErrorFlags = TileErrorFlags(1 << 2);
	pub const FRACTIONAL_OFFSET: TileErrorFlags = TileErrorFlags(1 << 3);

	pub const fn empty() -> Self { TileErrorFlags(0) }

	pub fn is_empty(self) -> bool { self.0 == 0 }

	pub fn contains(self, other: TileErrorFlags) -> bool { self.0 & other.0 == other.0 }
}

impl std::ops::BitOr for TileErrorFlags {
	type Output = TileErrorFlags;
	fn bitor(self, rhs: TileErrorFlags) -> TileErrorFlags { TileErrorFlags(self.0 | rhs.0) }
}

impl std::ops::BitOrAssign for TileErrorFlags {
	fn bitor_assign(&mut self, rhs: TileErrorFlags) { self.0 |= rhs.0; }
}

/// One CVF2 file's place within the tile grid.
#[derive(Clone)]
pub struct Tile {
	pub file_path: PathBuf,
	pub x_index: i64,
	pub y_index: i64,
	pub x_offset: u32,
	pub y_offset: u32,
	pub width: u32,
	pub height: u32,
	pub valid: bool,
	pub error_flags: TileErrorFlags,
}

/// Anomaly counters accumulated by a scan pass.
#[derive(Default, Debug, Clone, Copy)]
pub struct ScanReport {
	pub files_scanned: u64,
	pub files_failed: u64,
	pub wrong_dimension_count: u64,
	pub multi_init_count: u64,
	pub undef_count: i64,
	pub min_value: i64,
	pub max_value: i64,
}

pub(crate) struct ScanResult {
	pub union_bbox: BboxFix,
	pub srid: i32,
	pub x_tile_count: u32,
	pub y_tile_count: u32,
	pub report: ScanReport,
	pub candidates: Vec<PathBuf>,
}

/// Lists files under `dir` with extension `.cvf` whose size in bytes falls within
/// `[min_size, max_size]`.
fn list_candidates(dir: &Path, min_size: u64, max_size: u64) -> Result<Vec<PathBuf>> {
	let mut out = Vec::new();
	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();
		if path.extension().and_then(|e| e.to_str()) != Some("cvf") {
			continue;
		}
		let size = entry.metadata()?.len();
		if size >= min_size && size <= max_size {
			out.push(path);
		}
	}
	out.sort();
	Ok(out)
}

/// Runs the scan pass (§4.5 step 1): opens every candidate file's header, accumulates the union
/// bounding box and statistics, and derives the tile-grid dimensions. Does not allocate the tile
/// array; see [`start_pass`] for that.
pub(crate) fn scan_pass(
	dir: &Path,
	tile_width: u32,
	tile_height: u32,
	min_size: u64,
	max_size: u64,
	max_tiles: u64,
) -> Result<ScanResult> {
	let candidates = list_candidates(dir, min_size, max_size)?;

	let mut union_bbox: Option<BboxFix> = None;
	let mut srid: Option<i32> = None;
	let mut report = ScanReport { min_value: i64::MAX, max_value: i64::MIN, ..Default::default() };

	for path in &candidates {
		log::debug!("scanning {}", path.display());
		match Cvf2Reader::open(path) {
			Ok(reader) => {
				report.files_scanned += 1;

				match srid {
					None => srid = Some(reader.srid()),
					Some(expected) if expected != reader.srid() => {
						return Err(CvfError::corrupt(format!(
							"SRID mismatch: expected {expected}, found {} in {}",
							reader.srid(),
							path.display()
						)));
					},
					_ => {},
				}

				if reader.width() != tile_width || reader.height() != tile_height {
					report.wrong_dimension_count += 1;
					log::warn!(
						"wrong-dimension tile {} ({}x{}, expected {}x{})",
						path.display(),
						reader.width(),
						reader.height(),
						tile_width,
						tile_height
					);
				}

				union_bbox = Some(match union_bbox {
					Some(b) => b.union(&reader.bbox()),
					None => reader.bbox(),
				});

				if reader.min_value() != crate::row_codec::UNDEFINED_VALUE {
					report.min_value = report.min_value.min(reader.min_value());
					report.max_value = report.max_value.max(reader.max_value());
				}
				report.undef_count += reader.undef_count() as i64;
			},
			Err(e) => {
				report.files_failed += 1;
				log::warn!("failed to open {}: {e}", path.display());
			},
		}
	}

	let union_bbox = union_bbox.unwrap_or_default();
	let srid = srid.unwrap_or(0);

	let x_tile_count = if tile_width > 0 { (union_bbox.width() / tile_width as f64).floor() as u32 + 1 } else { 1 };
	let y_tile_count = if tile_height > 0 { (union_bbox.height() / tile_height as f64).floor() as u32 + 1 } else { 1 };

	if (x_tile_count as u64) * (y_tile_count as u64) > max_tiles {
		return Err(CvfError::capacity(format!(
			"tile grid of {x_tile_count}x{y_tile_count} exceeds limit of {max_tiles}"
		)));
	}

	Ok(ScanResult { union_bbox, srid, x_tile_count, y_tile_count, report, candidates })
}

/// Runs the start pass (§4.5 step 2): maps each candidate file to a slot in the tile grid and
/// validates that its offset/size fit within the nominal tile rectangle.
pub(crate) fn start_pass(
	scan: &ScanResult,
	tile_width: u32,
	tile_height: u32,
) -> Result<(Vec<Tile>, u64)> {
	let mut tiles: Vec<Option<Tile>> =
		vec![None; scan.x_tile_count as usize * scan.y_tile_count as usize];
	let mut multi_init_count = 0u64;

	for path in &scan.candidates {
		let reader = match Cvf2Reader::open(path) {
			Ok(r) => r,
			Err(_) => continue,
		};

		let bbox = reader.bbox();
		let center_x = (bbox.min_x.to_f64() + bbox.max_x.to_f64()) / 2.0;
		let center_y = (bbox.min_y.to_f64() + bbox.max_y.to_f64()) / 2.0;

		let rel_x = center_x - scan.union_bbox.min_x.to_f64();
		let rel_y = center_y - scan.union_bbox.min_y.to_f64();

		let x_index = (rel_x / tile_width as f64).floor() as i64;
		let y_index = (rel_y / tile_height as f64).floor() as i64;

		if x_index < 0
			|| y_index < 0
			|| x_index >= scan.x_tile_count as i64
			|| y_index >= scan.y_tile_count as i64
		{
			continue;
		}

		let tile_origin_x = scan.union_bbox.min_x.to_f64() + x_index as f64 * tile_width as f64;
		let tile_origin_y = scan.union_bbox.min_y.to_f64() + y_index as f64 * tile_height as f64;
		let raw_x_offset = bbox.min_x.to_f64() - tile_origin_x;
		let raw_y_offset = bbox.min_y.to_f64() - tile_origin_y;

		let mut error_flags = TileErrorFlags::empty();
		if raw_x_offset < 0.0 || raw_y_offset < 0.0 {
			error_flags |= TileErrorFlags::OFFSET_NEGATIVE;
		}
		if raw_x_offset.fract().abs() > 1e-6 || raw_y_offset.fract().abs() > 1e-6 {
			error_flags |= TileErrorFlags::FRACTIONAL_OFFSET;
		}
		if reader.width() > tile_width || reader.height() > tile_height {
			error_flags |= TileErrorFlags::SIZE_TOO_LARGE;
		}
		let x_offset = raw_x_offset.max(0.0) as u32;
		let y_offset = raw_y_offset.max(0.0) as u32;
		if x_offset + reader.width() > tile_width || y_offset + reader.height() > tile_height {
			error_flags |= TileErrorFlags::OFFSET_PLUS_SIZE_TOO_LARGE;
		}

		let slot_index = y_index as usize * scan.x_tile_count as usize + x_index as usize;
		if tiles[slot_index].is_some() {
			multi_init_count += 1;
			log::warn!("multiple files map to tile ({x_index}, {y_index}); keeping the first");
			continue;
		}

		tiles[slot_index] = Some(Tile {
			file_path: path.clone(),
			x_index,
			y_index,
			x_offset,
			y_offset,
			width: reader.width(),
			height: reader.height(),
			valid: error_flags.is_empty(),
			error_flags,
		});
	}

	let tiles = tiles
		.into_iter()
		.enumerate()
		.map(|(i, t)| {
			t.unwrap_or_else(|| {
				let x_index = (i % scan.x_tile_count as usize) as i64;
				let y_index = (i / scan.x_tile_count as usize) as i64;
				Tile {
					file_path: PathBuf::new(),
					x_index,
					y_index,
					x_offset: 0,
					y_offset: 0,
					width: 0,
					height: 0,
					valid: false,
					error_flags: TileErrorFlags::empty(),
				}
			})
		})
		.collect();

	Ok((tiles, multi_init_count))
}

// The scan/start scenario over real fixture files now lives in `geo/tests/tile_manager.rs`,
// exercised through the public `TileManager` API (§1.4).
