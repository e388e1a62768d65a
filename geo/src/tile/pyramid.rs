//! Meta-tile pyramid generator (C8): forward-renders meta-tiles from a tile manager, and
//! downsamples one zoom level's meta-tiles into the next lower zoom by 2×2 quadrant averaging.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::error::Result;
use crate::fix::BboxFix;
use crate::length_unit::LengthUnit;
use crate::projection::Projector;
use crate::reader::Cvf2Reader;
use crate::row_codec::UNDEFINED_VALUE;
use crate::tile::manager::TileManager;
use crate::tile::slippy::{self, MetaTileRange};
use crate::value_grid::{GeoInfo, ValueGrid};

/// Digit bounds used by the forward-render path, preserved from the original (§12.3).
const FORWARD_MIN_DIGITS: i32 = 2;
const FORWARD_MAX_DIGITS: i32 = 4;

/// Digit bounds used by the downsample path; looser at the low end than the forward-render
/// path, preserved from the original (§12.3).
const DOWNSAMPLE_MIN_DIGITS: i32 = 1;
const DOWNSAMPLE_MAX_DIGITS: i32 = 4;

/// A path-building strategy for meta-tile files; §6.4 leaves the directory split to this
/// external collaborator.
pub type MetaTilePathFn = dyn Fn(&Path, u32, u32, u32) -> PathBuf + Sync;

#[derive(Default, Debug)]
pub struct PyramidReport {
	pub succeeded: u64,
	pub failed: u64,
}

/// Forward-renders every meta-tile in `range` at `zoom` from `manager`, writing each as a CVF2
/// file under `dst_path` via `path_fn`. Runs one rayon task per meta-tile (§5, §13.1); a failure
/// on one meta-tile is logged and counted but does not abort the others.
#[allow(clippy::too_many_arguments)]
pub fn render_meta_tiles(
	manager: &TileManager,
	projector: &(dyn Projector + Sync),
	dst_path: &Path,
	zoom: u32,
	tile_count_per_meta: u32,
	meta_tile_size: u32,
	range: MetaTileRange,
	aa: u32,
	path_fn: &MetaTilePathFn,
) -> PyramidReport {
	let succeeded = AtomicU64::new(0);
	let failed = AtomicU64::new(0);

	let indices: Vec<(u32, u32)> = range.iter().collect();
	indices.into_par_iter().for_each(|(x, y)| {
		match render_one_meta_tile(manager, projector, dst_path, zoom, x, y, tile_count_per_meta, meta_tile_size, aa, path_fn) {
			Ok(()) => {
				succeeded.fetch_add(1, Ordering::Relaxed);
			},
			Err(e) => {
				failed.fetch_add(1, Ordering::Relaxed);
				log::warn!("meta-tile ({zoom}, {x}, {y}) render failed: {e}");
			},
		}
	});

	PyramidReport { succeeded: succeeded.load(Ordering::Relaxed), failed: failed.load(Ordering::Relaxed) }
}

#[allow(clippy::too_many_arguments)]
fn render_one_meta_tile(
	manager: &TileManager,
	projector: &(dyn Projector + Sync),
	dst_path: &Path,
	zoom: u32,
	x: u32,
	y: u32,
	tile_count_per_meta: u32,
	meta_tile_size: u32,
	aa: u32,
	path_fn: &MetaTilePathFn,
) -> Result<()> {
	let (min_lon, min_lat, max_lon, max_lat) = slippy::meta_tile_bbox_lonlat(zoom, x, y, tile_count_per_meta);
	let bbox_wgs84 = BboxFix::from_f64(min_lon, min_lat, max_lon, max_lat);

	let mut grid = ValueGrid::<i64>::new(meta_tile_size, meta_tile_size, UNDEFINED_VALUE);
	manager.render_to_value_grid(projector, manager.srid(), bbox_wgs84, aa, &mut grid)?;
	grid.set_invalid_value(UNDEFINED_VALUE);
	grid.set_geo_info(GeoInfo { srid: 4326, bbox: bbox_wgs84 });

	let path = path_fn(dst_path, zoom, x, y);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	grid.write_cvf2(&path, LengthUnit::Degree, FORWARD_MIN_DIGITS, FORWARD_MAX_DIGITS)
}

/// Downsamples every meta-tile at `src_zoom` covering `range` (expressed in `src_zoom - 1`
/// destination indices) into one meta-tile per 2×2 block of source meta-tiles, averaging defined
/// cells quadrant by quadrant (§4.4's `fill_mipmap_quadrant`) and preserving the Undefined
/// sentinel where a source quadrant is missing or entirely undefined.
pub fn render_downsampled_meta_tiles(
	base_path: &Path,
	src_zoom: u32,
	dst_range: MetaTileRange,
	meta_tile_size: u32,
	path_fn: &MetaTilePathFn,
) -> PyramidReport {
	let succeeded = AtomicU64::new(0);
	let failed = AtomicU64::new(0);

	let indices: Vec<(u32, u32)> = dst_range.iter().collect();
	indices.into_par_iter().for_each(|(dx, dy)| {
		match downsample_one_meta_tile(base_path, src_zoom, dx, dy, meta_tile_size, path_fn) {
			Ok(()) => {
				succeeded.fetch_add(1, Ordering::Relaxed);
			},
			Err(e) => {
				failed.fetch_add(1, Ordering::Relaxed);
				log::warn!("downsample meta-tile ({}, {dx}, {dy}) failed: {e}", src_zoom - 1);
			},
		}
	});

	PyramidReport { succeeded: succeeded.load(Ordering::Relaxed), failed: failed.load(Ordering::Relaxed) }
}

fn downsample_one_meta_tile(
	base_path: &Path,
	src_zoom: u32,
	dx: u32,
	dy: u32,
	meta_tile_size: u32,
	path_fn: &MetaTilePathFn,
) -> Result<()> {
	let mut dst = ValueGrid::<i64>::new(meta_tile_size, meta_tile_size, UNDEFINED_VALUE);
	dst.set_invalid_value(UNDEFINED_VALUE);

	let mut dst_bbox: Option<BboxFix> = None;

	for quadrant in 0..4u32 {
		let child_x = 2 * dx + (quadrant & 1);
		let child_y = 2 * dy + ((quadrant >> 1) & 1);
		let path = path_fn(base_path, src_zoom, child_x, child_y);
		if !path.exists() {
			continue;
		}

		let src = load_value_grid(&path, meta_tile_size)?;
		if let Some(geo) = src.geo_info() {
			dst_bbox = Some(match dst_bbox {
				Some(b) => b.union(&geo.bbox),
				None => geo.bbox,
			});
		}
		dst.fill_mipmap_quadrant(&src, quadrant);
	}

	if let Some(bbox) = dst_bbox {
		dst.set_geo_info(GeoInfo { srid: 4326, bbox });
	}

	let dst_path = path_fn(base_path, src_zoom - 1, dx, dy);
	if let Some(parent) = dst_path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	dst.write_cvf2(&dst_path, LengthUnit::Degree, DOWNSAMPLE_MIN_DIGITS, DOWNSAMPLE_MAX_DIGITS)
}

/// Reads a CVF2 file in full into a `ValueGrid<i64>`, for use as a downsample source.
fn load_value_grid(path: &Path, expected_size: u32) -> Result<ValueGrid<i64>> {
	let mut reader = Cvf2Reader::open(path)?;
	let mut grid = ValueGrid::<i64>::new(expected_size, expected_size, UNDEFINED_VALUE);
	grid.set_invalid_value(UNDEFINED_VALUE);
	grid.set_geo_info(GeoInfo { srid: reader.srid(), bbox: reader.bbox() });

	reader.build_cache()?;
	for y in 0..expected_size.min(reader.height()) {
		let row = reader.read_row(y)?;
		for (x, value) in row.into_iter().enumerate().take(expected_size as usize) {
			grid.set_value_at(x as u32, y, value);
		}
	}
	Ok(grid)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::projection::IdentityProjector;
	use crate::tile::slippy::default_meta_tile_path;
	use crate::writer::Cvf2Writer;

	#[test]
	fn downsample_averages_four_constant_quadrants() {
		let dir = tempfile::tempdir().unwrap();
		let write_const = |x: u32, y: u32, v: i64| {
			let path = default_meta_tile_path(dir.path(), 5, x, y);
			std::fs::create_dir_all(path.parent().unwrap()).unwrap();
			let mut writer = Cvf2Writer::new(4, 4, LengthUnit::Degree, 2, 4);
			writer.set_srid(4326);
			writer.open(&path).unwrap();
			for _ in 0..16 {
				writer.push_value(v).unwrap();
			}
			writer.finish().unwrap();
		};

		write_const(0, 0, 10);
		write_const(1, 0, 20);
		write_const(0, 1, 30);
		write_const(1, 1, 40);

		let report = render_downsampled_meta_tiles(
			dir.path(),
			5,
			MetaTileRange { zoom: 4, x_start: 0, x_end: 1, y_start: 0, y_end: 1 },
			4,
			&default_meta_tile_path,
		);
		assert_eq!(report.succeeded, 1);
		assert_eq!(report.failed, 0);

		let dst_path = default_meta_tile_path(dir.path(), 4, 0, 0);
		let mut reader = Cvf2Reader::open(&dst_path).unwrap();
		assert_eq!(reader.value_at(0, 0, false).unwrap(), 10);
		assert_eq!(reader.value_at(2, 0, false).unwrap(), 20);
		assert_eq!(reader.value_at(0, 2, false).unwrap(), 30);
		assert_eq!(reader.value_at(2, 2, false).unwrap(), 40);
	}

	#[test]
	fn forward_render_covers_a_small_meta_tile_range() {
		let src_dir = tempfile::tempdir().unwrap();
		let mut writer = Cvf2Writer::new(4, 4, LengthUnit::Meter, 2, 4);
		writer.set_srid(4326);
		writer.set_bbox(BboxFix::from_f64(-180.0, -85.0, 180.0, 85.0));
		writer.open(src_dir.path().join("world.cvf")).unwrap();
		for _ in 0..16 {
			writer.push_value(7).unwrap();
		}
		writer.finish().unwrap();

		let mut manager = TileManager::new(src_dir.path(), 4, 4, 16);
		manager.scan().unwrap();
		manager.start().unwrap();

		let dst_dir = tempfile::tempdir().unwrap();
		let range = MetaTileRange { zoom: 0, x_start: 0, x_end: 1, y_start: 0, y_end: 1 };
		let report = render_meta_tiles(&manager, &IdentityProjector, dst_dir.path(), 0, 1, 4, range, 1, &default_meta_tile_path);
		assert_eq!(report.succeeded, 1);

		let path = default_meta_tile_path(dst_dir.path(), 0, 0, 0);
		assert!(path.exists());
	}
}
