//! Slippy-map (XYZ, web-Mercator convention) meta-tile addressing and the default on-disk layout.

use std::path::{Path, PathBuf};

/// Inclusive-start, exclusive-end range of meta-tile indices at a given zoom.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MetaTileRange {
	pub zoom: u32,
	pub x_start: u32,
	pub x_end: u32,
	pub y_start: u32,
	pub y_end: u32,
}

impl MetaTileRange {
	pub fn count(&self) -> u64 {
		(self.x_end - self.x_start) as u64 * (self.y_end - self.y_start) as u64
	}

	/// Row-major iteration order over `(x, y)` pairs in this range.
	pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
		let x_start = self.x_start;
		let x_end = self.x_end;
		(self.y_start..self.y_end).flat_map(move |y| (x_start..x_end).map(move |x| (x, y)))
	}
}

const EARTH_CIRCUMFERENCE_DEGREES: f64 = 360.0;

/// Longitude/latitude (WGS84) of the northwest corner of meta-tile `(x, y)` at `zoom`, where one
/// tile unit spans `tile_count_per_meta` individual web-Mercator tiles.
pub fn meta_tile_corner_lonlat(zoom: u32, x: u32, y: u32, tile_count_per_meta: u32) -> (f64, f64) {
	let tiles_per_axis = (1u64 << zoom) as f64;
	let tile_x = x as f64 * tile_count_per_meta as f64;
	let tile_y = y as f64 * tile_count_per_meta as f64;

	let lon = tile_x / tiles_per_axis * EARTH_CIRCUMFERENCE_DEGREES - 180.0;

	let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * tile_y / tiles_per_axis;
	let lat = 180.0 / std::f64::consts::PI * n.sinh().atan();
	(lon, lat)
}

/// WGS84 bounding box of meta-tile `(x, y)` at `zoom`, covering `tile_count_per_meta` individual
/// tiles per side.
pub fn meta_tile_bbox_lonlat(zoom: u32, x: u32, y: u32, tile_count_per_meta: u32) -> (f64, f64, f64, f64) {
	let (nw_lon, nw_lat) = meta_tile_corner_lonlat(zoom, x, y, tile_count_per_meta);
	let (se_lon, se_lat) = meta_tile_corner_lonlat(zoom, x + 1, y + 1, tile_count_per_meta);
	(nw_lon, se_lat, se_lon, nw_lat)
}

/// Computes the meta-tile range covering `(min_lon, min_lat, max_lon, max_lat)` at `zoom`.
pub fn meta_tile_range_for_bbox(
	zoom: u32,
	tile_count_per_meta: u32,
	min_lon: f64,
	min_lat: f64,
	max_lon: f64,
	max_lat: f64,
) -> MetaTileRange {
	let tiles_per_axis = 1u64 << zoom;
	let metas_per_axis = (tiles_per_axis / tile_count_per_meta.max(1) as u64).max(1) as u32;

	let lon_to_meta_x = |lon: f64| -> u32 {
		let frac = (lon + 180.0) / EARTH_CIRCUMFERENCE_DEGREES;
		((frac * metas_per_axis as f64).floor() as i64).clamp(0, metas_per_axis as i64 - 1) as u32
	};
	let lat_to_meta_y = |lat: f64| -> u32 {
		let rad = lat.to_radians();
		let frac = (1.0 - (rad.tan() + 1.0 / rad.cos()).ln() / std::f64::consts::PI) / 2.0;
		((frac * metas_per_axis as f64).floor() as i64).clamp(0, metas_per_axis as i64 - 1) as u32
	};

	let x_start = lon_to_meta_x(min_lon);
	let x_end = lon_to_meta_x(max_lon) + 1;
	// Latitude decreases as the meta-tile y index increases (northwest origin).
	let y_start = lat_to_meta_y(max_lat);
	let y_end = lat_to_meta_y(min_lat) + 1;

	MetaTileRange { zoom, x_start, x_end: x_end.min(metas_per_axis), y_start, y_end: y_end.min(metas_per_axis) }
}

/// Deterministic, bijective default meta-tile file path: `base/<zoom>/<x>/<y>.cvf`.
///
/// §6.4 leaves the exact directory split to an external helper; callers that need the
/// `x_major/x_minor_<tile>` split instead can pass their own closure of the same shape to the
/// pyramid generator.
pub fn default_meta_tile_path(base: &Path, zoom: u32, x: u32, y: u32) -> PathBuf {
	base.join(zoom.to_string()).join(x.to_string()).join(format!("{y}.cvf"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn meta_tile_range_covers_whole_world_at_zoom_zero() {
		let range = meta_tile_range_for_bbox(0, 1, -180.0, -85.0, 180.0, 85.0);
		assert_eq!(range.x_start, 0);
		assert_eq!(range.y_start, 0);
		assert_eq!(range.count(), 1);
	}

	#[test]
	fn default_path_is_deterministic_and_distinct() {
		let base = Path::new("/tiles");
		let a = default_meta_tile_path(base, 3, 1, 2);
		let b = default_meta_tile_path(base, 3, 1, 2);
		assert_eq!(a, b);
		let c = default_meta_tile_path(base, 3, 2, 1);
		assert_ne!(a, c);
		assert_eq!(a, Path::new("/tiles/3/1/2.cvf"));
	}

	#[test]
	fn iteration_is_row_major() {
		let range = MetaTileRange { zoom: 0, x_start: 0, x_end: 2, y_start: 0, y_end: 2 };
		let order: Vec<_> = range.iter().collect();
		assert_eq!(order, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
	}
}
