//! Query engine (C7): point lookups and projected bounding-box rendering into a [`ValueGrid`].

use crate::error::Result;
use crate::fix::{remap, BboxFix};
use crate::projection::Projector;
use crate::row_codec::UNDEFINED_VALUE;
use crate::tile::manager::TileManager;
use crate::value_grid::{GeoInfo, ValueGrid};

impl TileManager {
	/// Looks up the value at `(x, y)`, given in the tile manager's own SRID. Returns
	/// [`UNDEFINED_VALUE`] for any point outside the union extent or falling on an invalid tile.
	pub fn value_at(&self, x: f64, y: f64) -> i64 {
		let tile_width = self.tile_width() as f64;
		let tile_height = self.tile_height() as f64;
		let bbox = self.union_bbox();

		let rel_x = x - bbox.min_x.to_f64();
		let rel_y = y - bbox.min_y.to_f64();
		if rel_x < 0.0 || rel_y < 0.0 {
			return UNDEFINED_VALUE;
		}

		let tile_x = (rel_x / tile_width) as i64;
		let tile_y = (rel_y / tile_height) as i64;
		let tiles = self.tiles();
		let x_tile_count = self.x_tile_count() as i64;
		let y_tile_count = self.y_tile_count() as i64;
		if tile_x < 0 || tile_y < 0 || tile_x >= x_tile_count || tile_y >= y_tile_count {
			return UNDEFINED_VALUE;
		}

		let tile_index = (tile_y as usize) * self.x_tile_count() as usize + (tile_x as usize);
		let tile = &tiles[tile_index];
		if !tile.valid {
			return UNDEFINED_VALUE;
		}

		let tile_origin_x = bbox.min_x.to_f64() + tile_x as f64 * tile_width;
		let tile_origin_y = bbox.min_y.to_f64() + tile_y as f64 * tile_height;

		let cell_x = remap(x - tile_origin_x, 0.0, tile_width, 0.0, (tile.width.max(1) - 1) as f64).round() as i64;
		let cell_y = remap(y - tile_origin_y, 0.0, tile_height, 0.0, (tile.height.max(1) - 1) as f64).round() as i64;
		if cell_x < 0 || cell_y < 0 || cell_x as u32 >= tile.width || cell_y as u32 >= tile.height {
			return UNDEFINED_VALUE;
		}

		self.pool()
			.with_reader(tile_index, tile, |r| r.value_at(cell_x as u32, cell_y as u32, true).unwrap_or(UNDEFINED_VALUE))
			.unwrap_or(UNDEFINED_VALUE)
	}

	/// Looks up the value at a WGS84 `(lon, lat)`, projecting into the manager's SRID first.
	pub fn value_at_wgs84(&self, projector: &dyn Projector, lon: f64, lat: f64) -> Result<i64> {
		let (x, y) = projector.project(lon, lat, 4326, self.srid())?;
		Ok(self.value_at(x, y))
	}

	/// Renders `bbox_wgs84`, projected into `dst_srid`, into `out_grid`. `out_grid`'s existing
	/// dimensions are used as the destination resolution; row `y = 0` is the top of `bbox_dst`.
	///
	/// `aa` is the per-axis supersampling factor, clamped to `[1, 16]`. When `aa > 1`, each
	/// output cell is the average of `aa * aa` sub-samples, skipping any that land on an
	/// Undefined point; a cell with zero defined sub-samples is Undefined (§12.2).
	pub fn render_to_value_grid(
		&self,
		projector: &dyn Projector,
		dst_srid: i32,
		bbox_wgs84: BboxFix,
		aa: u32,
		out_grid: &mut ValueGrid<i64>,
	) -> Result<()> {
		let aa = aa.clamp(1, 16);
		let w = out_grid.width();
		let h = out_grid.height();

		let (min_x, min_y) = projector.project(bbox_wgs84.min_x.to_f64(), bbox_wgs84.min_y.to_f64(), 4326, dst_srid)?;
		let (max_x, max_y) = projector.project(bbox_wgs84.max_x.to_f64(), bbox_wgs84.max_y.to_f64(), 4326, dst_srid)?;
		let bbox_dst = BboxFix::from_f64(min_x.min(max_x), min_y.min(max_y), min_x.max(max_x), min_y.max(max_y));

		out_grid.set_invalid_value(UNDEFINED_VALUE);
		out_grid.set_geo_info(GeoInfo { srid: dst_srid, bbox: bbox_dst });

		for y in 0..h {
			for x in 0..w {
				let value = self.render_cell(projector, dst_srid, &bbox_dst, x, y, w, h, aa)?;
				out_grid.set_value_at(x, y, value);
			}
		}

		out_grid.update_min_max();
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	fn render_cell(
		&self,
		projector: &dyn Projector,
		dst_srid: i32,
		bbox_dst: &BboxFix,
		x: u32,
		y: u32,
		w: u32,
		h: u32,
		aa: u32,
	) -> Result<i64> {
		let mut sum = 0.0;
		let mut count = 0u32;

		for sy in 0..aa {
			for sx in 0..aa {
				let (fx, fy) = if aa == 1 {
					(x as f64, (h - 1 - y) as f64)
				} else {
					let step_x = sx as f64 / (aa - 1) as f64;
					let step_y = sy as f64 / (aa - 1) as f64;
					(x as f64 + step_x, (h - 1 - y) as f64 + step_y)
				};

				let px = remap(fx, 0.0, w as f64, bbox_dst.min_x.to_f64(), bbox_dst.max_x.to_f64());
				let py = remap(fy, 0.0, h as f64, bbox_dst.min_y.to_f64(), bbox_dst.max_y.to_f64());

				let (tile_x, tile_y) = projector.project(px, py, dst_srid, self.srid())?;
				let value = self.value_at(tile_x, tile_y);
				if value != UNDEFINED_VALUE {
					sum += value as f64;
					count += 1;
				}
			}
		}

		if count == 0 {
			Ok(UNDEFINED_VALUE)
		} else {
			Ok((sum / count as f64).round() as i64)
		}
	}
}

/// Shared scratch state a parallel renderer reuses across meta-tiles on the same thread, avoiding
/// a fresh [`ValueGrid`] allocation per task (§5, grounded on `thread_local`-scoped scratch state).
pub struct RenderScratch {
	pub grid: ValueGrid<i64>,
}

impl RenderScratch {
	pub fn new(size: u32) -> Self { Self { grid: ValueGrid::new(size, size, UNDEFINED_VALUE) } }
}
