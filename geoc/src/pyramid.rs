use std::path::PathBuf;

use clap::Args;
use geo::tile::{default_meta_tile_path, render_downsampled_meta_tiles, MetaTileRange};

use crate::common::report_progress;

#[derive(Args)]
/// Build a reduced-resolution meta-tile pyramid down from an existing zoom level, by repeated
/// 2x2-quadrant downsampling (C8).
pub struct Pyramid {
	dir: PathBuf,
	zoom: u32,
	out_zoom: u32,
	#[clap(long, default_value_t = 256)]
	meta_tile_size: u32,
	/// How many individual slippy-map tiles one meta-tile covers per side.
	#[clap(long, default_value_t = 1)]
	tile_count_per_meta: u32,
}

pub fn pyramid(args: Pyramid) {
	if args.out_zoom >= args.zoom {
		eprintln!("out-zoom ({}) must be lower than zoom ({})", args.out_zoom, args.zoom);
		return;
	}

	let mut src_zoom = args.zoom;
	while src_zoom > args.out_zoom {
		let dst_zoom = src_zoom - 1;
		let metas_per_axis = ((1u64 << dst_zoom) / args.tile_count_per_meta.max(1) as u64).max(1) as u32;
		let dst_range =
			MetaTileRange { zoom: dst_zoom, x_start: 0, x_end: metas_per_axis, y_start: 0, y_end: metas_per_axis };

		println!("Downsampling zoom {} -> {} ({} meta-tiles)", src_zoom, dst_zoom, dst_range.count());
		let report =
			render_downsampled_meta_tiles(&args.dir, src_zoom, dst_range, args.meta_tile_size, &default_meta_tile_path);
		report_progress(report.succeeded, report.succeeded + report.failed);
		println!();
		if report.failed > 0 {
			println!("  {} meta-tiles failed to downsample (see warnings above)", report.failed);
		}

		src_zoom = dst_zoom;
	}
}
