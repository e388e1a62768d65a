//! Synthetic or GDAL-sourced elevation-like data, written as a single CVF2 file or tiled into a
//! directory of one-degree-cell files. Mirrors `for_tile_in_output`'s ctrlc + rayon + progress
//! architecture (`common.rs`) but iterates the caller's bounding box instead of a fixed global
//! grid, and drops the hillshade/water-mask passes entirely (out of this crate's single-scalar-
//! field scope).

use std::{
	io::Write,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
};

use clap::Args;
use geo::{BboxFix, GeoInfo, LengthUnit, ValueGrid, UNDEFINED_VALUE};
use rand::Rng;
use rayon::prelude::*;

#[cfg(feature = "generate")]
use crate::source::{LatLon, Raster};
use crate::common::install_cancel_handler;

#[derive(Args)]
/// Build a grid of synthetic or GDAL-sourced elevation-like data and write it as a CVF2 file, or
/// a directory of one-degree-cell CVF2 files when `--tiled` is given.
pub struct Generate {
	#[clap(short = 'o', long = "output")]
	output: PathBuf,
	/// A raster file GDAL can open; omit to synthesize noise instead.
	#[clap(long)]
	source: Option<PathBuf>,
	#[clap(short = 'r', long = "res", default_value_t = 512)]
	resolution: u32,
	#[clap(long, default_value_t = 4326)]
	srid: i32,
	/// "min_lon,min_lat,max_lon,max_lat" in WGS84 degrees; defaults to the whole world.
	#[clap(long)]
	bbox: Option<String>,
	/// Write one file per one-degree cell under `output` instead of a single file.
	#[clap(long)]
	tiled: bool,
	#[clap(long, default_value_t = 0.05)]
	undefined_fraction: f64,
}

pub fn generate(args: Generate) {
	let bbox = match &args.bbox {
		Some(s) => {
			let parts: Vec<f64> = s.split(',').filter_map(|v| v.trim().parse().ok()).collect();
			if parts.len() != 4 {
				eprintln!("--bbox must be \"min_lon,min_lat,max_lon,max_lat\"");
				return;
			}
			BboxFix::from_f64(parts[0], parts[1], parts[2], parts[3])
		},
		None => BboxFix::from_f64(-180.0, -85.0, 180.0, 85.0),
	};

	if !args.tiled {
		let grid = build_grid(&args, bbox, args.resolution);
		if let Err(err) = grid.write_cvf2(&args.output, LengthUnit::Meter, 2, 4) {
			eprintln!("failed to write {}: {}", args.output.display(), err);
		}
		return;
	}

	let quit = install_cancel_handler();
	std::fs::create_dir_all(&args.output).expect("could not create output directory");

	let min_lat = bbox.min_y.to_f64().floor() as i32;
	let max_lat = bbox.max_y.to_f64().ceil() as i32;
	let min_lon = bbox.min_x.to_f64().floor() as i32;
	let max_lon = bbox.max_x.to_f64().ceil() as i32;

	let cells: Vec<(i32, i32)> =
		(min_lat..max_lat).flat_map(|lat| (min_lon..max_lon).map(move |lon| (lat, lon))).collect();
	let total = cells.len() as u64;
	let done = AtomicU64::new(0);
	let had_error = std::sync::atomic::AtomicBool::new(false);

	cells.into_par_iter().for_each(|(lat, lon)| {
		if quit.load(Ordering::Acquire) {
			return;
		}
		let cell_bbox = BboxFix::from_f64(lon as f64, lat as f64, (lon + 1) as f64, (lat + 1) as f64);
		let grid = build_grid(&args, cell_bbox, args.resolution);
		let path = args.output.join(format!("{lat}_{lon}.cvf"));
		if let Err(err) = grid.write_cvf2(&path, LengthUnit::Meter, 2, 4) {
			println!("\nerror writing {}: {}", path.display(), err);
			had_error.store(true, Ordering::Release);
		}
		let n = done.fetch_add(1, Ordering::Relaxed) + 1;
		print!("\r{n}/{total}");
		let _ = std::io::stdout().flush();
	});
	println!();

	if had_error.load(Ordering::Acquire) {
		eprintln!("one or more cells failed to write; see errors above");
	}
}

fn build_grid(args: &Generate, bbox: BboxFix, resolution: u32) -> ValueGrid<i64> {
	let mut grid = ValueGrid::<i64>::new(resolution, resolution, UNDEFINED_VALUE);
	grid.set_invalid_value(UNDEFINED_VALUE);
	grid.set_geo_info(GeoInfo { srid: args.srid, bbox });

	match &args.source {
		#[cfg(feature = "generate")]
		Some(path) => fill_from_raster(&mut grid, path, bbox, resolution),
		#[cfg(not(feature = "generate"))]
		Some(_) => {
			eprintln!("raster sourcing requires building geoc with the `generate` feature");
		},
		None => fill_synthetic(&mut grid, resolution, args.undefined_fraction),
	}

	grid.update_min_max();
	grid
}

/// Layered sine noise standing in for real elevation data, with a random sprinkling of undefined
/// cells so downstream consumers (the tile manager, the pyramid generator) exercise the sentinel.
fn fill_synthetic(grid: &mut ValueGrid<i64>, resolution: u32, undefined_fraction: f64) {
	let mut rng = rand::thread_rng();
	for y in 0..resolution {
		for x in 0..resolution {
			if rng.gen_bool(undefined_fraction.clamp(0.0, 1.0)) {
				continue;
			}
			let fx = x as f64 / resolution as f64;
			let fy = y as f64 / resolution as f64;
			let height = 500.0 * (fx * std::f64::consts::TAU * 3.0).sin() * (fy * std::f64::consts::TAU * 2.0).cos()
				+ 120.0 * (fx * std::f64::consts::TAU * 11.0 + fy * std::f64::consts::TAU * 7.0).sin();
			grid.set_value_at(x, y, height.round() as i64);
		}
	}
}

#[cfg(feature = "generate")]
fn fill_from_raster(grid: &mut ValueGrid<i64>, path: &std::path::Path, bbox: BboxFix, resolution: u32) {
	let raster = match Raster::load(path) {
		Ok(r) => r,
		Err(err) => {
			eprintln!("could not open raster {}: {:?}", path.display(), err);
			return;
		},
	};

	let bottom_left = LatLon { lat: bbox.min_y.to_f64(), lon: bbox.min_x.to_f64() };
	let top_right = LatLon { lat: bbox.max_y.to_f64(), lon: bbox.max_x.to_f64() };

	match raster.get_data::<i16>(bottom_left, top_right, resolution as usize) {
		Some(data) => {
			for y in 0..resolution {
				for x in 0..resolution {
					grid.set_value_at(x, y, data[(y * resolution + x) as usize] as i64);
				}
			}
		},
		None => eprintln!("requested bbox falls outside {}", path.display()),
	}
}
