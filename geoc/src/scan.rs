use std::path::PathBuf;

use clap::Args;
use geo::tile::TileManager;

use crate::common::install_cancel_handler;

#[derive(Args)]
/// Run the tile manager's scan and start passes over a directory of CVF2 files.
pub struct Scan {
	dir: PathBuf,
	tile_width: u32,
	tile_height: u32,
	/// Open-reader pool capacity; only matters if a later command reuses this manager's pool.
	#[clap(long, default_value_t = 64)]
	pool_capacity: usize,
}

pub fn scan(scan: Scan) {
	let quit = install_cancel_handler();

	let mut manager = TileManager::new(&scan.dir, scan.tile_width, scan.tile_height, scan.pool_capacity);

	let report = match manager.scan() {
		Ok(r) => r,
		Err(err) => {
			eprintln!("scan failed: {}", err);
			return;
		},
	};

	if quit.load(std::sync::atomic::Ordering::Acquire) {
		println!("cancelled before the start pass");
		return;
	}

	let multi_init_count = match manager.start() {
		Ok(n) => n,
		Err(err) => {
			eprintln!("start pass failed: {}", err);
			return;
		},
	};

	let bbox = manager.union_bbox();
	println!("Scan");
	println!("  Files scanned: {}", report.files_scanned);
	println!("  Files failed to open: {}", report.files_failed);
	println!("  Wrong-dimension files: {}", report.wrong_dimension_count);
	println!("  Multi-initialized slots: {}", multi_init_count);
	println!("  Undefined cells: {}", report.undef_count);
	if report.min_value <= report.max_value {
		println!("  Value range: {} .. {}", report.min_value, report.max_value);
	}
	println!();
	println!("Tile grid");
	println!("  SRID: {}", manager.srid());
	println!(
		"  Union bbox: ({:.7}, {:.7}) - ({:.7}, {:.7})",
		bbox.min_x.to_f64(),
		bbox.min_y.to_f64(),
		bbox.max_x.to_f64(),
		bbox.max_y.to_f64()
	);
	println!("  Grid: {} x {} tiles of {} x {}", manager.x_tile_count(), manager.y_tile_count(), scan.tile_width, scan.tile_height);
}
