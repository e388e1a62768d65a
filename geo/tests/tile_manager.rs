//! Multi-file tile-manager scenarios that need real temp-directory fixtures (§1.4): a handful of
//! CVF2 files on disk, scanned and queried through the public `TileManager` API.

use geo::tile::TileManager;
use geo::{BboxFix, LengthUnit, Cvf2Writer, UNDEFINED_VALUE};
use std::path::Path;

fn write_tile(path: &Path, bbox: BboxFix, srid: i32, w: u32, h: u32, fill: i64) {
	let mut writer = Cvf2Writer::new(w, h, LengthUnit::Meter, 2, 4);
	writer.set_srid(srid);
	writer.set_bbox(bbox);
	writer.open(path).unwrap();
	for _ in 0..(w * h) {
		writer.push_value(fill).unwrap();
	}
	writer.finish().unwrap();
}

#[test]
fn point_query_across_two_tiles() {
	let dir = tempfile::tempdir().unwrap();
	write_tile(&dir.path().join("a.cvf"), BboxFix::from_f64(0.0, 0.0, 10.0, 10.0), 4326, 10, 10, 1);
	write_tile(&dir.path().join("b.cvf"), BboxFix::from_f64(10.0, 0.0, 20.0, 10.0), 4326, 10, 10, 2);

	let mut manager = TileManager::new(dir.path(), 10, 10, 16);
	manager.scan().unwrap();
	manager.start().unwrap();

	assert_eq!(manager.value_at(5.0, 5.0), 1);
	assert_eq!(manager.value_at(15.0, 5.0), 2);
	assert_eq!(manager.value_at(-1.0, 0.0), UNDEFINED_VALUE);
	assert_eq!(manager.value_at(100.0, 100.0), UNDEFINED_VALUE);
	assert_eq!(manager.open_count(), 2);
	assert_eq!(manager.close_count(), 0);
}

#[test]
fn scan_derives_union_bbox_and_grid_size() {
	let dir = tempfile::tempdir().unwrap();
	write_tile(&dir.path().join("a.cvf"), BboxFix::from_f64(0.0, 0.0, 10.0, 10.0), 4326, 10, 10, 1);
	write_tile(&dir.path().join("b.cvf"), BboxFix::from_f64(10.0, 0.0, 20.0, 10.0), 4326, 10, 10, 2);

	let mut manager = TileManager::new(dir.path(), 10, 10, 16);
	let report = manager.scan().unwrap();
	assert_eq!(report.files_scanned, 2);
	assert_eq!(manager.x_tile_count(), 2);
	assert_eq!(manager.y_tile_count(), 1);

	let multi_init = manager.start().unwrap();
	assert_eq!(multi_init, 0);
	assert_eq!(manager.x_tile_count() * manager.y_tile_count(), 2);
}
