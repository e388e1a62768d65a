//! GDAL-backed raster ingestion for `generate --source`, stripped of the hillshade/water-mask
//! specifics (single-scalar-field scope only): a [`Raster`] samples one band into plain values,
//! nothing more.

use std::path::{Path, PathBuf};

use gdal::{
	errors::GdalError,
	raster::{GdalType, ResampleAlg},
	Dataset,
};
use thread_local::ThreadLocal;

#[derive(Copy, Clone)]
pub struct LatLon {
	pub lat: f64,
	pub lon: f64,
}

struct Transform([f64; 6]);

impl Transform {
	fn to_image(&self, pos: LatLon) -> (f64, f64) {
		((pos.lon - self.0[0]) / self.0[1], (pos.lat - self.0[3]) / self.0[5])
	}
}

/// A GDAL dataset opened once and reused per-thread, since `gdal::Dataset` is not `Sync`.
pub struct Raster {
	path: PathBuf,
	set: ThreadLocal<Dataset>,
	transform: Transform,
}

impl Raster {
	pub fn load(path: &Path) -> Result<Self, GdalError> {
		let dataset = Dataset::open(path)?;
		let transform = dataset.geo_transform()?;

		assert_eq!(transform[2], 0.0, "row rotation must be 0");
		assert_eq!(transform[4], 0.0, "column rotation must be 0");
		assert!(transform[5] <= 0.0, "y scale must be negative");

		let set = ThreadLocal::new();
		set.get_or(|| dataset);

		Ok(Self { path: path.to_path_buf(), set, transform: Transform(transform) })
	}

	/// Resamples the rectangle between `bottom_left` and `top_right` to a `res` x `res` grid using
	/// Lanczos resampling, or `None` if the rectangle falls outside the raster's extent.
	pub fn get_data<T: GdalType + Copy>(&self, bottom_left: LatLon, top_right: LatLon, res: usize) -> Option<Vec<T>> {
		let set = self.set.get_or(|| Dataset::open(&self.path).expect("failed to open dataset on thread"));

		let (xl, yb) = self.transform.to_image(bottom_left);
		let (xr, yt) = self.transform.to_image(top_right);
		let (xl, yt) = (xl.floor() as isize, yt.floor() as isize);
		let (xr, yb) = (xr.floor() as isize, yb.floor() as isize);
		let (w, h) = set.raster_size();

		if xl < 0 || yt < 0 || xr >= w as isize || yb >= h as isize {
			return None;
		}

		set.rasterband(1)
			.expect("band with index 1 not present")
			.read_as((xl, yt), ((xr - xl) as usize, (yb - yt) as usize), (res, res), Some(ResampleAlg::Lanczos))
			.ok()
			.map(|buf| buf.data)
	}
}
