//! In-memory 2-D scalar grid (C4): an encode source, decode sink, and mipmap operand independent
//! of any one CVF2 file.
//!
//! The original is a C++ template over the scalar type; this crate represents the same
//! polymorphism as a small sealed trait, [`GridScalar`], implemented for the five specializations
//! the format actually uses (`u8`, `i32`, `i64`, `f32`, `f64`), rather than duplicating
//! `ValueGrid` by hand for each one.

use std::path::Path;

use crate::endian::{Endian, ReadStream, WriteStream};
use crate::error::{CvfError, Result};
use crate::fix::BboxFix;
use crate::row_codec::UNDEFINED_VALUE;
use crate::writer::Cvf2Writer;
use crate::length_unit::LengthUnit;

const SIGNATURE: &[u8; 8] = b"ValGrid_";

const FEATURE_MIN_MAX: u32 = 1 << 0;
const FEATURE_INVALID_VALUE: u32 = 1 << 1;
const FEATURE_GEO_INFO: u32 = 1 << 2;

const TYPE_U8: i16 = 0;
const TYPE_I32: i16 = 1;
const TYPE_I64: i16 = 2;
const TYPE_F32: i16 = 3;
const TYPE_F64: i16 = 4;

/// A scalar type `ValueGrid` can hold.
///
/// Sealed to the five specializations the on-disk format recognizes: implementing this for an
/// arbitrary type would produce files other readers can't parse.
pub trait GridScalar: Copy + PartialEq + private::Sealed {
	const TYPE_TAG: i16;

	fn to_f64(self) -> f64;
	fn from_f64(v: f64) -> Self;

	/// Rounds-to-nearest, half away from zero, for integer types; passes through unchanged for
	/// floating point types (which have no such rounding step in the mipmap average).
	fn round_average(sum: f64, count: u32) -> Self;

	fn write(self, stream: &mut WriteStream) -> Result<()>;
	fn read(stream: &mut ReadStream) -> Result<Self>;
}

mod private {
	pub trait Sealed {}
	impl Sealed for u8 {}
	impl Sealed for i32 {}
	impl Sealed for i64 {}
	impl Sealed for f32 {}
	impl Sealed for f64 {}
}

fn round_half_away_from_zero(v: f64) -> f64 { v.signum() * v.abs().round() }

impl GridScalar for u8 {
	const TYPE_TAG: i16 = TYPE_U8;
	fn to_f64(self) -> f64 { self as f64 }
	fn from_f64(v: f64) -> Self { v.round() as u8 }
	fn round_average(sum: f64, count: u32) -> Self {
		round_half_away_from_zero(sum / count as f64) as u8
	}
	fn write(self, stream: &mut WriteStream) -> Result<()> { stream.write_u8(self) }
	fn read(stream: &mut ReadStream) -> Result<Self> { stream.read_u8() }
}

impl GridScalar for i32 {
	const TYPE_TAG: i16 = TYPE_I32;
	fn to_f64(self) -> f64 { self as f64 }
	fn from_f64(v: f64) -> Self { v.round() as i32 }
	fn round_average(sum: f64, count: u32) -> Self {
		round_half_away_from_zero(sum / count as f64) as i32
	}
	fn write(self, stream: &mut WriteStream) -> Result<()> { stream.write_i32(self) }
	fn read(stream: &mut ReadStream) -> Result<Self> { stream.read_i32() }
}

impl GridScalar for i64 {
	const TYPE_TAG: i16 = TYPE_I64;
	fn to_f64(self) -> f64 { self as f64 }
	fn from_f64(v: f64) -> Self { v.round() as i64 }
	fn round_average(sum: f64, count: u32) -> Self {
		round_half_away_from_zero(sum / count as f64) as i64
	}
	fn write(self, stream: &mut WriteStream) -> Result<()> { stream.write_i64(self) }
	fn read(stream: &mut ReadStream) -> Result<Self> { stream.read_i64() }
}

impl GridScalar for f32 {
	const TYPE_TAG: i16 = TYPE_F32;
	fn to_f64(self) -> f64 { self as f64 }
	fn from_f64(v: f64) -> Self { v as f32 }
	fn round_average(sum: f64, count: u32) -> Self { (sum / count as f64) as f32 }
	fn write(self, stream: &mut WriteStream) -> Result<()> { stream.write_f32(self) }
	fn read(stream: &mut ReadStream) -> Result<Self> { stream.read_f32() }
}

impl GridScalar for f64 {
	const TYPE_TAG: i16 = TYPE_F64;
	fn to_f64(self) -> f64 { self }
	fn from_f64(v: f64) -> Self { v }
	fn round_average(sum: f64, count: u32) -> Self { sum / count as f64 }
	fn write(self, stream: &mut WriteStream) -> Result<()> { stream.write_f64(self) }
	fn read(stream: &mut ReadStream) -> Result<Self> { stream.read_f64() }
}

/// Optional geo-metadata attached to a grid: SRID plus a fixed-point bounding box.
#[derive(Copy, Clone, Debug, Default)]
pub struct GeoInfo {
	pub srid: i32,
	pub bbox: BboxFix,
}

/// A dense, row-major 2-D array of `T`, with optional min/max, invalid-value, and geo metadata.
pub struct ValueGrid<T: GridScalar> {
	width: u32,
	height: u32,
	x_index: i32,
	y_index: i32,
	values: Vec<T>,

	invalid_value: Option<T>,
	min_value: Option<T>,
	max_value: Option<T>,
	geo_info: Option<GeoInfo>,
}

impl<T: GridScalar> ValueGrid<T> {
	/// Creates a grid filled with `fill`.
	pub fn new(width: u32, height: u32, fill: T) -> Self {
		Self {
			width,
			height,
			x_index: 0,
			y_index: 0,
			values: vec![fill; width as usize * height as usize],
			invalid_value: None,
			min_value: None,
			max_value: None,
			geo_info: None,
		}
	}

	pub fn width(&self) -> u32 { self.width }

	pub fn height(&self) -> u32 { self.height }

	pub fn set_tile_index(&mut self, x_index: i32, y_index: i32) {
		self.x_index = x_index;
		self.y_index = y_index;
	}

	pub fn set_invalid_value(&mut self, v: T) { self.invalid_value = Some(v); }

	pub fn invalid_value(&self) -> Option<T> { self.invalid_value }

	pub fn set_geo_info(&mut self, info: GeoInfo) { self.geo_info = Some(info); }

	pub fn geo_info(&self) -> Option<GeoInfo> { self.geo_info }

	pub fn min_value(&self) -> Option<T> { self.min_value }

	pub fn max_value(&self) -> Option<T> { self.max_value }

	fn index(&self, x: u32, y: u32) -> usize { y as usize * self.width as usize + x as usize }

	pub fn value_at(&self, x: u32, y: u32) -> T { self.values[self.index(x, y)] }

	/// Sets `(x, y)` to `v`, returning whether this actually changed the stored value.
	pub fn set_value_at(&mut self, x: u32, y: u32, v: T) -> bool {
		let idx = self.index(x, y);
		if self.values[idx] == v {
			false
		} else {
			self.values[idx] = v;
			true
		}
	}

	fn is_valid(&self, v: T) -> bool { self.invalid_value != Some(v) }

	/// Fills every cell with the invalid marker. Requires [`Self::set_invalid_value`] to have
	/// been called.
	pub fn invalidate(&mut self) {
		let invalid = self.invalid_value.expect("invalidate requires an invalid-value marker");
		self.values.fill(invalid);
	}

	/// Recomputes [`Self::min_value`]/[`Self::max_value`] over all valid cells.
	pub fn update_min_max(&mut self) {
		let mut min: Option<T> = None;
		let mut max: Option<T> = None;
		for &v in &self.values {
			if !self.is_valid(v) {
				continue;
			}
			if min.map_or(true, |m: T| v.to_f64() < m.to_f64()) {
				min = Some(v);
			}
			if max.map_or(true, |m: T| v.to_f64() > m.to_f64()) {
				max = Some(v);
			}
		}
		self.min_value = min;
		self.max_value = max;
	}

	/// Fills one destination quadrant from 2×2-averaging `src`, skipping invalid source cells;
	/// a destination cell whose four source cells are all invalid becomes invalid itself.
	///
	/// `quadrant_index & 1` selects the left/right half, `quadrant_index & 2` the top/bottom half.
	pub fn fill_mipmap_quadrant(&mut self, src: &ValueGrid<T>, quadrant_index: u32) {
		let half_w = self.width / 2;
		let half_h = self.height / 2;
		let dst_x_offset = if quadrant_index & 1 != 0 { half_w } else { 0 };
		let dst_y_offset = if quadrant_index & 2 != 0 { half_h } else { 0 };

		for j in 0..half_h {
			for i in 0..half_w {
				let value = Self::average_2x2(src, i, j);
				let dst_x = dst_x_offset + i;
				let dst_y = dst_y_offset + j;
				let idx = self.index(dst_x, dst_y);
				self.values[idx] = value;
			}
		}
	}

	fn average_2x2(src: &ValueGrid<T>, i: u32, j: u32) -> T {
		let src_invalid = src.invalid_value;
		let mut sum = 0.0;
		let mut count = 0u32;
		for (dx, dy) in [(0u32, 0u32), (1, 0), (0, 1), (1, 1)] {
			let v = src.value_at(2 * i + dx, 2 * j + dy);
			if src_invalid != Some(v) {
				sum += v.to_f64();
				count += 1;
			}
		}
		if count == 0 {
			src_invalid.unwrap_or_else(|| T::from_f64(0.0))
		} else {
			T::round_average(sum, count)
		}
	}

	/// A strict generalization of [`Self::fill_mipmap_quadrant`]: merges up to four source grids
	/// of equal size into `self` at half their linear resolution in one pass. `srcs[q]` supplies
	/// quadrant `q`; a `None` entry invalidates that quadrant outright rather than averaging it.
	///
	/// All present sources must share `self`'s full-resolution dimensions (`2 * self.width`,
	/// `2 * self.height`) and the same invalid-value marker as `self`.
	pub fn merge_quadrants(&mut self, srcs: [Option<&ValueGrid<T>>; 4]) -> Result<()> {
		for src in srcs.iter().flatten() {
			if src.width != 2 * self.width || src.height != 2 * self.height {
				return Err(CvfError::bad_args("merge_quadrants: source dimensions do not match destination"));
			}
			if src.invalid_value != self.invalid_value {
				return Err(CvfError::bad_args("merge_quadrants: source invalid-value marker does not match"));
			}
		}

		for (q, src) in srcs.iter().enumerate() {
			match src {
				Some(src) => self.fill_mipmap_quadrant(src, q as u32),
				None => self.invalidate_quadrant(q as u32),
			}
		}
		Ok(())
	}

	fn invalidate_quadrant(&mut self, quadrant_index: u32) {
		let invalid = self.invalid_value.expect("invalidate_quadrant requires an invalid-value marker");
		let half_w = self.width / 2;
		let half_h = self.height / 2;
		let dst_x_offset = if quadrant_index & 1 != 0 { half_w } else { 0 };
		let dst_y_offset = if quadrant_index & 2 != 0 { half_h } else { 0 };
		for j in 0..half_h {
			for i in 0..half_w {
				let idx = self.index(dst_x_offset + i, dst_y_offset + j);
				self.values[idx] = invalid;
			}
		}
	}

	/// Writes this grid in the `"ValGrid_"` self-describing format (§6.3).
	pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
		let mut stream = WriteStream::create(path)?;
		stream.write_bytes(SIGNATURE)?;
		stream.write_bytes(&stream.endian().signature())?;
		stream.write_u16(1)?; // main_version
		stream.write_u16(0)?; // sub_version
		stream.write_i16(T::TYPE_TAG)?;
		stream.write_i32(self.width as i32)?;
		stream.write_i32(self.height as i32)?;
		stream.write_i32(self.x_index)?;
		stream.write_i32(self.y_index)?;

		let mut flags = 0u32;
		if self.min_value.is_some() && self.max_value.is_some() {
			flags |= FEATURE_MIN_MAX;
		}
		if self.invalid_value.is_some() {
			flags |= FEATURE_INVALID_VALUE;
		}
		if self.geo_info.is_some() {
			flags |= FEATURE_GEO_INFO;
		}
		stream.write_u32(flags)?;

		if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
			min.write(&mut stream)?;
			max.write(&mut stream)?;
		}
		if let Some(invalid) = self.invalid_value {
			invalid.write(&mut stream)?;
		}
		if let Some(geo) = self.geo_info {
			stream.write_i32(geo.srid)?;
			geo.bbox.write(&mut stream)?;
		}

		for &v in &self.values {
			v.write(&mut stream)?;
		}
		stream.flush()?;
		Ok(())
	}

	/// Reads a grid previously written by [`Self::write_file`]. Fails with
	/// [`CvfError::UnsupportedFormat`] if the file's declared type tag does not match `T`.
	pub fn read_file(path: impl AsRef<Path>) -> Result<Self> {
		let mut stream = ReadStream::open(path)?;

		let mut sig = [0u8; 8];
		stream.read_bytes(&mut sig)?;
		if &sig != SIGNATURE {
			return Err(CvfError::corrupt("not a ValueGrid file"));
		}

		let mut endian_sig = [0u8; 2];
		stream.read_bytes(&mut endian_sig)?;
		stream.set_endian(Endian::from_signature(endian_sig)?);

		let _main_version = stream.read_u16()?;
		let _sub_version = stream.read_u16()?;
		let data_type = stream.read_i16()?;
		if data_type != T::TYPE_TAG {
			return Err(CvfError::unsupported("ValueGrid file data type does not match requested scalar type"));
		}

		let width = stream.read_i32()? as u32;
		let height = stream.read_i32()? as u32;
		let x_index = stream.read_i32()?;
		let y_index = stream.read_i32()?;
		let flags = stream.read_u32()?;

		let mut min_value = None;
		let mut max_value = None;
		if flags & FEATURE_MIN_MAX != 0 {
			min_value = Some(T::read(&mut stream)?);
			max_value = Some(T::read(&mut stream)?);
		}

		let mut invalid_value = None;
		if flags & FEATURE_INVALID_VALUE != 0 {
			invalid_value = Some(T::read(&mut stream)?);
		}

		let mut geo_info = None;
		if flags & FEATURE_GEO_INFO != 0 {
			let srid = stream.read_i32()?;
			let bbox = BboxFix::read(&mut stream)?;
			geo_info = Some(GeoInfo { srid, bbox });
		}

		let mut values = Vec::with_capacity(width as usize * height as usize);
		for _ in 0..(width as usize * height as usize) {
			values.push(T::read(&mut stream)?);
		}

		Ok(Self { width, height, x_index, y_index, values, invalid_value, min_value, max_value, geo_info })
	}
}

impl ValueGrid<i64> {
	/// Feeds every cell into a fresh CVF2 writer, translating the invalid marker (if any) to
	/// [`UNDEFINED_VALUE`] at the boundary. Only meaningful for `i64` grids, matching the
	/// original's `write_cvf2` specialization.
	pub fn write_cvf2(&self, path: impl AsRef<Path>, unit: LengthUnit, min_digits: i32, max_digits: i32) -> Result<()> {
		let mut writer = Cvf2Writer::new(self.width, self.height, unit, min_digits, max_digits);
		if let Some(geo) = self.geo_info {
			writer.set_srid(geo.srid);
			writer.set_bbox(geo.bbox);
		}
		writer.open(path)?;

		let invalid = self.invalid_value;
		for &v in &self.values {
			let stored = if invalid == Some(v) { UNDEFINED_VALUE } else { v };
			writer.push_value(stored)?;
		}
		writer.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fill_mipmap_quadrant_averages_constants() {
		let mut src = ValueGrid::<i64>::new(4, 4, 7);
		src.set_invalid_value(UNDEFINED_VALUE);

		let mut dst = ValueGrid::<i64>::new(2, 2, 0);
		dst.set_invalid_value(UNDEFINED_VALUE);
		dst.fill_mipmap_quadrant(&src, 0);

		for y in 0..2 {
			for x in 0..2 {
				assert_eq!(dst.value_at(x, y), 7);
			}
		}
	}

	#[test]
	fn fill_mipmap_quadrant_skips_invalid_sources() {
		let mut src = ValueGrid::<i64>::new(2, 2, UNDEFINED_VALUE);
		src.set_invalid_value(UNDEFINED_VALUE);
		src.set_value_at(0, 0, 10);
		src.set_value_at(1, 0, 20);
		// (0,1) and (1,1) stay invalid.

		let mut dst = ValueGrid::<i64>::new(1, 1, 0);
		dst.set_invalid_value(UNDEFINED_VALUE);
		dst.fill_mipmap_quadrant(&src, 0);
		assert_eq!(dst.value_at(0, 0), 15);
	}

	#[test]
	fn merge_quadrants_assembles_four_sources() {
		let make = |v: i64| {
			let mut g = ValueGrid::<i64>::new(2, 2, v);
			g.set_invalid_value(UNDEFINED_VALUE);
			g
		};
		let (a, b, c, d) = (make(1), make(2), make(3), make(4));

		let mut dst = ValueGrid::<i64>::new(2, 2, 0);
		dst.set_invalid_value(UNDEFINED_VALUE);
		dst.merge_quadrants([Some(&a), Some(&b), Some(&c), Some(&d)]).unwrap();

		assert_eq!(dst.value_at(0, 0), 1);
		assert_eq!(dst.value_at(1, 0), 2);
		assert_eq!(dst.value_at(0, 1), 3);
		assert_eq!(dst.value_at(1, 1), 4);
	}

	#[test]
	fn merge_quadrants_invalidates_missing_source() {
		let mut a = ValueGrid::<i64>::new(2, 2, 9);
		a.set_invalid_value(UNDEFINED_VALUE);

		let mut dst = ValueGrid::<i64>::new(2, 2, 0);
		dst.set_invalid_value(UNDEFINED_VALUE);
		dst.merge_quadrants([Some(&a), None, None, None]).unwrap();

		assert_eq!(dst.value_at(0, 0), 9);
		assert_eq!(dst.value_at(1, 0), UNDEFINED_VALUE);
		assert_eq!(dst.value_at(0, 1), UNDEFINED_VALUE);
		assert_eq!(dst.value_at(1, 1), UNDEFINED_VALUE);
	}

	#[test]
	fn value_grid_file_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("g.vg");

		let mut grid = ValueGrid::<f32>::new(3, 2, 0.0);
		grid.set_invalid_value(f32::MIN);
		grid.set_value_at(0, 0, 1.5);
		grid.set_value_at(2, 1, -3.25);
		grid.update_min_max();
		grid.write_file(&path).unwrap();

		let read_back = ValueGrid::<f32>::read_file(&path).unwrap();
		assert_eq!(read_back.width(), 3);
		assert_eq!(read_back.height(), 2);
		assert_eq!(read_back.value_at(0, 0), 1.5);
		assert_eq!(read_back.value_at(2, 1), -3.25);
		assert_eq!(read_back.min_value(), grid.min_value());
	}

	#[test]
	fn write_cvf2_translates_invalid_marker() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("h.cvf");

		let mut grid = ValueGrid::<i64>::new(2, 1, 0);
		grid.set_invalid_value(-1);
		grid.set_value_at(0, 0, 100);
		grid.set_value_at(1, 0, -1);
		grid.write_cvf2(&path, LengthUnit::Meter, 2, 4).unwrap();

		let mut reader = crate::reader::Cvf2Reader::open(&path).unwrap();
		assert_eq!(reader.value_at(0, 0, false).unwrap(), 100);
		assert_eq!(reader.value_at(1, 0, false).unwrap(), UNDEFINED_VALUE);
	}
}
