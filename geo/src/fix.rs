//! Fixed-point scalars for serialized coordinates.
//!
//! The container format never stores coordinates as floating point; every coordinate is a
//! 64-bit signed integer scaled by a fixed power of ten. The scale is a convention of the
//! surrounding context, not part of the value itself, so `Fix` carries no scale field — callers
//! agree on [`FIX_DECIMALS`] the same way the rest of the format agrees on field order.

use crate::endian::{ReadStream, WriteStream};
use crate::error::Result;

/// Decimal places implied by every [`Fix`] value. Chosen to preserve sub-centimeter precision
/// for geographic coordinates expressed in degrees or meters.
pub const FIX_DECIMALS: u32 = 7;

/// A signed fixed-point value, stored on disk as a plain `i64` scaled by `10^FIX_DECIMALS`.
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Debug, Default)]
pub struct Fix(i64);

impl Fix {
	pub const ZERO: Fix = Fix(0);

	fn scale() -> f64 { 10f64.powi(FIX_DECIMALS as i32) }

	pub fn from_raw(raw: i64) -> Self { Fix(raw) }

	pub fn raw(self) -> i64 { self.0 }

	pub fn from_f64(v: f64) -> Self { Fix((v * Self::scale()).round() as i64) }

	pub fn to_f64(self) -> f64 { self.0 as f64 / Self::scale() }

	pub(crate) fn write(self, stream: &mut WriteStream) -> Result<()> { stream.write_i64(self.0) }

	pub(crate) fn read(stream: &mut ReadStream) -> Result<Self> { Ok(Fix(stream.read_i64()?)) }
}

impl From<f64> for Fix {
	fn from(v: f64) -> Self { Fix::from_f64(v) }
}

impl From<Fix> for f64 {
	fn from(v: Fix) -> Self { v.to_f64() }
}

/// An axis-aligned bounding box in a [`Fix`]-coordinate space.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BboxFix {
	pub min_x: Fix,
	pub min_y: Fix,
	pub max_x: Fix,
	pub max_y: Fix,
}

impl BboxFix {
	pub fn new(min_x: Fix, min_y: Fix, max_x: Fix, max_y: Fix) -> Self { Self { min_x, min_y, max_x, max_y } }

	pub fn from_f64(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
		Self::new(Fix::from(min_x), Fix::from(min_y), Fix::from(max_x), Fix::from(max_y))
	}

	pub fn width(&self) -> f64 { self.max_x.to_f64() - self.min_x.to_f64() }

	pub fn height(&self) -> f64 { self.max_y.to_f64() - self.min_y.to_f64() }

	/// Union of two bounding boxes; an empty box (`self`, on first use) is represented by the
	/// caller seeding `min` at `+inf` and `max` at `-inf` before the first union.
	pub fn union(&self, other: &BboxFix) -> BboxFix {
		BboxFix::from_f64(
			self.min_x.to_f64().min(other.min_x.to_f64()),
			self.min_y.to_f64().min(other.min_y.to_f64()),
			self.max_x.to_f64().max(other.max_x.to_f64()),
			self.max_y.to_f64().max(other.max_y.to_f64()),
		)
	}

	pub fn intersects(&self, other: &BboxFix) -> bool {
		self.min_x.to_f64() < other.max_x.to_f64()
			&& self.max_x.to_f64() > other.min_x.to_f64()
			&& self.min_y.to_f64() < other.max_y.to_f64()
			&& self.max_y.to_f64() > other.min_y.to_f64()
	}

	pub(crate) fn write(&self, stream: &mut WriteStream) -> Result<()> {
		self.min_x.write(stream)?;
		self.min_y.write(stream)?;
		self.max_x.write(stream)?;
		self.max_y.write(stream)?;
		Ok(())
	}

	pub(crate) fn read(stream: &mut ReadStream) -> Result<Self> {
		Ok(Self {
			min_x: Fix::read(stream)?,
			min_y: Fix::read(stream)?,
			max_x: Fix::read(stream)?,
			max_y: Fix::read(stream)?,
		})
	}
}

/// Linear remap of `value` from `[src_min, src_max]` into `[dst_min, dst_max]`.
pub fn remap(value: f64, src_min: f64, src_max: f64, dst_min: f64, dst_max: f64) -> f64 {
	if src_max == src_min {
		return dst_min;
	}
	dst_min + (value - src_min) * (dst_max - dst_min) / (src_max - src_min)
}
