//! Length unit tag associated with a grid's sample values.
//!
//! The container format only requires that this round-trip through an `i32`; it never interprets
//! the unit itself. Variants cover the units the original format's sibling raster tooling is
//! known to produce (elevation in meters, angular fields in degrees).

/// Unit of measurement for the scalar values stored in a grid.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum LengthUnit {
	#[default]
	Undefined = 0,
	Meter = 1,
	Kilometer = 2,
	Foot = 3,
	Degree = 4,
}

impl LengthUnit {
	pub fn from_i32(v: i32) -> Self {
		match v {
			1 => LengthUnit::Meter,
			2 => LengthUnit::Kilometer,
			3 => LengthUnit::Foot,
			4 => LengthUnit::Degree,
			_ => LengthUnit::Undefined,
		}
	}

	pub fn to_i32(self) -> i32 { self as i32 }
}
