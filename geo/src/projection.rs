//! Coordinate reprojection boundary.
//!
//! Reprojection itself is out of scope for this crate (§1): the query engine and pyramid
//! generator only need *some* way to map a point between two spatial reference identifiers, and
//! leave the actual transform to a caller-supplied implementation.

use crate::error::Result;

/// Maps a point `(x, y)` from one spatial reference system to another.
///
/// Implementations are expected to be cheap to call per-cell; the query engine invokes this once
/// per sub-sample while rendering a bounding box.
pub trait Projector: Send + Sync {
	/// Projects `(x, y)`, expressed in `src_srid`, into `dst_srid`. Returns an error if the
	/// transform is undefined for this SRID pair (e.g. unknown SRID) or the point falls outside
	/// the projection's domain.
	fn project(&self, x: f64, y: f64, src_srid: i32, dst_srid: i32) -> Result<(f64, f64)>;
}

/// A projector for callers whose data already shares a single SRID throughout: returns the input
/// unchanged when `src_srid == dst_srid`, and fails otherwise.
pub struct IdentityProjector;

impl Projector for IdentityProjector {
	fn project(&self, x: f64, y: f64, src_srid: i32, dst_srid: i32) -> Result<(f64, f64)> {
		if src_srid == dst_srid {
			Ok((x, y))
		} else {
			Err(crate::error::CvfError::projection(format!(
				"identity projector cannot map SRID {src_srid} to {dst_srid}"
			)))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identity_passes_through_matching_srid() {
		let p = IdentityProjector;
		assert_eq!(p.project(1.0, 2.0, 4326, 4326).unwrap(), (1.0, 2.0));
	}

	#[test]
	fn identity_rejects_mismatched_srid() {
		let p = IdentityProjector;
		assert!(p.project(1.0, 2.0, 4326, 3857).is_err());
	}
}
