use std::{
	error::Error,
	fmt::{Debug, Display},
	io,
};

/// Error type shared by every component of the crate.
///
/// Mirrors the abstract error kinds of the format this crate implements: callers should match on
/// the variant, not the message, when deciding how to react.
pub enum CvfError {
	/// Caller-side misuse: out-of-range indices, invalid dimensions, bad arguments.
	BadArgs(String),
	/// The underlying byte stream failed to open, read, write, or seek.
	Io(io::Error),
	/// The file is structurally invalid: bad magic, bad endianness mark, inconsistent row table,
	/// or a decoded delta that violates the run-boundary invariant.
	CorruptFile(String),
	/// An unrecognized data-type tag or unsupported dimension was encountered.
	UnsupportedFormat(String),
	/// A configured capacity was exceeded (tile count limit, 32-bit value-count overflow).
	CapacityExceeded(String),
	/// Coordinate reprojection failed, or an SRID was not recognized by the installed projector.
	Projection(String),
	/// An operation was attempted in the wrong lifecycle state (e.g. `open` called twice).
	Config(String),
	/// Memory or file-handle allocation failed.
	ResourceExhausted(String),
}

impl CvfError {
	pub fn bad_args(msg: impl Into<String>) -> Self { Self::BadArgs(msg.into()) }

	pub fn corrupt(msg: impl Into<String>) -> Self { Self::CorruptFile(msg.into()) }

	pub fn unsupported(msg: impl Into<String>) -> Self { Self::UnsupportedFormat(msg.into()) }

	pub fn capacity(msg: impl Into<String>) -> Self { Self::CapacityExceeded(msg.into()) }

	pub fn projection(msg: impl Into<String>) -> Self { Self::Projection(msg.into()) }

	pub fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }
}

impl Display for CvfError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::BadArgs(msg) => write!(f, "bad arguments: {msg}"),
			Self::Io(err) => write!(f, "IO error: {err}"),
			Self::CorruptFile(msg) => write!(f, "corrupt file: {msg}"),
			Self::UnsupportedFormat(msg) => write!(f, "unsupported format: {msg}"),
			Self::CapacityExceeded(msg) => write!(f, "capacity exceeded: {msg}"),
			Self::Projection(msg) => write!(f, "projection failed: {msg}"),
			Self::Config(msg) => write!(f, "invalid state: {msg}"),
			Self::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
		}
	}
}

impl Debug for CvfError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result { Display::fmt(self, f) }
}

impl Error for CvfError {}

impl From<io::Error> for CvfError {
	fn from(x: io::Error) -> Self { Self::Io(x) }
}

pub type Result<T> = std::result::Result<T, CvfError>;
