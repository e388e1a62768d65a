//! CVF2: a self-describing container for a regular 2-D grid of signed 64-bit samples, plus a
//! tile manager that aggregates many CVF2 files on a slippy-map-style grid and a pyramid
//! generator that builds reduced-resolution meta-tiles from them.
//!
//! ## Container layout
//! A CVF2 file is one header followed by `height` row blocks followed by a row-offset table:
//! * Magic `"CVF2"`, followed by a 2-byte endianness signature (`"II"` little, `"MM"` big). Every
//!   multi-byte field after the signature is written in the signature's byte order.
//! * `width: u32`, `height: u32`, `srid: i32`, `bbox: [Fix; 4]` (min x/y, max x/y).
//! * `undef_count: i32`, `min_value: i64`, `max_value: i64`, `mean_value: Fix`, `unit: i32`.
//! * `row_offsets_pos: u32`, the absolute byte offset of the row-offset table described below.
//! * `height` row blocks, each `digits: u16`, `run_count: u32`, then per run (offset `u32`,
//!   omitted for the first run, which always starts at column 0; `min: i64`), then the packed
//!   nibble stream for every run in order. See [`row_codec`] for the run/nibble scheme.
//! * The row-offset table: `height` `u32`s, the absolute byte offset of each row's block.
//!
//! A cell holds [`row_codec::UNDEFINED_VALUE`] (`i64::MIN`) to mean "no measurement here"; no
//! separate validity bitmap is stored.
//!
//! ## Crate layout
//! * [`row_codec`] — per-row run splitting, nibble packing, and decoding (C1).
//! * [`writer`] / [`reader`] — whole-file encode and random-access decode (C2, C3).
//! * [`value_grid`] — an in-memory grid usable as an encode source, decode sink, or mipmap
//!   operand, independent of any one file (C4).
//! * [`tile`] — aggregates many CVF2 files on a regular tile grid: scanning, a bounded pool of
//!   open readers, point and bbox queries, and pyramid generation (C5-C8).
//! * [`projection`] — the trait boundary a caller implements to map between a tile grid's native
//!   coordinate space and the coordinate space of a query.

mod endian;
mod error;
mod fix;
mod length_unit;
mod projection;
mod reader;
mod row_codec;
pub mod tile;
mod value_grid;
mod writer;

pub use endian::Endian;
pub use error::{CvfError, Result};
pub use fix::{BboxFix, Fix, FIX_DECIMALS};
pub use length_unit::LengthUnit;
pub use projection::Projector;
pub use reader::Cvf2Reader;
pub use row_codec::UNDEFINED_VALUE;
pub use value_grid::{GeoInfo, GridScalar, ValueGrid};
pub use writer::Cvf2Writer;
