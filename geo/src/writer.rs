//! CVF2 writer (C2): drives the row codec over streamed or bulk input and emits a finished file.
//!
//! Two push modes are supported, matching the container's state machine: `push_value` appends
//! one value at a time in row-major order, encoding a row as soon as it fills; `push_value_at`
//! seeds a full `width * height` buffer (initialized to [`UNDEFINED_VALUE`]) at arbitrary
//! coordinates, with `encode_data` flushing every row once the caller is done filling it in.

use std::path::Path;

use crate::endian::WriteStream;
use crate::error::{CvfError, Result};
use crate::fix::{BboxFix, Fix};
use crate::length_unit::LengthUnit;
use crate::row_codec::{choose_digits, encode_row, UNDEFINED_VALUE};

const DEFAULT_MIN_DIGITS: u32 = 2;
const DEFAULT_MAX_DIGITS: u32 = 4;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum State {
	Fresh,
	Open,
	BulkOpen,
	Closed,
}

/// Incrementally builds a CVF2 file from `width * height` `i64` samples.
pub struct Cvf2Writer {
	width: u32,
	height: u32,
	srid: i32,
	bbox: BboxFix,
	unit: LengthUnit,
	min_digits: u32,
	max_digits: u32,

	state: State,
	stream: Option<WriteStream>,
	target_path: Option<std::path::PathBuf>,

	row_values: Vec<i64>,
	curr_value_index: usize,
	curr_row_index: i64,
	row_offsets: Vec<u64>,

	bulk_data: Option<Vec<i64>>,

	min_value: i64,
	max_value: i64,
	undef_count: i32,
	defined_count: i64,
	sum: f64,

	pos_undef_count: u64,
	pos_min_max: u64,
	pos_row_offsets: u64,
}

impl Cvf2Writer {
	/// Creates a writer for a grid of the given dimensions. `min_digits`/`max_digits` bound the
	/// row codec's digit search and are clamped the way the reference format's constructor
	/// clamps them: `min_digits` up to at least 2, `max_digits` up to at least `min_digits` but
	/// never above 8 (the format's documented ceiling, beyond which `16i64.pow(digits)` would
	/// overflow `i64`).
	pub fn new(width: u32, height: u32, unit: LengthUnit, min_digits: i32, max_digits: i32) -> Self {
		let min_digits = if min_digits < 0 { DEFAULT_MIN_DIGITS } else { (min_digits as u32).max(2) };
		let max_digits = if max_digits < 0 { DEFAULT_MAX_DIGITS } else { (max_digits as u32).max(min_digits).min(8) };

		Self {
			width,
			height,
			srid: 0,
			bbox: BboxFix::default(),
			unit,
			min_digits,
			max_digits,
			state: State::Fresh,
			stream: None,
			target_path: None,
			row_values: vec![UNDEFINED_VALUE; width as usize],
			curr_value_index: 0,
			curr_row_index: -1,
			row_offsets: Vec::with_capacity(height as usize),
			bulk_data: None,
			min_value: i64::MAX,
			max_value: i64::MIN,
			undef_count: 0,
			defined_count: 0,
			sum: 0.0,
			pos_undef_count: 0,
			pos_min_max: 0,
			pos_row_offsets: 0,
		}
	}

	pub fn set_srid(&mut self, srid: i32) { self.srid = srid; }

	pub fn set_bbox(&mut self, bbox: BboxFix) { self.bbox = bbox; }

	pub fn set_unit(&mut self, unit: LengthUnit) { self.unit = unit; }

	/// Creates the file, writes the header skeleton, and records the positions of fields that
	/// are patched at [`Self::finish`].
	pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
		if self.state != State::Fresh {
			return Err(CvfError::config("writer already opened"));
		}

		let path = path.as_ref();
		let mut stream = WriteStream::create(path)?;

		stream.write_bytes(b"CVF2")?;
		stream.write_bytes(&stream.endian().signature())?;

		stream.write_u32(self.width)?;
		stream.write_u32(self.height)?;
		stream.write_i32(self.srid)?;

		self.bbox.write(&mut stream)?;

		self.pos_undef_count = stream.pos()?;
		stream.write_i32(-1)?;

		self.pos_min_max = stream.pos()?;
		stream.write_i64(self.min_value)?;
		stream.write_i64(self.max_value)?;
		Fix::ZERO.write(&mut stream)?;

		stream.write_i32(self.unit.to_i32())?;

		self.pos_row_offsets = stream.pos()?;
		stream.write_u32(0)?;

		self.stream = Some(stream);
		self.target_path = Some(path.to_path_buf());
		self.state = State::Open;
		Ok(())
	}

	/// Appends one value in row-major order, encoding and writing a row block as soon as it
	/// fills.
	pub fn push_value(&mut self, value: i64) -> Result<()> {
		if !matches!(self.state, State::Open) {
			return Err(CvfError::config("writer not in streaming push mode"));
		}
		if self.curr_value_index >= self.width as usize {
			return Err(CvfError::bad_args("push_value exceeded row width"));
		}

		self.row_values[self.curr_value_index] = value;
		self.curr_value_index += 1;

		if self.curr_value_index >= self.width as usize {
			self.start_row()?;
			let values = std::mem::replace(&mut self.row_values, vec![UNDEFINED_VALUE; self.width as usize]);
			self.encode_and_write_row(&values)?;
			self.curr_value_index = 0;
		}
		Ok(())
	}

	fn start_row(&mut self) -> Result<()> {
		self.curr_row_index += 1;
		if self.curr_row_index >= self.height as i64 {
			return Err(CvfError::bad_args("attempted to encode more rows than height"));
		}
		Ok(())
	}

	/// Alternative bulk mode: stores `value` at `(x, y)` in a full-grid buffer allocated (and
	/// filled with [`UNDEFINED_VALUE`]) on first use. Call [`Self::encode_data`] to flush.
	pub fn push_value_at(&mut self, x: u32, y: u32, value: i64) -> Result<()> {
		if !matches!(self.state, State::Open | State::BulkOpen) {
			return Err(CvfError::config("writer not open"));
		}
		if x >= self.width || y >= self.height {
			return Err(CvfError::bad_args("push_value_at coordinates out of range"));
		}

		if self.bulk_data.is_none() {
			let n = self.width as usize * self.height as usize;
			self.bulk_data = Some(vec![UNDEFINED_VALUE; n]);
			self.state = State::BulkOpen;
		}

		let width = self.width as usize;
		self.bulk_data.as_mut().unwrap()[y as usize * width + x as usize] = value;
		Ok(())
	}

	/// Emits every row of the bulk buffer in order, returning to the streaming-open state.
	pub fn encode_data(&mut self) -> Result<()> {
		let data = self.bulk_data.take().ok_or_else(|| CvfError::config("no bulk data to encode"))?;
		let width = self.width as usize;

		for y in 0..self.height as usize {
			self.start_row()?;
			let row = &data[y * width..(y + 1) * width];
			self.encode_and_write_row(row)?;
		}

		self.state = State::Open;
		Ok(())
	}

	fn encode_and_write_row(&mut self, values: &[i64]) -> Result<()> {
		let digits = choose_digits(values, self.min_digits, self.max_digits)?;
		let encoded = encode_row(values, digits);

		// Run-split rewinds visit a cell twice in the reference accounting (once when the run
		// that overflows is flushed, once as the first cell of the new run); the net effect is
		// each defined cell is still counted exactly once. We mirror that by counting defined
		// cells and statistics per logical cell exactly once here, since our codec only visits
		// every index once regardless of run splits.
		for &value in values {
			if value != UNDEFINED_VALUE {
				self.min_value = self.min_value.min(value);
				self.max_value = self.max_value.max(value);
				self.sum += value as f64;
				self.defined_count += 1;
			} else {
				self.undef_count += 1;
			}
		}

		let stream = self.stream.as_mut().expect("writer is open");
		let row_offset = stream.pos()?;
		self.row_offsets.push(row_offset);

		stream.write_u16(encoded.digits as u16)?;
		stream.write_u32(encoded.runs.len() as u32)?;
		for (i, run) in encoded.runs.iter().enumerate() {
			if i > 0 {
				stream.write_u32(run.offset)?;
			}
			stream.write_i64(run.min)?;
		}
		stream.write_bytes(&encoded.bytes)?;

		if self.curr_row_index == self.height as i64 - 1 {
			self.write_row_offset_table()?;
		}
		Ok(())
	}

	fn write_row_offset_table(&mut self) -> Result<()> {
		let stream = self.stream.as_mut().expect("writer is open");
		let row_offsets_pos = stream.pos()?;
		for &offset in &self.row_offsets {
			stream.write_u32(offset as u32)?;
		}

		let end_pos = stream.pos()?;
		stream.set_pos(self.pos_row_offsets)?;
		stream.write_u32(row_offsets_pos as u32)?;
		stream.set_pos(end_pos)?;
		Ok(())
	}

	/// Patches the header's statistics and row-offset pointer, then closes the file.
	///
	/// On any failure, the partially written target file is removed rather than left as a
	/// truncated file that could be mistaken for a finished one. A writer abandoned before
	/// `finish` is ever called — after a `push_value`/`start_row`/`push_value_at` error, say —
	/// gets the same treatment from `Drop`.
	pub fn finish(mut self) -> Result<()> {
		self.finish_inner().map_err(|e| {
			if let Some(path) = &self.target_path {
				let _ = std::fs::remove_file(path);
			}
			e
		})
	}

	fn finish_inner(&mut self) -> Result<()> {
		if matches!(self.state, State::BulkOpen) {
			self.encode_data()?;
		}
		if !matches!(self.state, State::Open) {
			return Err(CvfError::config("writer not in a finishable state"));
		}
		if self.row_offsets.len() != self.height as usize {
			return Err(CvfError::corrupt("not all rows were written before finish"));
		}

		let mean = if self.defined_count > 0 { self.sum / self.defined_count as f64 } else { 0.0 };

		let stream = self.stream.as_mut().expect("writer is open");

		stream.set_pos(self.pos_undef_count)?;
		stream.write_i32(self.undef_count)?;

		stream.set_pos(self.pos_min_max)?;
		let (min, max) =
			if self.defined_count > 0 { (self.min_value, self.max_value) } else { (UNDEFINED_VALUE, UNDEFINED_VALUE) };
		stream.write_i64(min)?;
		stream.write_i64(max)?;
		Fix::from_f64(mean).write(stream)?;

		stream.flush()?;
		self.state = State::Closed;
		Ok(())
	}
}

impl Drop for Cvf2Writer {
	/// Backstops `finish`'s own cleanup: if the writer is dropped without ever reaching
	/// `State::Closed` — a `push_value`/`start_row`/`push_value_at` error abandoned midstream, or
	/// `finish` was simply never called — the partially written target file is removed here
	/// instead of being left on disk looking like a finished one.
	fn drop(&mut self) {
		if !matches!(self.state, State::Closed) {
			if let Some(path) = &self.target_path {
				let _ = std::fs::remove_file(path);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reader::Cvf2Reader;

	#[test]
	fn streamed_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("a.cvf");

		let mut writer = Cvf2Writer::new(2, 2, LengthUnit::Meter, 2, 2);
		writer.open(&path).unwrap();
		for v in [42i64, 42, 42, 42] {
			writer.push_value(v).unwrap();
		}
		writer.finish().unwrap();

		let mut reader = Cvf2Reader::open(&path).unwrap();
		assert_eq!(reader.value_at(0, 0, false).unwrap(), 42);
		assert_eq!(reader.value_at(1, 1, false).unwrap(), 42);
		assert_eq!(reader.undef_count(), 0);
		assert_eq!(reader.min_value(), 42);
		assert_eq!(reader.max_value(), 42);
	}

	#[test]
	fn bulk_round_trip_with_undefined() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("b.cvf");

		let mut writer = Cvf2Writer::new(4, 1, LengthUnit::Meter, 2, 2);
		writer.open(&path).unwrap();
		writer.push_value_at(0, 0, 10).unwrap();
		writer.push_value_at(1, 0, 10).unwrap();
		writer.push_value_at(3, 0, 10).unwrap();
		writer.encode_data().unwrap();
		writer.finish().unwrap();

		let mut reader = Cvf2Reader::open(&path).unwrap();
		assert_eq!(reader.value_at(2, 0, false).unwrap(), UNDEFINED_VALUE);
		assert_eq!(reader.undef_count(), 1);
	}

	#[test]
	fn header_stats_match_rescan() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("c.cvf");

		let mut writer = Cvf2Writer::new(3, 2, LengthUnit::Meter, 2, 3);
		writer.open(&path).unwrap();
		for v in [1i64, 2, UNDEFINED_VALUE, 4, 5, 6] {
			writer.push_value(v).unwrap();
		}
		writer.finish().unwrap();

		let reader = Cvf2Reader::open(&path).unwrap();
		assert_eq!(reader.undef_count(), 1);
		assert_eq!(reader.min_value(), 1);
		assert_eq!(reader.max_value(), 6);
		let expected_mean = (1 + 2 + 4 + 5 + 6) as f64 / 5.0;
		assert!((reader.mean_value() - expected_mean).abs() < 1e-6);
	}
}
