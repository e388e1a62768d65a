//! CVF2 reader (C3): parses the header and serves random-access point and row lookups.
//!
//! Row blocks are decoded on demand; an optional cache (see [`Cvf2Reader::build_cache`]) decodes
//! every row up front and keeps the results resident, trading memory for avoiding repeated seeks
//! on a file that will be queried densely (e.g. while rendering).

use std::path::{Path, PathBuf};

use crate::endian::{Endian, ReadStream};
use crate::error::{CvfError, Result};
use crate::fix::BboxFix;
use crate::length_unit::LengthUnit;
use crate::row_codec::{decode_cell, decode_row, Run, UNDEFINED_VALUE};

struct RowHeader {
	digits: u32,
	runs: Vec<Run>,
	data_offset: u64,
}

/// An open handle to a CVF2 file's header and row index.
pub struct Cvf2Reader {
	path: PathBuf,
	stream: ReadStream,

	width: u32,
	height: u32,
	srid: i32,
	bbox: BboxFix,
	undef_count: i32,
	min_value: i64,
	max_value: i64,
	mean_value: f64,
	unit: LengthUnit,

	row_offsets: Vec<u32>,
	row_cache: Option<Vec<Vec<i64>>>,
}

impl Cvf2Reader {
	/// Opens `path`, validates the magic and endianness signature, and parses the fixed-size
	/// header fields and row-offset table. Row bodies are not read until requested.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref().to_path_buf();
		let mut stream = ReadStream::open(&path)?;

		let mut magic = [0u8; 4];
		stream.read_bytes(&mut magic)?;
		if &magic != b"CVF2" {
			return Err(CvfError::corrupt("not a CVF2 file"));
		}

		let mut sig = [0u8; 2];
		stream.read_bytes(&mut sig)?;
		stream.set_endian(Endian::from_signature(sig)?);

		let width = stream.read_u32()?;
		let height = stream.read_u32()?;
		let srid = stream.read_i32()?;
		let bbox = BboxFix::read(&mut stream)?;
		let undef_count = stream.read_i32()?;
		let min_value = stream.read_i64()?;
		let max_value = stream.read_i64()?;
		let mean_value = crate::fix::Fix::read(&mut stream)?.to_f64();
		let unit = LengthUnit::from_i32(stream.read_i32()?);
		let row_offsets_pos = stream.read_u32()?;

		if width == 0 || height == 0 {
			return Err(CvfError::corrupt("zero-sized grid"));
		}

		stream.set_pos(row_offsets_pos as u64)?;
		let mut row_offsets = Vec::with_capacity(height as usize);
		for _ in 0..height {
			row_offsets.push(stream.read_u32()?);
		}

		Ok(Self {
			path,
			stream,
			width,
			height,
			srid,
			bbox,
			undef_count,
			min_value,
			max_value,
			mean_value,
			unit,
			row_offsets,
			row_cache: None,
		})
	}

	pub fn path(&self) -> &Path { &self.path }

	pub fn width(&self) -> u32 { self.width }

	pub fn height(&self) -> u32 { self.height }

	pub fn srid(&self) -> i32 { self.srid }

	pub fn bbox(&self) -> BboxFix { self.bbox }

	pub fn undef_count(&self) -> i32 { self.undef_count }

	pub fn min_value(&self) -> i64 { self.min_value }

	pub fn max_value(&self) -> i64 { self.max_value }

	pub fn mean_value(&self) -> f64 { self.mean_value }

	pub fn unit(&self) -> LengthUnit { self.unit }

	fn read_row_header(&mut self, y: u32) -> Result<RowHeader> {
		self.stream.set_pos(self.row_offsets[y as usize] as u64)?;
		let digits = self.stream.read_u16()? as u32;
		let run_count = self.stream.read_u32()?;

		let mut runs = Vec::with_capacity(run_count as usize);
		let mut running_offset = 0u32;
		for i in 0..run_count {
			let offset = if i == 0 { 0 } else { self.stream.read_u32()? };
			let min = self.stream.read_i64()?;
			runs.push(Run { offset, min, length: 0 });
			running_offset = offset;
		}
		let _ = running_offset;

		// Fill in each run's length from the next run's offset (or row width for the last run).
		for i in 0..runs.len() {
			let end = if i + 1 < runs.len() { runs[i + 1].offset } else { self.width };
			runs[i].length = end - runs[i].offset;
		}

		let data_offset = self.stream.pos()?;
		Ok(RowHeader { digits, runs, data_offset })
	}

	fn read_row_bytes(&mut self, header: &RowHeader) -> Result<Vec<u8>> {
		let nibble_count: u64 = header.runs.iter().map(|r| r.length as u64 * header.digits as u64).sum();
		let byte_count = ((nibble_count + 1) / 2) as usize;
		self.stream.set_pos(header.data_offset)?;
		let mut bytes = vec![0u8; byte_count];
		self.stream.read_bytes(&mut bytes)?;
		Ok(bytes)
	}

	/// Decodes every row into [`Self::row_cache`] so subsequent [`Self::value_at`] calls with
	/// `use_cache = true` avoid re-seeking and re-decoding.
	pub fn build_cache(&mut self) -> Result<()> {
		let mut rows = Vec::with_capacity(self.height as usize);
		for y in 0..self.height {
			rows.push(self.read_row(y)?);
		}
		self.row_cache = Some(rows);
		Ok(())
	}

	pub fn free_cache(&mut self) { self.row_cache = None; }

	/// Decodes and returns the full row `y` (length [`Self::width`]).
	pub fn read_row(&mut self, y: u32) -> Result<Vec<i64>> {
		if let Some(cache) = &self.row_cache {
			return Ok(cache[y as usize].clone());
		}
		if y >= self.height {
			return Err(CvfError::bad_args("row index out of range"));
		}
		let header = self.read_row_header(y)?;
		let bytes = self.read_row_bytes(&header)?;
		Ok(decode_row(header.digits, &header.runs, &bytes, self.width as usize))
	}

	/// Returns the value at `(x, y)`, or [`UNDEFINED_VALUE`] if no measurement exists there.
	///
	/// When `use_cache` is true, the full-grid cache is built on first use (see
	/// [`Self::build_cache`]) and the lookup becomes a plain slice index; otherwise it seeks to
	/// the row, decodes only the run covering `x`, and decodes a single cell from it.
	pub fn value_at(&mut self, x: u32, y: u32, use_cache: bool) -> Result<i64> {
		if x >= self.width || y >= self.height {
			return Err(CvfError::bad_args("coordinates out of range"));
		}

		if use_cache {
			if self.row_cache.is_none() {
				self.build_cache()?;
			}
			return Ok(self.row_cache.as_ref().unwrap()[y as usize][x as usize]);
		}

		let header = self.read_row_header(y)?;
		let run_index = header
			.runs
			.iter()
			.rposition(|r| r.offset <= x)
			.ok_or_else(|| CvfError::corrupt("no run covers requested column"))?;
		let run = header.runs[run_index];

		let nibble_count: u64 = header.runs[..=run_index].iter().map(|r| r.length as u64 * header.digits as u64).sum();
		let byte_count = ((nibble_count + 1) / 2) as usize;
		self.stream.set_pos(header.data_offset)?;
		let mut bytes = vec![0u8; byte_count];
		self.stream.read_bytes(&mut bytes)?;

		Ok(decode_cell(header.digits, &run, &bytes, x))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::writer::Cvf2Writer;

	#[test]
	fn open_rejects_bad_magic() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("bad.cvf");
		std::fs::write(&path, b"not a cvf2 file at all").unwrap();
		assert!(Cvf2Reader::open(&path).is_err());
	}

	#[test]
	fn cached_and_uncached_reads_agree() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("d.cvf");

		let mut writer = Cvf2Writer::new(5, 3, LengthUnit::Degree, 2, 4);
		writer.open(&path).unwrap();
		let values: Vec<i64> = vec![1, 2, 3, UNDEFINED_VALUE, 5, 10, 20, 30, 40, 50, -1, -2, UNDEFINED_VALUE, -4, -5];
		for v in &values {
			writer.push_value(*v).unwrap();
		}
		writer.finish().unwrap();

		let mut reader = Cvf2Reader::open(&path).unwrap();
		let mut uncached = Vec::new();
		for y in 0..3 {
			for x in 0..5 {
				uncached.push(reader.value_at(x, y, false).unwrap());
			}
		}
		assert_eq!(uncached, values);

		reader.build_cache().unwrap();
		let mut cached = Vec::new();
		for y in 0..3 {
			for x in 0..5 {
				cached.push(reader.value_at(x, y, true).unwrap());
			}
		}
		assert_eq!(cached, values);
	}
}
