//! Row codec (C1): nibble-granularity delta encoding for one row of a grid.
//!
//! A row is split into **runs**: contiguous spans of columns that all fit within `max_diff(digits)`
//! of a shared minimum. Every defined cell in a run is stored as `value - run.min`, packed into
//! `digits` 4-bit nibbles, high nibble first. Undefined cells are stored as `max_diff(digits) + 1`,
//! one past the largest representable delta, so decoding an accumulator greater than `max_diff`
//! signals "no measurement here" without a separate bitmap.

use crate::error::{CvfError, Result};

/// The reserved scalar meaning "no measurement at this cell."
pub const UNDEFINED_VALUE: i64 = i64::MIN;

/// Largest representable delta for a given nibble width: `16^digits - 2`. One additional code
/// point above this (`max_diff + 1`) is reserved for [`UNDEFINED_VALUE`].
pub fn max_diff(digits: u32) -> i64 { 16i64.pow(digits) - 2 }

/// One contiguous run of columns within a row.
#[derive(Copy, Clone, Debug)]
pub struct Run {
	/// Starting column of this run (the first run's offset is always 0).
	pub offset: u32,
	/// Minimum defined value within the run; deltas are stored relative to this.
	pub min: i64,
	/// Number of columns this run covers.
	pub length: u32,
}

/// The fully encoded form of one row, ready to be serialized by the writer.
pub struct EncodedRow {
	pub digits: u32,
	pub runs: Vec<Run>,
	/// Packed nibble stream, two nibbles per byte, high nibble first, zero-padded in the low
	/// nibble of the final byte if the nibble count is odd.
	pub bytes: Vec<u8>,
}

/// Simulates encoding `values` at a fixed `digits` without producing bytes.
///
/// Returns the number of runs the row would split into and the byte size the row block would
/// occupy on disk, including its `digits`/`run_count` header and per-run `(offset, min)` overhead.
pub fn predict_row(values: &[i64], digits: u32) -> (u32, i64) {
	let diff = max_diff(digits);
	let mut min = i64::MAX;
	let mut max = i64::MIN;
	let mut run_count: u32 = 1;
	let mut run_length: i64 = 0;
	let mut nibble_count: i64 = 0;

	let width = values.len();
	let mut i = 0usize;
	while i < width {
		let value = values[i];
		let mut range_flag = false;

		if value != UNDEFINED_VALUE {
			if value < min {
				min = value;
			}
			if value > max {
				max = value;
			}
			range_flag = max - min > diff;
		}

		let stop = i == width - 1;

		if range_flag {
			nibble_count += run_length * digits as i64;
			run_count += 1;
			min = i64::MAX;
			max = i64::MIN;
			run_length = 0;
			// Rewind: re-process this cell as the start of a new run.
			continue;
		} else if stop {
			run_length += 1;
			nibble_count += run_length * digits as i64;
			run_count += 1;
			break;
		} else {
			run_length += 1;
		}
		i += 1;
	}

	let mut byte_count = (nibble_count + 1) / 2;
	byte_count += 2; // digits field, 16 bits
	byte_count += run_count as i64 * (4 + 8) - 4; // offset + min per run, first offset omitted

	(run_count, byte_count)
}

/// Chooses the `digits` in `[min_digits, max_digits]` that minimizes the predicted byte count,
/// breaking ties toward the smaller `digits`. Early-exits as soon as a candidate predicts a
/// single run, since widening `digits` further cannot reduce the run count below 1.
pub fn choose_digits(values: &[i64], min_digits: u32, max_digits: u32) -> Result<u32> {
	let mut best_digits = 0u32;
	let mut best_bytes = i64::MAX;

	for digits in min_digits..=max_digits {
		let (run_count, byte_count) = predict_row(values, digits);
		if byte_count < best_bytes {
			best_bytes = byte_count;
			best_digits = digits;
		}
		if run_count <= 1 {
			break;
		}
	}

	if best_digits == 0 {
		return Err(CvfError::corrupt("no digit width could encode this row"));
	}
	Ok(best_digits)
}

/// Encodes `values` (length `width`) at the given `digits`, which must already have been chosen
/// (typically via [`choose_digits`]).
pub fn encode_row(values: &[i64], digits: u32) -> EncodedRow {
	let diff = max_diff(digits);
	let width = values.len();

	let mut runs = Vec::new();
	let mut nibbles = NibbleWriter::new();

	let mut min = i64::MAX;
	let mut max = i64::MIN;
	let mut run_start = 0usize;
	let mut run_offset = 0u32;

	let mut i = 0usize;
	while i < width {
		let value = values[i];
		let mut range_flag = false;
		let prev_min = min;

		if value != UNDEFINED_VALUE {
			if value < min {
				min = value;
			}
			if value > max {
				max = value;
			}
			range_flag = max - min > diff;
		}

		let stop = i == width - 1;

		if range_flag {
			let length = (i - run_start) as u32;
			push_run(&mut runs, &mut nibbles, values, run_start, length, run_offset, prev_min, diff, digits);
			run_offset += length;
			run_start = i;
			min = i64::MAX;
			max = i64::MIN;
			// Rewind: re-process this cell as the start of a new run.
			continue;
		} else if stop {
			let length = (i - run_start + 1) as u32;
			push_run(&mut runs, &mut nibbles, values, run_start, length, run_offset, min, diff, digits);
			break;
		}
		i += 1;
	}

	EncodedRow { digits, runs, bytes: nibbles.finish() }
}

#[allow(clippy::too_many_arguments)]
fn push_run(
	runs: &mut Vec<Run>,
	nibbles: &mut NibbleWriter,
	values: &[i64],
	start: usize,
	length: u32,
	offset: u32,
	min: i64,
	diff: i64,
	digits: u32,
) {
	runs.push(Run { offset, min, length });
	for i in 0..length as usize {
		let raw = values[start + i];
		let delta = if raw == UNDEFINED_VALUE { diff + 1 } else { raw - min };
		nibbles.push_value(delta as u64, digits);
	}
}

struct NibbleWriter {
	bytes: Vec<u8>,
	high_nibble: bool,
}

impl NibbleWriter {
	fn new() -> Self { Self { bytes: Vec::new(), high_nibble: true } }

	fn push_value(&mut self, value: u64, digits: u32) {
		for j in 0..digits {
			let shift = (digits - j - 1) * 4;
			let nibble = ((value >> shift) & 0xF) as u8;
			self.push_nibble(nibble);
		}
	}

	fn push_nibble(&mut self, nibble: u8) {
		if self.high_nibble {
			self.bytes.push((nibble & 0xF) << 4);
			self.high_nibble = false;
		} else {
			*self.bytes.last_mut().expect("high nibble always pushed first") |= nibble & 0xF;
			self.high_nibble = true;
		}
	}

	fn finish(self) -> Vec<u8> { self.bytes }
}

/// Decodes one row from its packed run table and nibble stream.
pub fn decode_row(digits: u32, runs: &[Run], bytes: &[u8], width: usize) -> Vec<i64> {
	let diff = max_diff(digits);
	let mut out = Vec::with_capacity(width);

	for run in runs {
		for col in 0..run.length {
			let cell_index = run.offset as usize + col as usize;
			let nibble_index = cell_index * digits as usize;
			let accumulator = read_nibbles(bytes, nibble_index, digits);
			let value = if accumulator as i64 > diff { UNDEFINED_VALUE } else { run.min + accumulator as i64 };
			debug_assert_eq!(out.len(), cell_index);
			out.push(value);
		}
	}

	out
}

/// Decodes a single cell at column `x` without materializing the whole row; used by the random
/// access reader. `run` must be the run covering `x` (greatest `offset <= x`).
pub fn decode_cell(digits: u32, run: &Run, bytes: &[u8], x: u32) -> i64 {
	let diff = max_diff(digits);
	let col_in_run = (x - run.offset) as usize;
	let nibble_index = (run.offset as usize + col_in_run) * digits as usize;
	let accumulator = read_nibbles(bytes, nibble_index, digits);
	if accumulator as i64 > diff {
		UNDEFINED_VALUE
	} else {
		run.min + accumulator as i64
	}
}

fn read_nibbles(bytes: &[u8], nibble_index: usize, digits: u32) -> u64 {
	let mut accumulator: u64 = 0;
	for j in 0..digits as usize {
		let nibble_pos = nibble_index + j;
		let byte = bytes[nibble_pos / 2];
		let nibble = if nibble_pos % 2 == 0 { byte >> 4 } else { byte & 0xF };
		accumulator = (accumulator << 4) | nibble as u64;
	}
	accumulator
}

#[cfg(test)]
mod tests {
	use super::*;

	fn round_trip(values: &[i64], min_digits: u32, max_digits: u32) {
		let digits = choose_digits(values, min_digits, max_digits).unwrap();
		let encoded = encode_row(values, digits);
		let decoded = decode_row(encoded.digits, &encoded.runs, &encoded.bytes, values.len());
		assert_eq!(decoded, values, "round trip failed for digits in [{min_digits},{max_digits}]");
	}

	#[test]
	fn constant_row_single_run() {
		let values = vec![42i64; 4];
		let digits = choose_digits(&values, 2, 2).unwrap();
		let encoded = encode_row(&values, digits);
		assert_eq!(encoded.runs.len(), 1);
		assert_eq!(encoded.digits, 2);
		round_trip(&values, 2, 2);
	}

	#[test]
	fn constant_with_one_undefined() {
		let values = vec![10, 10, UNDEFINED_VALUE, 10];
		round_trip(&values, 2, 2);
		let digits = choose_digits(&values, 2, 2).unwrap();
		let encoded = encode_row(&values, digits);
		let decoded = decode_row(encoded.digits, &encoded.runs, &encoded.bytes, values.len());
		assert_eq!(decoded[2], UNDEFINED_VALUE);
	}

	#[test]
	fn run_split_on_large_jump() {
		let values = vec![0i64, 1, 2, 1_000_000, 1_000_001];
		assert_eq!(max_diff(2), 254);
		let digits = choose_digits(&values, 2, 2).unwrap();
		let encoded = encode_row(&values, digits);
		assert_eq!(encoded.runs.len(), 2);
		assert_eq!(encoded.runs[0].offset, 0);
		assert_eq!(encoded.runs[1].offset, 3);
		round_trip(&values, 2, 2);
	}

	#[test]
	fn digit_selection_prefers_smaller_on_tie() {
		let values = vec![0i64, 15, 0, 15];
		let digits = choose_digits(&values, 1, 4).unwrap();
		assert_eq!(digits, 2);
		let encoded = encode_row(&values, digits);
		assert_eq!(encoded.runs.len(), 1);
		round_trip(&values, 1, 4);
	}

	#[test]
	fn random_grid_matches_row_by_row() {
		use rand::{Rng, SeedableRng};
		let mut rng = rand::rngs::StdRng::seed_from_u64(7);
		for _ in 0..20 {
			let width = 100;
			let mut values = Vec::with_capacity(width);
			for _ in 0..width {
				if rng.gen_bool(0.2) {
					values.push(UNDEFINED_VALUE);
				} else {
					values.push(rng.gen_range(-1_000_000i64..1_000_000));
				}
			}
			let min_digits = rng.gen_range(2..=3u32);
			let max_digits = rng.gen_range(min_digits..=4u32);
			round_trip(&values, min_digits, max_digits);
		}
	}

	#[test]
	fn run_boundary_respects_max_diff() {
		let values = vec![0i64, 100, 200, 50, 300, 900];
		let digits = choose_digits(&values, 2, 4).unwrap();
		let encoded = encode_row(&values, digits);
		let diff = max_diff(encoded.digits);
		for run in &encoded.runs {
			let mut min = i64::MAX;
			let mut max = i64::MIN;
			for col in 0..run.length {
				let v = values[(run.offset + col) as usize];
				if v != UNDEFINED_VALUE {
					min = min.min(v);
					max = max.max(v);
				}
			}
			if max >= min {
				assert!(max - min <= diff);
			}
		}
	}
}
