//! The byte-order-aware stream primitives the codec is built on.
//!
//! The format treats general file I/O and endianness handling as something a surrounding layer
//! would normally provide; since nothing in the example workspace already exposes a byte-order
//! generic stream of this shape, this module hand-rolls the small surface actually needed, the
//! same way the workspace hand-rolls other small binary-format primitives rather than reaching
//! for an extra dependency.

use std::{
	fs::File,
	io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
	path::Path,
};

use crate::error::{CvfError, Result};

/// Byte order a container was written in.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Endian {
	Little,
	Big,
}

impl Endian {
	/// The endianness this process's CPU uses natively; new files are always written in this
	/// order.
	pub fn native() -> Self {
		if cfg!(target_endian = "little") {
			Endian::Little
		} else {
			Endian::Big
		}
	}

	pub fn signature(self) -> [u8; 2] {
		match self {
			Endian::Little => *b"II",
			Endian::Big => *b"MM",
		}
	}

	pub fn from_signature(sig: [u8; 2]) -> Result<Self> {
		match &sig {
			b"II" => Ok(Endian::Little),
			b"MM" => Ok(Endian::Big),
			_ => Err(CvfError::corrupt("invalid endianness signature")),
		}
	}
}

/// A writable stream positioned at an absolute byte offset, honoring a chosen endianness for all
/// multi-byte fields.
pub struct WriteStream {
	inner: BufWriter<File>,
	endian: Endian,
}

impl WriteStream {
	pub fn create(path: impl AsRef<Path>) -> Result<Self> {
		let file = File::create(path)?;
		Ok(Self { inner: BufWriter::new(file), endian: Endian::native() })
	}

	pub fn endian(&self) -> Endian { self.endian }

	pub fn pos(&mut self) -> Result<u64> { Ok(self.inner.stream_position()?) }

	pub fn set_pos(&mut self, pos: u64) -> Result<()> {
		self.inner.seek(SeekFrom::Start(pos))?;
		Ok(())
	}

	pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
		self.inner.write_all(bytes)?;
		Ok(())
	}

	pub fn write_u8(&mut self, v: u8) -> Result<()> { self.write_bytes(&[v]) }

	pub fn write_u16(&mut self, v: u16) -> Result<()> {
		self.write_bytes(&match self.endian {
			Endian::Little => v.to_le_bytes(),
			Endian::Big => v.to_be_bytes(),
		})
	}

	pub fn write_i16(&mut self, v: i16) -> Result<()> { self.write_u16(v as u16) }

	pub fn write_u32(&mut self, v: u32) -> Result<()> {
		self.write_bytes(&match self.endian {
			Endian::Little => v.to_le_bytes(),
			Endian::Big => v.to_be_bytes(),
		})
	}

	pub fn write_i32(&mut self, v: i32) -> Result<()> { self.write_u32(v as u32) }

	pub fn write_u64(&mut self, v: u64) -> Result<()> {
		self.write_bytes(&match self.endian {
			Endian::Little => v.to_le_bytes(),
			Endian::Big => v.to_be_bytes(),
		})
	}

	pub fn write_i64(&mut self, v: i64) -> Result<()> { self.write_u64(v as u64) }

	pub fn write_f32(&mut self, v: f32) -> Result<()> { self.write_u32(v.to_bits()) }

	pub fn write_f64(&mut self, v: f64) -> Result<()> { self.write_u64(v.to_bits()) }

	pub fn flush(&mut self) -> Result<()> {
		self.inner.flush()?;
		Ok(())
	}
}

/// A readable stream positioned at an absolute byte offset, honoring the endianness recorded in
/// the file it is reading.
pub struct ReadStream {
	inner: BufReader<File>,
	endian: Endian,
}

impl ReadStream {
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let file = File::open(path)?;
		Ok(Self { inner: BufReader::new(file), endian: Endian::Little })
	}

	pub fn set_endian(&mut self, endian: Endian) { self.endian = endian; }

	pub fn endian(&self) -> Endian { self.endian }

	pub fn pos(&mut self) -> Result<u64> { Ok(self.inner.stream_position()?) }

	pub fn set_pos(&mut self, pos: u64) -> Result<()> {
		self.inner.seek(SeekFrom::Start(pos))?;
		Ok(())
	}

	pub fn len(&mut self) -> Result<u64> {
		let curr = self.pos()?;
		let end = self.inner.seek(SeekFrom::End(0))?;
		self.inner.seek(SeekFrom::Start(curr))?;
		Ok(end)
	}

	pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
		match self.inner.read_exact(buf) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
				Err(CvfError::corrupt("unexpected end of file"))
			},
			Err(e) => Err(e.into()),
		}
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		let mut buf = [0u8; 1];
		self.read_bytes(&mut buf)?;
		Ok(buf[0])
	}

	pub fn read_u16(&mut self) -> Result<u16> {
		let mut buf = [0u8; 2];
		self.read_bytes(&mut buf)?;
		Ok(match self.endian {
			Endian::Little => u16::from_le_bytes(buf),
			Endian::Big => u16::from_be_bytes(buf),
		})
	}

	pub fn read_i16(&mut self) -> Result<i16> { Ok(self.read_u16()? as i16) }

	pub fn read_u32(&mut self) -> Result<u32> {
		let mut buf = [0u8; 4];
		self.read_bytes(&mut buf)?;
		Ok(match self.endian {
			Endian::Little => u32::from_le_bytes(buf),
			Endian::Big => u32::from_be_bytes(buf),
		})
	}

	pub fn read_i32(&mut self) -> Result<i32> { Ok(self.read_u32()? as i32) }

	pub fn read_u64(&mut self) -> Result<u64> {
		let mut buf = [0u8; 8];
		self.read_bytes(&mut buf)?;
		Ok(match self.endian {
			Endian::Little => u64::from_le_bytes(buf),
			Endian::Big => u64::from_be_bytes(buf),
		})
	}

	pub fn read_i64(&mut self) -> Result<i64> { Ok(self.read_u64()? as i64) }

	pub fn read_f32(&mut self) -> Result<f32> { Ok(f32::from_bits(self.read_u32()?)) }

	pub fn read_f64(&mut self) -> Result<f64> { Ok(f64::from_bits(self.read_u64()?)) }
}
