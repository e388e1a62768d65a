use std::{fmt::Display, path::PathBuf};

use clap::Args;
use geo::Cvf2Reader;

#[derive(Args)]
/// Print a CVF2 file's header fields and derived statistics.
pub struct Info {
	input: PathBuf,
}

struct Size(u64);

impl Display for Size {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let size = self.0;
		if size < 1000 {
			write!(f, "{} B", size)
		} else if size < 1000 * 1000 {
			write!(f, "{:.2} KB", size as f64 / 1000.0)
		} else if size < 1000 * 1000 * 1000 {
			write!(f, "{:.2} MiB", size as f64 / 1000.0 / 1000.0)
		} else {
			write!(f, "{:.2} GiB", size as f64 / 1000.0 / 1000.0 / 1000.0)
		}
	}
}

pub fn info(info: Info) {
	let mut reader = match Cvf2Reader::open(&info.input) {
		Ok(x) => x,
		Err(err) => {
			eprintln!("file could not be opened: {}", err);
			return;
		},
	};

	let bbox = reader.bbox();
	let file_size = std::fs::metadata(&info.input).map(|m| m.len()).unwrap_or(0);

	println!("Header");
	println!("  Dimensions: {} x {}", reader.width(), reader.height());
	println!("  SRID: {}", reader.srid());
	println!("  Unit: {:?}", reader.unit());
	println!(
		"  Bbox: ({:.7}, {:.7}) - ({:.7}, {:.7})",
		bbox.min_x.to_f64(),
		bbox.min_y.to_f64(),
		bbox.max_x.to_f64(),
		bbox.max_y.to_f64()
	);

	println!();

	println!("Statistics");
	println!("  Undefined cells: {}", reader.undef_count());
	println!("  Min: {}", reader.min_value());
	println!("  Max: {}", reader.max_value());
	println!("  Mean: {:.3}", reader.mean_value());

	println!();

	println!("File size: {}", Size(file_size));

	// Exercise the reader the same way a dense consumer (the tile manager, the pyramid
	// generator) would, to surface any corrupt-row errors that the header alone can't catch.
	if let Err(err) = reader.build_cache() {
		eprintln!("warning: row data could not be fully decoded: {}", err);
	}
}
