use clap::{Parser, Subcommand};

#[cfg(feature = "generate")]
use crate::generate::Generate;
use crate::{info::Info, pyramid::Pyramid, scan::Scan};

mod common;
#[cfg(feature = "generate")]
mod generate;
mod info;
mod pyramid;
mod scan;
#[cfg(feature = "generate")]
mod source;

#[derive(Parser)]
struct Options {
	#[clap(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	#[cfg(feature = "generate")]
	Generate(Generate),
	Info(Info),
	Scan(Scan),
	Pyramid(Pyramid),
}

fn main() {
	env_logger::init();

	let opts: Options = Options::parse();
	match opts.command {
		#[cfg(feature = "generate")]
		Command::Generate(generate) => generate::generate(generate),
		Command::Info(info) => info::info(info),
		Command::Scan(scan) => scan::scan(scan),
		Command::Pyramid(pyramid) => pyramid::pyramid(pyramid),
	}
}
