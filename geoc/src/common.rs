//! Shared cancellation and progress-reporting scaffolding for the subcommands, adapted from
//! `for_tile_in_output`'s ctrlc handler and progress loop to the unit of work each subcommand
//! actually drives in parallel (one meta-tile per `rayon` task, rather than one lat/lon tile).

use std::{
	io::Write,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

/// Installs a Ctrl+C handler that asks the running job to wind down on the first press and exits
/// immediately on the second. Returns the shared flag so a caller can poll it between batches of
/// work; the `geo` crate's own `rayon` drivers (scan, pyramid) are not threaded through this flag,
/// since a meta-tile render is short enough that letting the current batch finish is simpler than
/// plumbing cancellation into every task.
pub fn install_cancel_handler() -> Arc<AtomicBool> {
	let quit = Arc::new(AtomicBool::new(false));
	let handler_flag = quit.clone();
	let _ = ctrlc::set_handler(move || {
		if handler_flag.load(Ordering::Acquire) {
			std::process::exit(1);
		}
		println!("\nFinishing the current batch, press Ctrl + C again to exit immediately");
		handler_flag.store(true, Ordering::Release);
	});
	quit
}

/// Prints a `done/total` progress line in place.
pub fn report_progress(done: u64, total: u64) {
	print!("\r{done}/{total}");
	let _ = std::io::stdout().flush();
}
