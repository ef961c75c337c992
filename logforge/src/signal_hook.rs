//! Optional signal-triggered dump (unix only). SIGINT/SIGTERM/SIGHUP and a
//! handful of fatal signals request an immediate dump the same way a panic
//! does. Off by default; enabled via `RuntimeConfig::install_signal_hook`.

use signal_hook::consts::{SIGABRT, SIGBUS, SIGHUP, SIGILL, SIGINT, SIGQUIT, SIGSEGV, SIGTERM};
use signal_hook::iterator::Signals;
use std::thread;

fn signal_name(sig: i32) -> &'static str {
  match sig {
    SIGINT => "SIGINT",
    SIGTERM => "SIGTERM",
    SIGQUIT => "SIGQUIT",
    SIGHUP => "SIGHUP",
    SIGABRT => "SIGABRT",
    SIGSEGV => "SIGSEGV",
    SIGBUS => "SIGBUS",
    SIGILL => "SIGILL",
    _ => "UNKNOWN",
  }
}

/// Spawn a background thread that watches for termination/fatal signals and
/// requests a dump when one arrives. The request itself is a non-blocking
/// `try_send` to the runtime's dedicated crash-dump writer thread (see
/// `runtime::spawn_crash_dump_writer`): this thread never touches the ring
/// buffer or the filesystem directly.
pub fn install() {
  let mut signals = match Signals::new([SIGINT, SIGTERM, SIGQUIT, SIGHUP, SIGABRT, SIGSEGV, SIGBUS, SIGILL]) {
    Ok(signals) => signals,
    Err(error) => {
      eprintln!("[logforge] failed to install signal handler: {error}");
      return;
    },
  };

  thread::spawn(move || {
    for sig in signals.forever() {
      let name = signal_name(sig);
      eprintln!("[logforge] caught {name}, requesting dump");
      crate::runtime::request_crash_dump(name);
    }
  });
}
