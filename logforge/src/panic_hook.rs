//! Optional panic-triggered dump. Installs a panic hook that requests an
//! immediate best-effort dump before unwinding continues. Off by default;
//! enabled via `RuntimeConfig::install_panic_hook`.

use std::panic;

/// Install a panic hook that logs the panic location/message to stderr and
/// requests a dump from the active runtime, if any.
///
/// Must not block: a panic hook runs during unwinding, and a hung dump here
/// would turn one crash into a deadlock. The dump itself is rendered and
/// persisted on a dedicated background thread (see
/// `runtime::spawn_crash_dump_writer`); this hook only ever performs a
/// non-blocking `try_send` of the request.
pub fn install() {
  let previous = panic::take_hook();
  panic::set_hook(Box::new(move |info| {
    eprintln!("[logforge] panic: {info}");
    crate::runtime::request_crash_dump("panic");
    previous(info);
  }));
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn install_does_not_panic_itself() {
    install();
  }
}
