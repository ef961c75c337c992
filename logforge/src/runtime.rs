//! Runtime composition & façade: builds the component graph from a
//! `RuntimeConfig`, publishes it behind a single atomically-swapped global
//! handle, and exposes `init`/`bind`/`get`/`dump`/`shutdown`.

use arc_swap::ArcSwapOption;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::buffer::RingBuffer;
use crate::context::{ContextBinder, ContextFields, ContextScope};
use crate::diagnostic::{DiagnosticEvent, DiagnosticHook, Diagnostics};
use crate::dump::{self, DumpOptions};
use crate::error::{Error, Result};
use crate::event::LogEvent;
use crate::level::{DumpFormat, LogLevel};
use crate::logger_proxy::LoggerProxy;
use crate::process_event::{fan_out, ProcessEvent};
use crate::queue::QueueAdapter;
use crate::rate_limit::RateLimiter;
use crate::scrub::Scrubber;
use crate::sink::console::ConsoleSink;
use crate::sink::graylog::{GelfTransport, GraylogSink, TcpTransport};
use crate::sink::structured::{KeyConvention, StructuredSink};
use crate::sink::tracing_bridge::TracingBridgeSink;
use crate::sink::Sink;

/// GELF transport selection for the Graylog sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraylogProtocol {
  Tcp,
  Udp,
}

/// Graylog transport endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraylogEndpoint {
  pub host: String,
  pub port: u16,
  pub protocol: GraylogProtocol,
  pub tls: bool,
}

/// Fully-resolved runtime configuration. Built by the caller (or an
/// external config loader, out of scope here) and handed to [`init`].
#[derive(Clone)]
pub struct RuntimeConfig {
  pub service: String,
  pub environment: String,
  pub console_level: Option<LogLevel>,
  pub backend_level: Option<LogLevel>,
  pub graylog_level: Option<LogLevel>,
  pub enable_ring_buffer: bool,
  pub ring_buffer_size: usize,
  pub enable_journald: bool,
  pub enable_eventlog: bool,
  pub enable_graylog: bool,
  pub graylog_endpoint: Option<GraylogEndpoint>,
  pub enable_tracing_bridge: bool,
  pub tracing_bridge_level: Option<LogLevel>,
  pub queue_enabled: bool,
  pub queue_maxsize: usize,
  pub queue_put_timeout: Duration,
  pub queue_stop_timeout: Duration,
  pub force_color: bool,
  pub no_color: bool,
  pub dump_format_preset: DumpFormat,
  pub dump_format_template: Option<String>,
  pub scrub_patterns: Vec<(String, String)>,
  pub rate_limit: Option<(usize, Duration)>,
  pub max_message_bytes: usize,
  pub max_extra_bytes: usize,
  pub diagnostic_hook: Option<DiagnosticHook>,
  pub install_panic_hook: bool,
  pub install_signal_hook: bool,
  /// Destination file for the best-effort dump a panic or fatal signal
  /// requests. `None` still renders the dump (observable through
  /// `diagnostic_hook`) but does not persist it.
  pub crash_dump_path: Option<String>,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      service: String::new(),
      environment: String::new(),
      console_level: Some(LogLevel::Info),
      backend_level: None,
      graylog_level: None,
      enable_ring_buffer: true,
      ring_buffer_size: 25_000,
      enable_journald: false,
      enable_eventlog: false,
      enable_graylog: false,
      graylog_endpoint: None,
      enable_tracing_bridge: false,
      tracing_bridge_level: None,
      queue_enabled: false,
      queue_maxsize: 10_000,
      queue_put_timeout: Duration::from_secs(1),
      queue_stop_timeout: Duration::from_secs(5),
      force_color: false,
      no_color: false,
      dump_format_preset: DumpFormat::Text,
      dump_format_template: None,
      scrub_patterns: vec![("password|secret|token".to_string(), ".*".to_string())],
      rate_limit: None,
      max_message_bytes: 32 * 1024,
      max_extra_bytes: 64 * 1024,
      diagnostic_hook: None,
      install_panic_hook: false,
      install_signal_hook: false,
      crash_dump_path: None,
    }
  }
}

impl RuntimeConfig {
  pub fn new(service: impl Into<String>, environment: impl Into<String>) -> Self {
    Self {
      service: service.into(),
      environment: environment.into(),
      ..Default::default()
    }
  }

  pub fn console_level(mut self, level: LogLevel) -> Self {
    self.console_level = Some(level);
    self
  }

  pub fn queue_enabled(mut self, enabled: bool) -> Self {
    self.queue_enabled = enabled;
    self
  }

  pub fn rate_limit(mut self, max_events: usize, window: Duration) -> Self {
    self.rate_limit = Some((max_events, window));
    self
  }

  pub fn diagnostic_hook(mut self, hook: DiagnosticHook) -> Self {
    self.diagnostic_hook = Some(hook);
    self
  }

  pub fn graylog(mut self, endpoint: GraylogEndpoint) -> Self {
    self.enable_graylog = true;
    self.graylog_endpoint = Some(endpoint);
    self
  }

  /// Persist the panic/signal-triggered dump to `path` instead of only
  /// rendering it. Only takes effect alongside `install_panic_hook` and/or
  /// `install_signal_hook`.
  pub fn crash_dump_path(mut self, path: impl Into<String>) -> Self {
    self.crash_dump_path = Some(path.into());
    self
  }

  /// Forward events through the ambient `tracing` subscriber instead of (or
  /// alongside) this crate's own sinks.
  pub fn tracing_bridge(mut self, level: LogLevel) -> Self {
    self.enable_tracing_bridge = true;
    self.tracing_bridge_level = Some(level);
    self
  }

  fn validate(&self) -> Result<()> {
    if self.service.trim().is_empty() || self.environment.trim().is_empty() {
      return Err(Error::ConfigError("service and environment are required".into()));
    }
    if self.enable_graylog {
      let endpoint = self
        .graylog_endpoint
        .as_ref()
        .ok_or_else(|| Error::ConfigError("graylog enabled without an endpoint".into()))?;
      if endpoint.protocol == GraylogProtocol::Udp && endpoint.tls {
        return Err(Error::ConfigError("udp transport does not support tls".into()));
      }
    }
    Ok(())
  }
}

struct UdpTransport {
  socket: UdpSocket,
  target: String,
}

impl GelfTransport for UdpTransport {
  fn send(&mut self, payload: &[u8]) -> std::result::Result<(), String> {
    self
      .socket
      .send_to(payload, &self.target)
      .map(|_| ())
      .map_err(|e| e.to_string())
  }
}

/// The live, composed runtime. One instance exists per process while
/// initialized.
pub struct Runtime {
  context_binder: ContextBinder,
  ring_buffer: Arc<RingBuffer<LogEvent>>,
  process_event: Arc<ProcessEvent>,
  queue: Option<Arc<QueueAdapter>>,
  sinks: Arc<Vec<Box<dyn Sink>>>,
  diagnostics: Diagnostics,
  dump_format_preset: DumpFormat,
  dump_format_template: Option<String>,
  queue_stop_timeout: Duration,
  crash_dump_tx: Option<Sender<&'static str>>,
}

static RUNTIME: ArcSwapOption<Runtime> = ArcSwapOption::const_empty();

fn build_sinks(config: &RuntimeConfig, diagnostics: &Diagnostics) -> Vec<Box<dyn Sink>> {
  let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

  if let Some(level) = config.console_level {
    let color = config.force_color || !config.no_color;
    sinks.push(Box::new(ConsoleSink::new(level).with_color(color)));
  }

  if config.enable_journald {
    if cfg!(target_os = "linux") {
      let level = config.backend_level.unwrap_or(LogLevel::Info);
      sinks.push(Box::new(StructuredSink::new(level, KeyConvention::UpperAscii, std::io::stdout())));
    } else {
      diagnostics.emit(DiagnosticEvent::SinkUnavailable {
        sink: "journald".into(),
        reason: "unsupported on this platform".into(),
      });
    }
  }

  if config.enable_eventlog {
    if cfg!(target_os = "windows") {
      let level = config.backend_level.unwrap_or(LogLevel::Info);
      sinks.push(Box::new(StructuredSink::new(level, KeyConvention::CamelCase, std::io::stdout())));
    } else {
      diagnostics.emit(DiagnosticEvent::SinkUnavailable {
        sink: "eventlog".into(),
        reason: "unsupported on this platform".into(),
      });
    }
  }

  if config.enable_graylog {
    if let Some(endpoint) = &config.graylog_endpoint {
      let threshold = config.graylog_level.unwrap_or(LogLevel::Warning);
      let host = endpoint.host.clone();
      match endpoint.protocol {
        GraylogProtocol::Tcp => {
          let addr = format!("{}:{}", endpoint.host, endpoint.port);
          sinks.push(Box::new(GraylogSink::new(host, TcpTransport::new(addr)).with_threshold(threshold)));
        },
        GraylogProtocol::Udp => {
          if let Ok(socket) = UdpSocket::bind("0.0.0.0:0") {
            let transport = UdpTransport {
              socket,
              target: format!("{}:{}", endpoint.host, endpoint.port),
            };
            sinks.push(Box::new(GraylogSink::new(host, transport).with_threshold(threshold)));
          } else {
            diagnostics.emit(DiagnosticEvent::SinkUnavailable {
              sink: "graylog".into(),
              reason: "failed to bind udp socket".into(),
            });
          }
        },
      }
    }
  }

  if config.enable_tracing_bridge {
    let level = config.tracing_bridge_level.unwrap_or(LogLevel::Info);
    sinks.push(Box::new(TracingBridgeSink::new(level)));
  }

  sinks
}

/// Spawn the background thread that actually renders and persists a
/// panic/signal-requested dump. The panic hook and signal handler only
/// ever `try_send` a reason onto the returned channel: they never touch
/// the ring buffer or the filesystem themselves, so a crash can't wedge on
/// I/O or a lock held by the very thread that's unwinding.
fn spawn_crash_dump_writer(
  ring_buffer: Arc<RingBuffer<LogEvent>>,
  dump_format_preset: DumpFormat,
  dump_format_template: Option<String>,
  crash_dump_path: Option<String>,
) -> Sender<&'static str> {
  let (tx, rx) = crossbeam_channel::bounded::<&'static str>(8);
  thread::spawn(move || {
    for reason in rx.iter() {
      let options = DumpOptions {
        format: dump_format_preset,
        min_level: None,
        template: dump_format_template.clone(),
        color: false,
        path: crash_dump_path.clone(),
        flush_after: false,
      };
      match dump::capture(&ring_buffer, &options) {
        Ok(rendered) => eprintln!("[logforge] {reason} dump ({} bytes) captured", rendered.len()),
        Err(error) => eprintln!("[logforge] {reason} dump failed: {error}"),
      }
    }
  });
  tx
}

/// Request the best-effort crash dump asynchronously. Non-blocking: a full
/// or absent channel simply drops the request rather than waiting.
pub(crate) fn request_crash_dump(reason: &'static str) {
  if let Ok(runtime) = current() {
    if let Some(tx) = &runtime.crash_dump_tx {
      let _ = tx.try_send(reason);
    }
  }
}

/// Construct the component graph exactly once per process. Fails with
/// [`Error::AlreadyInitialized`] if a runtime is already live.
pub fn init(config: RuntimeConfig) -> Result<()> {
  config.validate()?;

  if RUNTIME.load().is_some() {
    return Err(Error::AlreadyInitialized);
  }

  let diagnostics = Diagnostics::new(config.diagnostic_hook.clone());
  let scrubber = Arc::new(
    Scrubber::new(&config.scrub_patterns).map_err(|e| Error::ConfigError(e.to_string()))?,
  );
  let rate_limiter = Arc::new(match config.rate_limit {
    Some((max_events, window)) => RateLimiter::new(max_events, window),
    None => RateLimiter::new(usize::MAX, Duration::from_secs(1)),
  });
  let ring_buffer = Arc::new(RingBuffer::new(if config.enable_ring_buffer {
    config.ring_buffer_size.max(1)
  } else {
    1
  }));

  let sinks = Arc::new(build_sinks(&config, &diagnostics));

  let queue = if config.queue_enabled {
    let queue = Arc::new(QueueAdapter::new(
      config.queue_maxsize,
      config.queue_put_timeout,
      diagnostics.clone(),
    ));
    let sinks_for_worker = Arc::clone(&sinks);
    let diagnostics_for_worker = diagnostics.clone();
    queue.set_worker(Arc::new(move |event: &LogEvent| {
      fan_out(&sinks_for_worker, event, &diagnostics_for_worker);
    }));
    queue.start();
    Some(queue)
  } else {
    None
  };

  let process_event = Arc::new(ProcessEvent {
    scrubber,
    rate_limiter,
    ring_buffer: Arc::clone(&ring_buffer),
    queue: queue.clone(),
    sinks: Arc::clone(&sinks),
    payload_limits: crate::process_event::PayloadLimits {
      max_message_bytes: config.max_message_bytes,
      max_extra_bytes: config.max_extra_bytes,
    },
    diagnostics: diagnostics.clone(),
  });

  let crash_dump_tx = if config.install_panic_hook || config.install_signal_hook {
    Some(spawn_crash_dump_writer(
      Arc::clone(&ring_buffer),
      config.dump_format_preset,
      config.dump_format_template.clone(),
      config.crash_dump_path.clone(),
    ))
  } else {
    None
  };

  let runtime = Runtime {
    context_binder: ContextBinder::new(),
    ring_buffer,
    process_event,
    queue,
    sinks,
    diagnostics,
    dump_format_preset: config.dump_format_preset,
    dump_format_template: config.dump_format_template.clone(),
    queue_stop_timeout: config.queue_stop_timeout,
    crash_dump_tx,
  };

  RUNTIME.store(Some(Arc::new(runtime)));

  if config.install_panic_hook {
    crate::panic_hook::install();
  }
  #[cfg(unix)]
  if config.install_signal_hook {
    crate::signal_hook::install();
  }

  Ok(())
}

fn current() -> Result<Arc<Runtime>> {
  RUNTIME.load_full().ok_or(Error::NotInitialized)
}

/// Bind ambient context fields on the current task; see [`ContextBinder::bind`].
pub fn bind(fields: ContextFields) -> Result<ContextScope> {
  let runtime = current()?;
  runtime.context_binder.bind(fields)
}

/// Obtain a logger bound to `name`. The returned proxy holds only a weak
/// back reference: it does not keep the runtime alive, and dispatch fails
/// with [`Error::NotInitialized`] once `shutdown()` has dropped it.
pub fn get(name: impl Into<String>) -> Result<LoggerProxy> {
  let runtime = current()?;
  Ok(LoggerProxy::new(name.into(), Arc::downgrade(&runtime)))
}

/// Render the ring buffer snapshot using the runtime's configured defaults,
/// overridden by any `Some` field in `overrides`.
pub fn dump(overrides: DumpOverrides) -> Result<String> {
  let runtime = current()?;
  let options = DumpOptions {
    format: overrides.format.unwrap_or(runtime.dump_format_preset),
    min_level: overrides.min_level,
    template: overrides.template.or_else(|| runtime.dump_format_template.clone()),
    color: overrides.color.unwrap_or(false),
    path: overrides.path,
    flush_after: overrides.flush_after,
  };
  dump::capture(&runtime.ring_buffer, &options)
}

/// Optional overrides accepted by [`dump`]; `None` defers to `RuntimeConfig`.
#[derive(Debug, Clone, Default)]
pub struct DumpOverrides {
  pub format: Option<DumpFormat>,
  pub min_level: Option<LogLevel>,
  pub template: Option<String>,
  pub color: Option<bool>,
  pub path: Option<String>,
  pub flush_after: bool,
}

/// The lowest severity threshold among currently active sinks, useful for
/// gating expensive argument construction before a logger call.
pub fn get_minimum_log_level() -> Result<LogLevel> {
  let runtime = current()?;
  runtime
    .sinks
    .iter()
    .map(|sink| sink.threshold())
    .min()
    .ok_or(Error::NotInitialized)
}

/// Drain the queue, flush sinks, and clear the runtime singleton. Idempotent
/// after the first successful call; on failure the singleton is retained.
pub fn shutdown() -> Result<()> {
  let runtime = match RUNTIME.load_full() {
    Some(runtime) => runtime,
    None => return Ok(()),
  };

  if let Some(queue) = &runtime.queue {
    queue.stop(runtime.queue_stop_timeout)?;
  }

  for sink in runtime.sinks.iter() {
    if let Err(error) = sink.flush() {
      runtime.diagnostics.emit(DiagnosticEvent::SinkFailed {
        sink: sink.name().to_string(),
        error,
      });
    }
    sink.close();
  }

  RUNTIME.store(None);
  Ok(())
}

pub(crate) fn dispatch(
  runtime: &Runtime,
  logger_name: &str,
  level: LogLevel,
  message: String,
  extra: Option<Map<String, serde_json::Value>>,
) -> Result<crate::process_event::EventStatus> {
  let context = runtime.context_binder.current().ok_or(Error::ContextMissing)?;
  Ok(runtime.process_event.process(logger_name, level, message, extra, context))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex as StdMutex;

  // `RUNTIME` is a single process-wide global; serialize every test that
  // touches it so they can't observe each other's init/shutdown.
  static TEST_LOCK: StdMutex<()> = StdMutex::new(());

  fn teardown() {
    let _ = shutdown();
    RUNTIME.store(None);
  }

  #[test]
  fn init_requires_service_and_environment() {
    let _guard = TEST_LOCK.lock().unwrap();
    teardown();
    let err = init(RuntimeConfig::default()).unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
    teardown();
  }

  #[test]
  fn double_init_fails() {
    let _guard = TEST_LOCK.lock().unwrap();
    teardown();
    init(RuntimeConfig::new("svc", "dev")).unwrap();
    let err = init(RuntimeConfig::new("svc", "dev")).unwrap_err();
    assert!(matches!(err, Error::AlreadyInitialized));
    teardown();
  }

  #[test]
  fn baseline_scenario_delivers_one_event_and_dumps_json() {
    let _guard = TEST_LOCK.lock().unwrap();
    teardown();
    init(RuntimeConfig::new("svc", "dev").queue_enabled(false)).unwrap();
    let _scope = bind(ContextFields::new().job_id("j1")).unwrap();

    let logger = get("a").unwrap();
    let mut extra = Map::new();
    extra.insert("k".into(), serde_json::json!(1));
    logger.info("hello", Some(extra)).unwrap();

    let rendered = dump(DumpOverrides {
      format: Some(DumpFormat::Json),
      ..Default::default()
    })
    .unwrap();
    assert!(rendered.contains("\"message\": \"hello\""));
    assert!(rendered.contains("\"job_id\": \"j1\""));
    teardown();
  }

  #[test]
  fn graylog_udp_with_tls_is_a_config_error() {
    let _guard = TEST_LOCK.lock().unwrap();
    teardown();
    let config = RuntimeConfig::new("svc", "dev").graylog(GraylogEndpoint {
      host: "localhost".into(),
      port: 12201,
      protocol: GraylogProtocol::Udp,
      tls: true,
    });
    let err = init(config).unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
  }

  #[test]
  fn tracing_bridge_sink_does_not_error_the_call_path() {
    let _guard = TEST_LOCK.lock().unwrap();
    teardown();
    init(
      RuntimeConfig::new("svc", "dev")
        .queue_enabled(false)
        .tracing_bridge(LogLevel::Debug),
    )
    .unwrap();
    let _scope = bind(ContextFields::new().job_id("j1")).unwrap();
    let logger = get("a").unwrap();
    let status = logger.info("hello", None).unwrap();
    assert!(matches!(status, crate::process_event::EventStatus::Ok { .. }));
    teardown();
  }

  #[test]
  fn shutdown_is_idempotent() {
    let _guard = TEST_LOCK.lock().unwrap();
    teardown();
    init(RuntimeConfig::new("svc", "dev")).unwrap();
    shutdown().unwrap();
    shutdown().unwrap();
  }

  #[test]
  fn proxy_obtained_before_shutdown_stops_dispatching_after() {
    let _guard = TEST_LOCK.lock().unwrap();
    teardown();
    init(RuntimeConfig::new("svc", "dev").queue_enabled(false)).unwrap();
    let _scope = bind(ContextFields::new().job_id("j1")).unwrap();

    let logger = get("a").unwrap();
    assert!(logger.info("before shutdown", None).is_ok());

    shutdown().unwrap();

    let err = logger.info("after shutdown", None).unwrap_err();
    assert!(matches!(err, Error::NotInitialized));
  }

  #[test]
  fn crash_dump_request_persists_to_configured_path() {
    let _guard = TEST_LOCK.lock().unwrap();
    teardown();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crash.txt");
    // `install_signal_hook` is only used here to get `init` to spawn the
    // crash-dump writer thread; the real OS signal listener is harmless in
    // a test process and request_crash_dump below is the exact call the
    // panic hook makes, so this exercises the same non-blocking path.
    let config = RuntimeConfig::new("svc", "dev")
      .queue_enabled(false)
      .crash_dump_path(path.to_string_lossy().to_string());
    let config = RuntimeConfig {
      install_signal_hook: cfg!(unix),
      install_panic_hook: !cfg!(unix),
      ..config
    };
    init(config).unwrap();

    let _scope = bind(ContextFields::new().job_id("j1")).unwrap();
    get("a").unwrap().info("before crash", None).unwrap();

    request_crash_dump("test");
    for _ in 0..50 {
      if path.exists() {
        break;
      }
      thread::sleep(Duration::from_millis(20));
    }
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("before crash"));
    teardown();
  }

  #[test]
  fn diagnostic_hook_observes_rate_limited_events() {
    let _guard = TEST_LOCK.lock().unwrap();
    teardown();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = Arc::clone(&seen);
    let config = RuntimeConfig::new("svc", "dev")
      .rate_limit(1, Duration::from_secs(60))
      .diagnostic_hook(Arc::new(move |event: &DiagnosticEvent| {
        if matches!(event, DiagnosticEvent::RateLimited { .. }) {
          seen_clone.fetch_add(1, Ordering::SeqCst);
        }
      }));
    init(config).unwrap();
    let _scope = bind(ContextFields::new().job_id("j1")).unwrap();
    let logger = get("a").unwrap();
    logger.info("one", None).unwrap();
    logger.info("two", None).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    teardown();
  }
}
