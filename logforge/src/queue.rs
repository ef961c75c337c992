//! Bounded work-queue with a single background consumer.
//!
//! A dedicated worker thread pulls events off a bounded `crossbeam_channel`
//! and invokes a late-bound fan-out handler per event. A handler panic is
//! caught, reported through diagnostics, and the worker resumes after a
//! cooldown rather than terminating -- dequeue order must never skip an
//! event and there is only ever one worker.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::diagnostic::{DiagnosticEvent, Diagnostics};
use crate::error::{Error, Result};
use crate::event::LogEvent;

const WORKER_FAILURE_COOLDOWN: Duration = Duration::from_secs(1);

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  Idle = 0,
  Running = 1,
  Draining = 2,
  Stopped = 3,
}

impl State {
  fn from_u8(v: u8) -> State {
    match v {
      0 => State::Idle,
      1 => State::Running,
      2 => State::Draining,
      _ => State::Stopped,
    }
  }
}

enum Message {
  Event(LogEvent),
  Shutdown,
}

/// Fan-out handler invoked once per dequeued event.
pub type FanOutHandler = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Bounded producer/single-consumer queue decoupling `ProcessEvent` from
/// sink I/O, with a transactional `stop`.
pub struct QueueAdapter {
  state: AtomicU8,
  sender: Sender<Message>,
  receiver: Receiver<Message>,
  put_timeout: Duration,
  handler: Mutex<Option<FanOutHandler>>,
  worker: Mutex<Option<JoinHandle<()>>>,
  pending: Arc<AtomicUsize>,
  diagnostics: Diagnostics,
}

impl QueueAdapter {
  pub fn new(maxsize: usize, put_timeout: Duration, diagnostics: Diagnostics) -> Self {
    let (sender, receiver) = crossbeam_channel::bounded(maxsize.max(1));
    Self {
      state: AtomicU8::new(State::Idle as u8),
      sender,
      receiver,
      put_timeout,
      handler: Mutex::new(None),
      worker: Mutex::new(None),
      pending: Arc::new(AtomicUsize::new(0)),
      diagnostics,
    }
  }

  /// Late-bind the fan-out handler invoked by the worker. Must be called
  /// before [`QueueAdapter::start`].
  pub fn set_worker(&self, handler: FanOutHandler) {
    *self.handler.lock() = Some(handler);
  }

  fn state(&self) -> State {
    State::from_u8(self.state.load(Ordering::Acquire))
  }

  /// Idle -> Running: spawns the worker thread.
  pub fn start(&self) {
    if self.state() != State::Idle {
      return;
    }
    let handler = self
      .handler
      .lock()
      .clone()
      .expect("set_worker must be called before start");
    let receiver = self.receiver.clone();
    let pending = Arc::clone(&self.pending);
    let diagnostics = self.diagnostics.clone();

    let join = thread::spawn(move || Self::worker_loop(receiver, handler, pending, diagnostics));
    *self.worker.lock() = Some(join);
    self.state.store(State::Running as u8, Ordering::Release);
  }

  fn worker_loop(
    receiver: Receiver<Message>,
    handler: FanOutHandler,
    pending: Arc<AtomicUsize>,
    diagnostics: Diagnostics,
  ) {
    loop {
      match receiver.recv() {
        Ok(Message::Event(event)) => {
          let event_id = event.event_id.clone();
          let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
          pending.fetch_sub(1, Ordering::AcqRel);
          if let Err(payload) = result {
            let message = panic_message(&payload);
            diagnostics.emit(DiagnosticEvent::WorkerFailed {
              event_id: Some(event_id),
              error: message,
              cooldown_ms: WORKER_FAILURE_COOLDOWN.as_millis() as u64,
            });
            thread::sleep(WORKER_FAILURE_COOLDOWN);
          }
        },
        Ok(Message::Shutdown) => break,
        Err(_) => break,
      }
    }
  }

  /// Place `event` on the queue, blocking up to `put_timeout` when full.
  pub fn enqueue(&self, event: LogEvent) -> Result<()> {
    let event_id = event.event_id.clone();
    match self.sender.try_send(Message::Event(event)) {
      Ok(()) => {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.diagnostics.emit(DiagnosticEvent::Queued { event_id });
        Ok(())
      },
      Err(TrySendError::Full(msg)) => self.enqueue_blocking(msg),
      Err(TrySendError::Disconnected(_)) => Err(Error::QueueFull),
    }
  }

  fn enqueue_blocking(&self, msg: Message) -> Result<()> {
    let deadline = Instant::now() + self.put_timeout;
    let event_id = match &msg {
      Message::Event(event) => event.event_id.clone(),
      Message::Shutdown => String::new(),
    };
    loop {
      if Instant::now() >= deadline {
        self.diagnostics.emit(DiagnosticEvent::Dropped {
          event_id,
          reason: "queue_full".into(),
        });
        return Err(Error::QueueFull);
      }
      match self.sender.send_timeout(msg, deadline.saturating_duration_since(Instant::now())) {
        Ok(()) => {
          self.pending.fetch_add(1, Ordering::AcqRel);
          self.diagnostics.emit(DiagnosticEvent::Queued { event_id });
          return Ok(());
        },
        Err(_) => {
          self.diagnostics.emit(DiagnosticEvent::Dropped {
            event_id,
            reason: "queue_full".into(),
          });
          return Err(Error::QueueFull);
        },
      }
    }
  }

  /// Transactional shutdown: Running -> Draining -> Stopped. Waits up to
  /// `timeout` for the queue to drain and the worker to join.
  pub fn stop(&self, timeout: Duration) -> Result<()> {
    if self.state() == State::Stopped {
      return Ok(());
    }
    if self.state() == State::Draining {
      // A previous call already gave up on draining and consumed the worker
      // handle; retrying must not silently report success.
      let remaining = self.pending.load(Ordering::Acquire);
      return Err(Error::ShutdownTimeout { remaining });
    }
    self.state.store(State::Draining as u8, Ordering::Release);

    let deadline = Instant::now() + timeout;
    let _ = self.sender.send(Message::Shutdown);

    if let Some(handle) = self.worker.lock().take() {
      while Instant::now() < deadline && !handle.is_finished() {
        thread::sleep(Duration::from_millis(10));
      }
      if !handle.is_finished() {
        let remaining = self.pending.load(Ordering::Acquire);
        self.diagnostics.emit(DiagnosticEvent::QueueShutdownTimeout { remaining });
        // The handle is intentionally leaked from our bookkeeping: we cannot
        // safely join a thread that may be blocked in a misbehaving sink, and
        // the state must reflect "not drained" rather than block forever.
        return Err(Error::ShutdownTimeout { remaining });
      }
      let _ = handle.join();
    }

    self.state.store(State::Stopped as u8, Ordering::Release);
    Ok(())
  }

  pub fn pending(&self) -> usize {
    self.pending.load(Ordering::Acquire)
  }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "worker handler panicked".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::LogContext;
  use crate::level::LogLevel;
  use serde_json::Map;
  use std::sync::atomic::AtomicUsize as AU;
  use std::sync::Mutex as StdMutex;

  fn ctx() -> LogContext {
    LogContext {
      service: "svc".into(),
      environment: "dev".into(),
      job_id: "job-1".into(),
      request_id: None,
      user_id: None,
      user_name: None,
      hostname: None,
      trace_id: None,
      span_id: None,
      process_id: 1,
      process_id_chain: vec![1],
      extra: Map::new(),
    }
  }

  #[test]
  fn drains_all_enqueued_events_in_order() {
    let received: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
    let received_clone = Arc::clone(&received);

    let queue = QueueAdapter::new(1024, Duration::from_millis(200), Diagnostics::new(None));
    queue.set_worker(Arc::new(move |event: &LogEvent| {
      received_clone.lock().unwrap().push(event.event_id.clone());
    }));
    queue.start();

    let mut ids = Vec::new();
    for i in 0..50 {
      let event = LogEvent::new("a", LogLevel::Info, format!("msg-{i}"), ctx(), Map::new());
      ids.push(event.event_id.clone());
      queue.enqueue(event).unwrap();
    }

    queue.stop(Duration::from_secs(5)).unwrap();
    assert_eq!(*received.lock().unwrap(), ids);
  }

  #[test]
  fn panicking_handler_does_not_kill_worker() {
    let count = Arc::new(AU::new(0));
    let count_clone = Arc::clone(&count);

    let queue = QueueAdapter::new(16, Duration::from_millis(200), Diagnostics::new(None));
    queue.set_worker(Arc::new(move |event: &LogEvent| {
      if event.message == "boom" {
        panic!("boom");
      }
      count_clone.fetch_add(1, Ordering::SeqCst);
    }));
    queue.start();

    queue
      .enqueue(LogEvent::new("a", LogLevel::Info, "boom", ctx(), Map::new()))
      .unwrap();
    queue
      .enqueue(LogEvent::new("a", LogLevel::Info, "after", ctx(), Map::new()))
      .unwrap();

    queue.stop(Duration::from_secs(5)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn stop_times_out_when_handler_blocks_forever() {
    let queue = QueueAdapter::new(16, Duration::from_millis(200), Diagnostics::new(None));
    queue.set_worker(Arc::new(|_event: &LogEvent| {
      thread::sleep(Duration::from_secs(10));
    }));
    queue.start();

    queue
      .enqueue(LogEvent::new("a", LogLevel::Info, "stuck", ctx(), Map::new()))
      .unwrap();

    let err = queue.stop(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, Error::ShutdownTimeout { .. }));
  }

  #[test]
  fn retried_stop_after_timeout_does_not_silently_succeed() {
    let queue = QueueAdapter::new(16, Duration::from_millis(200), Diagnostics::new(None));
    queue.set_worker(Arc::new(|_event: &LogEvent| {
      thread::sleep(Duration::from_secs(10));
    }));
    queue.start();

    queue
      .enqueue(LogEvent::new("a", LogLevel::Info, "stuck", ctx(), Map::new()))
      .unwrap();

    let first = queue.stop(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(first, Error::ShutdownTimeout { .. }));

    // The worker handle was already consumed by the first attempt; a retry
    // must re-report the timeout rather than falling through to `Ok(())`.
    let second = queue.stop(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(second, Error::ShutdownTimeout { .. }));
  }
}
