//! Orchestrates scrub -> rate-limit -> ring-buffer -> queue/sync fan-out,
//! the single code path shared by every logger call and by the queue
//! worker's dequeue handler.

use serde_json::Map;
use std::sync::Arc;

use crate::buffer::RingBuffer;
use crate::context::LogContext;
use crate::diagnostic::{DiagnosticEvent, Diagnostics};
use crate::event::LogEvent;
use crate::level::LogLevel;
use crate::queue::QueueAdapter;
use crate::rate_limit::RateLimiter;
use crate::scrub::Scrubber;
use crate::sink::Sink;

/// Caller-facing outcome of a single logger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStatus {
  Ok { event_id: String },
  Queued { event_id: String },
  RateLimited,
  Dropped { reason: String },
}

/// Payload size limits applied before scrubbing (message bytes, `extra` bytes).
#[derive(Debug, Clone, Copy)]
pub struct PayloadLimits {
  pub max_message_bytes: usize,
  pub max_extra_bytes: usize,
}

impl Default for PayloadLimits {
  fn default() -> Self {
    Self {
      max_message_bytes: 32 * 1024,
      max_extra_bytes: 64 * 1024,
    }
  }
}

fn truncate_message(message: String, limit: usize) -> (String, usize) {
  if message.len() <= limit {
    return (message, 0);
  }
  let mut cut = limit;
  while cut > 0 && !message.is_char_boundary(cut) {
    cut -= 1;
  }
  let dropped = message.len() - cut;
  (message[..cut].to_string(), dropped)
}

fn truncate_extra(extra: Map<String, serde_json::Value>, limit: usize) -> (Map<String, serde_json::Value>, usize) {
  let encoded = serde_json::to_vec(&extra).unwrap_or_default();
  if encoded.len() <= limit {
    return (extra, 0);
  }
  // Drop entries (stable key order) until the serialized size fits.
  let mut keys: Vec<String> = extra.keys().cloned().collect();
  keys.sort();
  let mut reduced = extra;
  let mut dropped_bytes = 0usize;
  while serde_json::to_vec(&reduced).map(|v| v.len()).unwrap_or(0) > limit {
    match keys.pop() {
      Some(key) => {
        if let Some(v) = reduced.remove(&key) {
          dropped_bytes += serde_json::to_vec(&v).map(|e| e.len()).unwrap_or(0);
        }
      },
      None => break,
    }
  }
  (reduced, dropped_bytes)
}

/// Dependencies a single `process` call fans out through. Owned exclusively
/// by the runtime; `ProcessEvent` borrows them for the duration of a call.
pub struct ProcessEvent {
  pub scrubber: Arc<Scrubber>,
  pub rate_limiter: Arc<RateLimiter>,
  pub ring_buffer: Arc<RingBuffer<LogEvent>>,
  pub queue: Option<Arc<QueueAdapter>>,
  pub sinks: Arc<Vec<Box<dyn Sink>>>,
  pub payload_limits: PayloadLimits,
  pub diagnostics: Diagnostics,
}

impl ProcessEvent {
  #[allow(clippy::too_many_arguments)]
  pub fn process(
    &self,
    logger_name: &str,
    level: LogLevel,
    message: impl Into<String>,
    extra: Option<Map<String, serde_json::Value>>,
    context: LogContext,
  ) -> EventStatus {
    let message = message.into();
    let extra = extra.unwrap_or_default();

    let (message, message_dropped) = truncate_message(message, self.payload_limits.max_message_bytes);
    let (extra, extra_dropped) = truncate_extra(extra, self.payload_limits.max_extra_bytes);

    let mut context = context;
    let scrubbed_extra = self.scrubber.scrub(&extra);
    context.extra = self.scrubber.scrub(&context.extra);

    let event = LogEvent::new(logger_name, level, message, context, scrubbed_extra);

    if message_dropped > 0 || extra_dropped > 0 {
      self.diagnostics.emit(DiagnosticEvent::PayloadTruncated {
        event_id: event.event_id.clone(),
        message_bytes_dropped: message_dropped,
        extra_bytes_dropped: extra_dropped,
      });
    }

    if !self.rate_limiter.admit(logger_name, level) {
      self.diagnostics.emit(DiagnosticEvent::RateLimited {
        logger_name: logger_name.to_string(),
      });
      return EventStatus::RateLimited;
    }

    self.ring_buffer.append(event.clone());

    match &self.queue {
      Some(queue) => match queue.enqueue(event.clone()) {
        Ok(()) => EventStatus::Queued { event_id: event.event_id },
        Err(_) => {
          self.diagnostics.emit(DiagnosticEvent::Dropped {
            event_id: event.event_id.clone(),
            reason: "queue_full".into(),
          });
          EventStatus::Dropped { reason: "queue_full".into() }
        },
      },
      None => {
        fan_out(&self.sinks, &event, &self.diagnostics);
        EventStatus::Ok { event_id: event.event_id }
      },
    }
  }
}

/// Deliver `event` to every sink whose threshold it clears, isolating each
/// sink's failure from its siblings. Shared by synchronous fan-out and the
/// queue worker.
pub fn fan_out(sinks: &[Box<dyn Sink>], event: &LogEvent, diagnostics: &Diagnostics) {
  for sink in sinks {
    if event.level < sink.threshold() {
      continue;
    }
    match sink.emit(event) {
      Ok(()) => {
        diagnostics.emit(DiagnosticEvent::Emitted {
          event_id: event.event_id.clone(),
          sink: sink.name().to_string(),
        });
      },
      Err(error) => {
        diagnostics.emit(DiagnosticEvent::SinkFailed {
          sink: sink.name().to_string(),
          error,
        });
      },
    }
  }
}
