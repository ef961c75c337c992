//! Fixed-capacity FIFO retention buffer.
//!
//! `snapshot()` is non-draining: it must return a stable ordered copy
//! without consuming the buffer, so concurrent producers never race a
//! drain-and-refill. A single `parking_lot::Mutex<VecDeque<T>>` gives that
//! for free, at the cost of the wait-freedom a lock-free queue would buy
//! (not needed here -- appends and snapshots are both short critical
//! sections).

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded, thread-safe FIFO. The `N` most-recently appended items are always
/// present, oldest to newest.
pub struct RingBuffer<T> {
  capacity: usize,
  items: Mutex<VecDeque<T>>,
}

impl<T: Clone> RingBuffer<T> {
  pub fn new(capacity: usize) -> Self {
    assert!(capacity > 0, "ring buffer capacity must be greater than 0");
    Self {
      capacity,
      items: Mutex::new(VecDeque::with_capacity(capacity)),
    }
  }

  /// Append an item, evicting the oldest if the buffer is already full.
  pub fn append(&self, item: T) {
    let mut items = self.items.lock();
    if items.len() == self.capacity {
      items.pop_front();
    }
    items.push_back(item);
  }

  /// An ordered, oldest-to-newest copy of the current contents. Concurrent
  /// appends started after this call returns are not reflected in it.
  pub fn snapshot(&self) -> Vec<T> {
    self.items.lock().iter().cloned().collect()
  }

  /// Clear all retained events.
  pub fn flush(&self) {
    self.items.lock().clear();
  }

  pub fn len(&self) -> usize {
    self.items.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fifo_property_holds_after_overflow() {
    let ring: RingBuffer<i32> = RingBuffer::new(3);
    for i in 1..=5 {
      ring.append(i);
    }
    assert_eq!(ring.snapshot(), vec![3, 4, 5]);
    assert_eq!(ring.len(), 3);
  }

  #[test]
  fn snapshot_does_not_drain() {
    let ring: RingBuffer<i32> = RingBuffer::new(3);
    ring.append(1);
    ring.append(2);
    let first = ring.snapshot();
    let second = ring.snapshot();
    assert_eq!(first, second);
    assert_eq!(ring.len(), 2);
  }

  #[test]
  fn flush_clears_buffer() {
    let ring: RingBuffer<i32> = RingBuffer::new(3);
    ring.append(1);
    ring.flush();
    assert!(ring.is_empty());
    assert!(ring.snapshot().is_empty());
  }

  #[test]
  fn concurrent_append_and_snapshot() {
    use std::sync::Arc;
    use std::thread;

    let ring: Arc<RingBuffer<i32>> = Arc::new(RingBuffer::new(1000));
    let mut handles = Vec::new();
    for t in 0..8 {
      let ring = Arc::clone(&ring);
      handles.push(thread::spawn(move || {
        for i in 0..100 {
          ring.append(t * 100 + i);
        }
      }));
    }
    for h in handles {
      h.join().unwrap();
    }
    assert_eq!(ring.len(), 800);
    assert_eq!(ring.snapshot().len(), 800);
  }
}
