//! Log and counter side channel for the click engine
//!
//! The engine runs on the input dispatch thread, so everything it reports goes
//! through a bounded crossbeam channel with `try_send`. A full queue drops the
//! line instead of stalling the pointer.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
pub use crossbeam_channel::RecvTimeoutError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default number of queued lines before new ones are dropped
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// What kind of decision a log line reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Allowed,
    Blocked,
    Adaptive,
    Info,
}

impl LogCategory {
    pub fn label(&self) -> &'static str {
        match self {
            LogCategory::Allowed => "ALLOWED",
            LogCategory::Blocked => "BLOCKED",
            LogCategory::Adaptive => "ADAPTIVE",
            LogCategory::Info => "INFO",
        }
    }
}

/// A single human-readable engine event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub category: LogCategory,
    pub message: String,
}

impl LogLine {
    pub fn new(category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category.label(), self.message)
    }
}

/// Producer half of the log queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LogSink {
    sender: Sender<LogLine>,
    dropped: Arc<AtomicU64>,
}

/// Consumer half of the log queue
#[derive(Debug)]
pub struct LogReceiver {
    receiver: Receiver<LogLine>,
}

impl LogSink {
    /// Create a queue holding at most `capacity` undelivered lines
    pub fn bounded(capacity: usize) -> (Self, LogReceiver) {
        let (sender, receiver) = bounded(capacity.max(1));
        let sink = Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, LogReceiver { receiver })
    }

    /// Queue a line without blocking. Returns false if it was dropped.
    #[inline]
    pub fn offer(&self, line: LogLine) -> bool {
        match self.sender.try_send(line) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn allowed(&self, message: impl Into<String>) -> bool {
        self.offer(LogLine::new(LogCategory::Allowed, message))
    }

    pub fn blocked(&self, message: impl Into<String>) -> bool {
        self.offer(LogLine::new(LogCategory::Blocked, message))
    }

    pub fn adaptive(&self, message: impl Into<String>) -> bool {
        self.offer(LogLine::new(LogCategory::Adaptive, message))
    }

    pub fn info(&self, message: impl Into<String>) -> bool {
        self.offer(LogLine::new(LogCategory::Info, message))
    }

    /// Lines lost to a full or closed queue
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl LogReceiver {
    /// Wait up to `timeout` for the next line. `Disconnected` once every sink
    /// has been dropped and the queue is empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<LogLine, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take everything currently queued, in emission order
    pub fn drain(&self) -> Vec<LogLine> {
        self.receiver.try_iter().collect()
    }
}

/// Shared count of suppressed events
#[derive(Debug, Clone, Default)]
pub struct BlockedCounter(Arc<AtomicU64>);

impl BlockedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Bump the count and return the new total
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_arrive_in_order() {
        let (sink, rx) = LogSink::bounded(8);
        sink.allowed("Left button press");
        sink.blocked("Left bounce");
        sink.adaptive("Left delay reduced");

        let lines = rx.drain();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].category, LogCategory::Allowed);
        assert_eq!(lines[1].category, LogCategory::Blocked);
        assert_eq!(lines[2].category, LogCategory::Adaptive);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (sink, rx) = LogSink::bounded(2);
        assert!(sink.info("one"));
        assert!(sink.info("two"));
        assert!(!sink.info("three"));
        assert_eq!(sink.dropped(), 1);

        let lines = rx.drain();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].message, "two");
    }

    #[test]
    fn test_offer_after_receiver_dropped() {
        let (sink, rx) = LogSink::bounded(4);
        drop(rx);
        assert!(!sink.info("nobody listening"));
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn test_display_prefix() {
        let line = LogLine::new(LogCategory::Blocked, "Right spurious up");
        assert_eq!(line.to_string(), "[BLOCKED] Right spurious up");
    }

    #[test]
    fn test_receiver_disconnects_after_sinks_dropped() {
        let (sink, rx) = LogSink::bounded(4);
        let short = Duration::from_millis(10);
        assert_eq!(rx.recv_timeout(short), Err(RecvTimeoutError::Timeout));

        sink.info("last words");
        drop(sink);
        // Queued lines are still delivered before the disconnect
        assert_eq!(rx.recv_timeout(short).unwrap().message, "last words");
        assert_eq!(rx.recv_timeout(short), Err(RecvTimeoutError::Disconnected));
    }

    #[test]
    fn test_blocked_counter() {
        let counter = BlockedCounter::new();
        let shared = counter.clone();
        assert_eq!(counter.increment(), 1);
        assert_eq!(shared.increment(), 2);
        assert_eq!(counter.get(), 2);
        shared.reset();
        assert_eq!(counter.get(), 0);
    }
}
