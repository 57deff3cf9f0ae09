//! clickguard - pointer button debouncer
//!
//! Filters spurious duplicate button events produced by worn or faulty mice
//! before they reach the rest of the system, while letting fast clicks, long
//! holds and drags through.

pub mod adaptive;
pub mod button;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod sink;
pub mod source;

pub use adaptive::{AdaptiveController, MIN_EFFECTIVE_DELAY, RatioWindow};
pub use button::{Button, EventKind, PointerEvent, Verdict};
pub use config::Settings;
pub use engine::{DebounceEngine, EngineConfig};
pub use error::{ConfigError, GuardError};
pub use guard::Guard;
pub use sink::{BlockedCounter, LogCategory, LogLine, LogReceiver, LogSink};
pub use source::{Classifier, EventSource};
