//! Protection lifecycle: Idle -> Running -> Idle
//!
//! Each `start` builds a fresh [`DebounceEngine`] and moves it into the
//! classifier closure handed to the event source, so all per-button state
//! lives only as long as the registration. `stop` unregisters the source,
//! which drops the engine; the next `start` begins from a clean slate.
//!
//! A source can also die on its own (device unplugged). `poll_source` notices
//! that, reports it once and returns the guard to Idle.

use crate::engine::{DebounceEngine, EngineConfig};
use crate::error::GuardError;
use crate::sink::{BlockedCounter, LogSink};
use crate::source::EventSource;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug)]
enum GuardState {
    Idle,
    Running { config: EngineConfig, sink: LogSink },
}

pub struct Guard<S: EventSource> {
    source: S,
    blocked: BlockedCounter,
    state: GuardState,
}

impl<S: EventSource> Guard<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            blocked: BlockedCounter::new(),
            state: GuardState::Idle,
        }
    }

    /// Capability probe of the underlying event source
    pub fn is_supported(&self) -> bool {
        self.source.is_supported()
    }

    /// True while a session is running and its source still delivers events
    pub fn is_running(&self) -> bool {
        matches!(self.state, GuardState::Running { .. }) && self.source.is_active()
    }

    /// Detect a source that stopped by itself. Returns whether protection is
    /// still running; a dead source is unregistered and the guard goes Idle.
    pub fn poll_source(&mut self) -> bool {
        if !matches!(self.state, GuardState::Running { .. }) {
            return false;
        }
        if self.source.is_active() {
            return true;
        }

        if let GuardState::Running { sink, .. } =
            std::mem::replace(&mut self.state, GuardState::Idle)
        {
            self.source.unregister();
            warn!("{} event source stopped unexpectedly", self.source.name());
            sink.info("Pointer hook lost - protection stopped unexpectedly");
        }
        false
    }

    /// Base delay of the running session
    pub fn base_delay(&self) -> Option<Duration> {
        match &self.state {
            GuardState::Running { config, .. } => Some(config.base_delay),
            GuardState::Idle => None,
        }
    }

    pub fn blocked_count(&self) -> u64 {
        self.blocked.get()
    }

    pub fn reset_blocked_count(&self) {
        self.blocked.reset();
    }

    /// Handle for readers polling the counter from another thread
    pub fn blocked_counter(&self) -> BlockedCounter {
        self.blocked.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Start protection with `config.base_delay` (already validated by the
    /// caller). Engine log lines go to `sink`.
    pub fn start(&mut self, config: EngineConfig, sink: LogSink) -> Result<(), GuardError> {
        if self.poll_source() {
            return Err(GuardError::AlreadyRunning);
        }

        if !self.source.is_supported() {
            warn!("{} event source is not supported here", self.source.name());
            sink.info("Pointer interception is not supported on this platform");
            return Err(GuardError::UnsupportedPlatform);
        }

        let mut engine = DebounceEngine::new(config, sink.clone(), self.blocked.clone());
        let registered = self
            .source
            .register(Box::new(move |event| engine.classify(event)));

        if let Err(e) = registered {
            warn!("Failed to register {} event source: {e:#}", self.source.name());
            sink.info(format!("Failed to install pointer hook: {e}"));
            return Err(GuardError::RegistrationFailure(e.into()));
        }

        info!(
            "Protection started on {} source ({}ms delay, {:?} ratio window)",
            self.source.name(),
            config.base_delay.as_millis(),
            config.ratio_window
        );
        sink.info(format!(
            "Pointer hook installed - protection active ({}ms delay)",
            config.base_delay.as_millis()
        ));
        self.state = GuardState::Running { config, sink };
        Ok(())
    }

    /// Stop protection. No-op when idle.
    pub fn stop(&mut self) {
        let GuardState::Running { sink, .. } =
            std::mem::replace(&mut self.state, GuardState::Idle)
        else {
            return;
        };

        self.source.unregister();
        info!("Protection stopped");
        sink.info("Pointer hook removed - protection stopped");
    }
}

impl<S: EventSource> Drop for Guard<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::{Button, PointerEvent, Verdict};
    use crate::sink::{LogCategory, LogReceiver};
    use crate::source::Classifier;
    use anyhow::{Result, bail};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    /// In-memory source; tests push events through `deliver`
    #[derive(Clone, Default)]
    struct ScriptedSource {
        classifier: Arc<Mutex<Option<Classifier>>>,
        fail_registration: bool,
        unsupported: bool,
    }

    impl ScriptedSource {
        /// Simulate the dispatch thread dying (device unplugged)
        fn lose_device(&self) {
            self.classifier.lock().unwrap().take();
        }

        fn deliver(&self, event: PointerEvent) -> Option<Verdict> {
            let mut slot = self.classifier.lock().unwrap();
            slot.as_mut().map(|classify| classify(event))
        }
    }

    impl EventSource for ScriptedSource {
        fn is_supported(&self) -> bool {
            !self.unsupported
        }

        fn register(&mut self, classifier: Classifier) -> Result<()> {
            if self.fail_registration {
                bail!("hook install refused");
            }
            *self.classifier.lock().unwrap() = Some(classifier);
            Ok(())
        }

        fn unregister(&mut self) {
            self.classifier.lock().unwrap().take();
        }

        fn is_active(&self) -> bool {
            self.classifier.lock().unwrap().is_some()
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn config(ms: u64) -> EngineConfig {
        EngineConfig::new(Duration::from_millis(ms))
    }

    fn log_queue() -> (LogSink, LogReceiver) {
        LogSink::bounded(128)
    }

    #[test]
    fn test_start_and_stop() {
        let source = ScriptedSource::default();
        let mut guard = Guard::new(source.clone());
        let (sink, rx) = log_queue();

        guard.start(config(50), sink).unwrap();
        assert!(guard.is_running());
        assert_eq!(guard.base_delay(), Some(Duration::from_millis(50)));

        guard.stop();
        assert!(!guard.is_running());
        assert!(source.deliver(PointerEvent::moved(Instant::now())).is_none());

        let lines = rx.drain();
        assert!(lines.last().is_some_and(|l| l.message.contains("protection stopped")));
    }

    #[test]
    fn test_start_twice_is_already_running() {
        let mut guard = Guard::new(ScriptedSource::default());
        let (sink, _rx) = log_queue();
        guard.start(config(50), sink.clone()).unwrap();
        assert!(matches!(
            guard.start(config(50), sink),
            Err(GuardError::AlreadyRunning)
        ));
        assert!(guard.is_running());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut guard = Guard::new(ScriptedSource::default());
        guard.stop();
        guard.stop();
        assert!(!guard.is_running());
    }

    #[test]
    fn test_unsupported_platform_fails_explicitly() {
        let source = ScriptedSource {
            unsupported: true,
            ..Default::default()
        };
        let mut guard = Guard::new(source);
        let (sink, rx) = log_queue();

        assert!(matches!(
            guard.start(config(50), sink),
            Err(GuardError::UnsupportedPlatform)
        ));
        assert!(!guard.is_running());
        assert_eq!(rx.drain().len(), 1);
    }

    #[test]
    fn test_registration_failure_leaves_idle() {
        let source = ScriptedSource {
            fail_registration: true,
            ..Default::default()
        };
        let mut guard = Guard::new(source);
        let (sink, rx) = log_queue();

        let err = guard.start(config(50), sink).unwrap_err();
        assert!(matches!(err, GuardError::RegistrationFailure(_)));
        assert!(!guard.is_running());

        let lines = rx.drain();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].message.contains("hook install refused"));
    }

    #[test]
    fn test_restart_discards_pressed_state() {
        let source = ScriptedSource::default();
        let mut guard = Guard::new(source.clone());
        let t0 = Instant::now();

        let (sink, _rx) = log_queue();
        guard.start(config(50), sink).unwrap();
        assert_eq!(
            source.deliver(PointerEvent::down(Button::Left, t0)),
            Some(Verdict::Allow)
        );
        // Stopped mid-press: no Up was ever delivered
        guard.stop();

        let (sink, rx) = log_queue();
        guard.start(config(50), sink).unwrap();
        // A stale pressed flag or last-down time would block this
        assert_eq!(
            source.deliver(PointerEvent::down(Button::Left, t0 + Duration::from_millis(5))),
            Some(Verdict::Allow)
        );
        assert_eq!(guard.blocked_count(), 0);
        assert!(rx.drain().iter().all(|l| l.category != LogCategory::Blocked));
    }

    #[test]
    fn test_counter_survives_restart_until_reset() {
        let source = ScriptedSource::default();
        let mut guard = Guard::new(source.clone());
        let counter = guard.blocked_counter();
        let t0 = Instant::now();

        let (sink, _rx) = log_queue();
        guard.start(config(50), sink).unwrap();
        source.deliver(PointerEvent::down(Button::Right, t0));
        source.deliver(PointerEvent::down(Button::Right, t0 + Duration::from_millis(10)));
        assert_eq!(counter.get(), 1);

        guard.stop();
        assert_eq!(guard.blocked_count(), 1);

        guard.reset_blocked_count();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_dead_source_is_reported_and_guard_goes_idle() {
        let source = ScriptedSource::default();
        let mut guard = Guard::new(source.clone());
        let (sink, rx) = log_queue();
        guard.start(config(50), sink).unwrap();
        assert!(guard.poll_source());
        rx.drain();

        source.lose_device();
        assert!(!guard.is_running());
        assert!(!guard.poll_source());
        assert!(!guard.poll_source());

        let lines = rx.drain();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].message.contains("stopped unexpectedly"));

        // A fresh session can be started after the loss
        let (sink, _rx) = log_queue();
        guard.start(config(50), sink).unwrap();
        assert!(guard.is_running());
    }

    #[test]
    fn test_drop_stops_running_guard() {
        let source = ScriptedSource::default();
        {
            let mut guard = Guard::new(source.clone());
            let (sink, _rx) = log_queue();
            guard.start(config(50), sink).unwrap();
        }
        assert!(source.deliver(PointerEvent::moved(Instant::now())).is_none());
    }
}
