//! Per-button debounce state machine
//!
//! `DebounceEngine::classify` is called on the input dispatch thread for every
//! pointer event and returns the verdict synchronously. All reporting goes
//! through the non-blocking [`LogSink`] and the shared [`BlockedCounter`].
//!
//! Down events are checked in this order, first match wins:
//! 1. another Down on the same button inside the window (bounce/double click)
//! 2. Down while the button is still held and inside the window since press
//! 3. Down inside the window after the last completed click on that button
//!
//! An Up is only forwarded when it closes an allowed press and is not itself a
//! repeat of the previous Up.

use crate::adaptive::{AdaptiveController, RatioWindow};
use crate::button::{Button, ButtonState, EventKind, PointerEvent, Verdict};
use crate::sink::{BlockedCounter, LogSink};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Holds longer than this are reported as long holds
pub const LONG_HOLD: Duration = Duration::from_millis(200);

/// Engine parameters fixed for one protection session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub base_delay: Duration,
    pub ratio_window: RatioWindow,
}

impl EngineConfig {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ratio_window: RatioWindow::default(),
        }
    }

    pub fn with_ratio_window(mut self, ratio_window: RatioWindow) -> Self {
        self.ratio_window = ratio_window;
        self
    }
}

pub struct DebounceEngine {
    buttons: [ButtonState; 2],
    adaptive: AdaptiveController,
    last_complete_click: Option<Instant>,
    last_click_button: Option<Button>,
    sink: LogSink,
    blocked: BlockedCounter,
    #[cfg(test)]
    fault_injected: bool,
}

fn millis(d: Duration) -> u128 {
    d.as_millis()
}

impl DebounceEngine {
    pub fn new(config: EngineConfig, sink: LogSink, blocked: BlockedCounter) -> Self {
        Self {
            buttons: Default::default(),
            adaptive: AdaptiveController::new(config.base_delay, config.ratio_window),
            last_complete_click: None,
            last_click_button: None,
            sink,
            blocked,
            #[cfg(test)]
            fault_injected: false,
        }
    }

    /// Decide whether `event` reaches the rest of the system.
    ///
    /// Never panics: an internal fault allows the event.
    pub fn classify(&mut self, event: PointerEvent) -> Verdict {
        match panic::catch_unwind(AssertUnwindSafe(|| self.process(event))) {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!("classification fault on {:?}, allowing event", event.kind);
                self.sink
                    .info(format!("internal fault on {:?} - event allowed", event.kind));
                Verdict::Allow
            }
        }
    }

    pub fn effective_delay(&self, button: Button) -> Duration {
        self.adaptive.effective_delay(button)
    }

    pub fn button_state(&self, button: Button) -> &ButtonState {
        &self.buttons[button.index()]
    }

    pub fn adaptive(&self) -> &AdaptiveController {
        &self.adaptive
    }

    pub fn last_complete_click(&self) -> Option<(Button, Instant)> {
        Some((self.last_click_button?, self.last_complete_click?))
    }

    pub fn blocked_count(&self) -> u64 {
        self.blocked.get()
    }

    fn process(&mut self, event: PointerEvent) -> Verdict {
        #[cfg(test)]
        if self.fault_injected {
            panic!("injected classification fault");
        }

        match event.kind {
            EventKind::Down(button) => self.on_down(button, event.time),
            EventKind::Up(button) => self.on_up(button, event.time),
            EventKind::Move => {
                self.on_move();
                Verdict::Allow
            }
        }
    }

    fn block(&mut self, button: Button, reason: String) -> Verdict {
        let total = self.blocked.increment();
        debug!("{} blocked: {}", button, reason);
        self.sink
            .blocked(format!("{} {} - total blocked: {}", button, reason, total));
        Verdict::Suppress
    }

    fn on_down(&mut self, button: Button, now: Instant) -> Verdict {
        let delay = self.effective_delay(button);
        let state = &mut self.buttons[button.index()];

        if let Some(last_down) = state.last_down_time {
            let interval = now.saturating_duration_since(last_down);
            if interval < delay {
                state.last_down_blocked = true;
                state.last_down_time = Some(now);
                return self.block(
                    button,
                    format!(
                        "bounce/double-click ({}ms after previous down, delay {}ms)",
                        millis(interval),
                        millis(delay)
                    ),
                );
            }
        }
        state.last_down_time = Some(now);
        state.last_down_blocked = false;

        if state.pressed {
            if let Some(pressed_at) = state.press_time {
                let since_press = now.saturating_duration_since(pressed_at);
                if since_press < delay {
                    return self.block(
                        button,
                        format!(
                            "bounce while held ({}ms since press, delay {}ms)",
                            millis(since_press),
                            millis(delay)
                        ),
                    );
                }
            }
        }

        if self.last_click_button == Some(button) {
            if let Some(clicked_at) = self.last_complete_click {
                let since_click = now.saturating_duration_since(clicked_at);
                if since_click < delay {
                    return self.block(
                        button,
                        format!(
                            "rapid repeat ({}ms after complete click, delay {}ms)",
                            millis(since_click),
                            millis(delay)
                        ),
                    );
                }
            }
        }

        let state = &mut self.buttons[button.index()];
        state.pressed = true;
        state.press_time = Some(now);
        state.drag_detected = false;
        self.sink.allowed(format!("{} button press", button));
        Verdict::Allow
    }

    fn on_up(&mut self, button: Button, now: Instant) -> Verdict {
        let delay = self.effective_delay(button);
        let state = &mut self.buttons[button.index()];

        if !state.pressed {
            self.sink.blocked(format!(
                "{} spurious up (no matching press) - total blocked: {}",
                button,
                self.blocked.get()
            ));
            return Verdict::Suppress;
        }
        if let Some(last_up) = state.last_up_time {
            let interval = now.saturating_duration_since(last_up);
            if interval < delay {
                self.sink.blocked(format!(
                    "{} spurious up ({}ms after previous up) - total blocked: {}",
                    button,
                    millis(interval),
                    self.blocked.get()
                ));
                return Verdict::Suppress;
            }
        }

        state.last_up_time = Some(now);
        let hold = state
            .press_time
            .map(|pressed_at| now.saturating_duration_since(pressed_at))
            .unwrap_or_default();
        let dragged = state.drag_detected;
        state.pressed = false;
        state.drag_detected = false;

        self.last_complete_click = Some(now);
        self.last_click_button = Some(button);
        if let Some(window) = self.adaptive.record_click(button, now, hold, &self.sink) {
            debug!("{} window now {}ms", button, millis(window));
        }

        let message = if dragged {
            format!("{} button release after drag ({}ms hold)", button, millis(hold))
        } else if hold > LONG_HOLD {
            format!("{} button release after long hold ({}ms)", button, millis(hold))
        } else {
            format!("{} button quick release ({}ms)", button, millis(hold))
        };
        self.sink.allowed(message);
        Verdict::Allow
    }

    fn on_move(&mut self) {
        for button in Button::ALL {
            let state = &mut self.buttons[button.index()];
            if state.pressed && !state.drag_detected {
                state.drag_detected = true;
                self.sink.info(format!("{} button drag detected", button));
            }
        }
    }
}
