//! Adaptive suppression window
//!
//! Worn switches that need more pressure tend to produce many very short
//! presses. When most recent clicks on a button are short, the window for that
//! button is halved so legitimate fast clicks still get through; once the
//! pattern goes away the base delay is restored.

use crate::button::Button;
use crate::sink::LogSink;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Hard lower bound for any suppression window
pub const MIN_EFFECTIVE_DELAY: Duration = Duration::from_millis(20);

/// Holds shorter than this count as short clicks
pub const SHORT_CLICK_THRESHOLD: Duration = Duration::from_millis(30);

/// Completed clicks kept per button
pub const HISTORY_CAPACITY: usize = 10;

/// Clicks looked at when computing the short-click ratio
pub const RATIO_WINDOW: usize = 5;

/// Short-click ratio above which the window is halved
pub const SHORT_RATIO_LIMIT: f64 = 0.6;

/// How the short-click ratio is computed over the last clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioWindow {
    /// Ratio of short holds among the last five completed clicks
    #[default]
    Sliding,
    /// Legacy behaviour: every slot counts as short once any short click has
    /// ever been seen on the button, so a single short click is enough to
    /// halve the window after five clicks.
    Cumulative,
}

#[derive(Debug, Clone, Copy)]
struct ClickRecord {
    at: Instant,
    short: bool,
}

#[derive(Debug, Clone, Default)]
struct ButtonHistory {
    clicks: VecDeque<ClickRecord>,
    short_click_count: u32,
    effective_delay: Option<Duration>,
}

impl ButtonHistory {
    fn push(&mut self, record: ClickRecord) {
        if self.clicks.len() == HISTORY_CAPACITY {
            self.clicks.pop_front();
        }
        self.clicks.push_back(record);
    }

    /// Time covered by the clicks in the ratio window
    fn window_span(&self) -> Duration {
        let mut recent = self.clicks.iter().rev().take(RATIO_WINDOW);
        match (recent.next(), recent.last()) {
            (Some(newest), Some(oldest)) => newest.at.saturating_duration_since(oldest.at),
            _ => Duration::ZERO,
        }
    }

    fn short_in_window(&self, mode: RatioWindow) -> usize {
        match mode {
            RatioWindow::Sliding => self
                .clicks
                .iter()
                .rev()
                .take(RATIO_WINDOW)
                .filter(|c| c.short)
                .count(),
            RatioWindow::Cumulative => {
                if self.short_click_count > 0 {
                    RATIO_WINDOW
                } else {
                    0
                }
            }
        }
    }
}

/// Per-button adaptive delay bookkeeping
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    base_delay: Duration,
    mode: RatioWindow,
    buttons: [ButtonHistory; 2],
}

impl AdaptiveController {
    pub fn new(base_delay: Duration, mode: RatioWindow) -> Self {
        Self {
            base_delay,
            mode,
            buttons: Default::default(),
        }
    }

    /// Window currently applied to `button`, never below 20ms
    pub fn effective_delay(&self, button: Button) -> Duration {
        let delay = match self.buttons[button.index()].effective_delay {
            Some(d) if !d.is_zero() => d,
            _ => self.base_delay,
        };
        delay.max(MIN_EFFECTIVE_DELAY)
    }

    /// Delay reduced for a low-pressure pattern
    pub fn reduced_delay(&self) -> Duration {
        (self.base_delay / 2).max(MIN_EFFECTIVE_DELAY)
    }

    pub fn history_len(&self, button: Button) -> usize {
        self.buttons[button.index()].clicks.len()
    }

    pub fn short_click_count(&self, button: Button) -> u32 {
        self.buttons[button.index()].short_click_count
    }

    /// Feed a completed click. Returns the new window when it changed.
    pub fn record_click(
        &mut self,
        button: Button,
        at: Instant,
        hold: Duration,
        sink: &LogSink,
    ) -> Option<Duration> {
        let before = self.effective_delay(button);
        let reduced = self.reduced_delay();
        let base = self.base_delay;
        let mode = self.mode;
        let state = &mut self.buttons[button.index()];

        let short = hold < SHORT_CLICK_THRESHOLD;
        state.push(ClickRecord { at, short });

        if short {
            state.short_click_count += 1;
            sink.info(format!(
                "{} short click ({}ms hold) - total short clicks: {}",
                button,
                hold.as_millis(),
                state.short_click_count
            ));
        }

        if state.clicks.len() < RATIO_WINDOW {
            return None;
        }

        let ratio = state.short_in_window(mode) as f64 / RATIO_WINDOW as f64;
        debug!(
            "{} short-click ratio {:.2} over {}ms ({:?})",
            button,
            ratio,
            state.window_span().as_millis(),
            mode
        );

        let low_pressure = ratio > SHORT_RATIO_LIMIT;
        state.effective_delay = Some(if low_pressure { reduced } else { base });

        // Compare floored values so a no-op halving stays silent
        let after = self.effective_delay(button);
        if after == before {
            return None;
        }
        if low_pressure {
            sink.adaptive(format!(
                "{} delay reduced to {}ms after low-pressure pattern",
                button,
                after.as_millis()
            ));
        } else {
            sink.adaptive(format!("{} delay restored to {}ms", button, after.as_millis()));
        }
        Some(after)
    }
}
