//! Pointer event and per-button state types

use std::fmt;
use std::time::Instant;

/// Physical buttons the debouncer guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Right,
}

impl Button {
    pub const ALL: [Button; 2] = [Button::Left, Button::Right];

    pub fn index(self) -> usize {
        match self {
            Button::Left => 0,
            Button::Right => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Left => "Left",
            Button::Right => "Right",
        }
    }

    /// Map a Linux input key code (BTN_LEFT=272, BTN_RIGHT=273)
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x110 => Some(Button::Left),
            0x111 => Some(Button::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Down(Button),
    Up(Button),
    Move,
}

/// A timestamped pointer event as delivered by an event source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: EventKind,
    pub time: Instant,
}

impl PointerEvent {
    pub fn down(button: Button, time: Instant) -> Self {
        Self {
            kind: EventKind::Down(button),
            time,
        }
    }

    pub fn up(button: Button, time: Instant) -> Self {
        Self {
            kind: EventKind::Up(button),
            time,
        }
    }

    pub fn moved(time: Instant) -> Self {
        Self {
            kind: EventKind::Move,
            time,
        }
    }
}

/// Decision returned to the event source for each event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Suppress,
}

impl Verdict {
    pub fn is_allow(self) -> bool {
        self == Verdict::Allow
    }
}

/// Debounce bookkeeping for one button
#[derive(Debug, Clone, Default)]
pub struct ButtonState {
    pub pressed: bool,
    pub press_time: Option<Instant>,
    pub last_down_time: Option<Instant>,
    pub last_up_time: Option<Instant>,
    pub last_down_blocked: bool,
    pub drag_detected: bool,
}
