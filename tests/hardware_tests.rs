//! Hardware-dependent tests that require a real pointer device
//!
//! These tests are ignored by default and can be run with:
//! `cargo test -- --ignored`
//!
//! They require:
//! - A connected mouse with left/right buttons
//! - Read/write access to /dev/input/event* (root or the input group)
//! - uinput module loaded

#![cfg(target_os = "linux")]

use clickguard::source::linux::{EvdevSource, list_pointer_interfaces};
use clickguard::{EngineConfig, EventSource, Guard, LogSink};
use std::path::Path;
use std::time::Duration;

/// Test pointer detection with real hardware
#[test]
#[ignore]
fn test_real_pointer_detection() {
    let interfaces = list_pointer_interfaces();
    if interfaces.is_empty() {
        panic!("No pointer device found. Connect a mouse and check permissions.");
    }
    for iface in &interfaces {
        println!("{:?}: {} ({} buttons)", iface.path, iface.name, iface.num_buttons);
        assert!(iface.has_left_right);
    }
}

/// Test uinput availability
#[test]
#[ignore]
fn test_uinput_available() {
    assert!(
        Path::new("/dev/uinput").exists(),
        "/dev/uinput not found. Run: sudo modprobe uinput"
    );
    assert!(EvdevSource::new(None).is_supported());
}

/// Grab the real pointer briefly and release it again
#[test]
#[ignore]
fn test_real_guard_start_stop() {
    let mut guard = Guard::new(EvdevSource::new(None));
    let (sink, rx) = LogSink::bounded(64);

    guard
        .start(EngineConfig::new(Duration::from_millis(50)), sink)
        .expect("Failed to start protection (are you root?)");
    assert!(guard.is_running());

    // Click a few times during this window to see the verdicts
    std::thread::sleep(Duration::from_secs(2));
    guard.stop();

    for line in rx.drain() {
        println!("{line}");
    }
    assert!(!guard.is_running());
}
