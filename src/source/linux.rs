//! Linux pointer interception (evdev grab + uinput virtual device)
//!
//! Every physical pointer is grabbed so its events stop reaching the system.
//! A reader thread feeds left/right button and motion events to the
//! classifier and re-emits each SYN frame on a virtual pointer, minus the
//! button events that were suppressed.

use super::{Classifier, EventSource};
use crate::button::{Button, EventKind, PointerEvent};
use anyhow::{Context, Result, bail};
use evdev::{
    AttributeSet, Device, InputEvent, InputEventKind, Key, RelativeAxisType,
    uinput::VirtualDeviceBuilder,
};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const VIRTUAL_DEVICE_NAME: &str = "clickguard virtual pointer";

/// Information about a detected pointer interface
#[derive(Debug, Clone)]
pub struct PointerInterface {
    pub path: PathBuf,
    pub name: String,
    pub has_left_right: bool,
    pub has_motion: bool,
    pub num_buttons: usize,
}

/// List pointer-like input devices for diagnostics
pub fn list_pointer_interfaces() -> Vec<PointerInterface> {
    let mut interfaces = Vec::new();

    for (path, dev) in evdev::enumerate() {
        let name = dev.name().unwrap_or_default().to_string();
        if name == VIRTUAL_DEVICE_NAME {
            continue;
        }

        let keys = dev.supported_keys();
        let has_left_right = keys
            .map(|k| k.contains(Key::BTN_LEFT) || k.contains(Key::BTN_RIGHT))
            .unwrap_or(false);
        if !has_left_right {
            continue;
        }

        // Count button codes (0x110-0x15F range)
        let num_buttons = keys
            .map(|k| k.iter().filter(|key| key.code() >= 0x110 && key.code() < 0x160).count())
            .unwrap_or(0);

        let has_motion = dev
            .supported_relative_axes()
            .map(|r| r.contains(RelativeAxisType::REL_X) && r.contains(RelativeAxisType::REL_Y))
            .unwrap_or(false);

        interfaces.push(PointerInterface {
            path,
            name,
            has_left_right,
            has_motion,
            num_buttons,
        });
    }

    interfaces.sort_by(|a, b| a.path.cmp(&b.path));
    interfaces
}

/// Select the devices to grab: the preferred path if it exists, otherwise
/// every relative pointer exposing left/right buttons.
fn select_pointer_devices(preferred_device: Option<&Path>) -> Vec<PathBuf> {
    if let Some(p) = preferred_device {
        if p.exists() {
            return vec![p.to_path_buf()];
        }
        warn!("Configured device {:?} not found, scanning instead", p);
    }

    info!("Scanning /dev/input/event* devices for pointers...");

    let mut paths = Vec::new();
    for iface in list_pointer_interfaces() {
        info!(
            "  {:?}: '{}' motion={} [btns={}]",
            iface.path, iface.name, iface.has_motion, iface.num_buttons
        );
        if iface.has_motion {
            paths.push(iface.path);
        }
    }

    if paths.is_empty() {
        warn!("No suitable pointer device found!");
    }
    paths
}

/// Translate a raw evdev event into a pointer event for the classifier.
/// Anything else (other buttons, key repeat, wheel, sync) returns `None`.
pub fn translate(ev: &InputEvent, now: Instant) -> Option<PointerEvent> {
    match ev.kind() {
        InputEventKind::Key(key) => {
            let button = Button::from_code(key.code())?;
            match ev.value() {
                1 => Some(PointerEvent::down(button, now)),
                0 => Some(PointerEvent::up(button, now)),
                _ => None,
            }
        }
        InputEventKind::RelAxis(RelativeAxisType::REL_X)
        | InputEventKind::RelAxis(RelativeAxisType::REL_Y) => Some(PointerEvent::moved(now)),
        _ => None,
    }
}

pub struct EvdevSource {
    preferred_device: Option<PathBuf>,
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl EvdevSource {
    pub fn new(preferred_device: Option<PathBuf>) -> Self {
        Self {
            preferred_device,
            stop: Arc::new(AtomicBool::new(false)),
            join: None,
        }
    }
}

impl EventSource for EvdevSource {
    fn is_supported(&self) -> bool {
        Path::new("/dev/uinput").exists()
    }

    fn register(&mut self, classifier: Classifier) -> Result<()> {
        if self.join.is_some() {
            bail!("evdev source is already registered");
        }

        let source_paths = select_pointer_devices(self.preferred_device.as_deref());
        if source_paths.is_empty() {
            bail!("No pointer device with left/right buttons found in /dev/input");
        }

        info!("Intercepting {} device(s): {:?}", source_paths.len(), source_paths);

        let mut devices: Vec<Device> = Vec::new();
        let mut all_keys: AttributeSet<Key> = AttributeSet::new();
        let mut all_rel: AttributeSet<RelativeAxisType> = AttributeSet::new();

        for source_path in &source_paths {
            let mut dev = Device::open(source_path)
                .with_context(|| format!("Failed to open evdev device: {source_path:?}"))?;

            set_nonblocking(&dev).context("Failed to set evdev device non-blocking")?;

            if let Some(keys) = dev.supported_keys() {
                for k in keys.iter() {
                    all_keys.insert(k);
                }
            }
            if let Some(rel) = dev.supported_relative_axes() {
                for axis in rel.iter() {
                    all_rel.insert(axis);
                }
            }

            // Grab the device so the physical events do not reach the system.
            dev.grab()
                .with_context(|| format!("Failed to grab evdev device: {source_path:?}"))?;
            info!("Grabbed device: {:?}", source_path);

            devices.push(dev);
        }

        let vdev = VirtualDeviceBuilder::new()
            .context("Failed to create uinput builder")?
            .name(VIRTUAL_DEVICE_NAME)
            .with_keys(&all_keys)
            .context("Failed to set key capabilities")?
            .with_relative_axes(&all_rel)
            .context("Failed to set relative axis capabilities")?
            .build()
            .context("Failed to build uinput device")?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let join = thread::Builder::new()
            .name("clickguard-evdev".into())
            .spawn(move || {
                if let Err(e) = run_filter_loop(stop_thread, devices, vdev, classifier) {
                    warn!("evdev filter stopped: {e:#}");
                }
            })
            .context("Failed to spawn evdev reader thread")?;

        self.stop = stop;
        self.join = Some(join);
        Ok(())
    }

    fn unregister(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
            info!("evdev source unregistered");
        }
    }

    fn is_active(&self) -> bool {
        self.join.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn name(&self) -> &'static str {
        "evdev"
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        self.unregister();
    }
}

fn run_filter_loop(
    stop: Arc<AtomicBool>,
    mut devices: Vec<Device>,
    mut vdev: evdev::uinput::VirtualDevice,
    mut classifier: Classifier,
) -> Result<()> {
    // Pending events per device until its next SYN_REPORT
    let mut frames: Vec<Vec<InputEvent>> = vec![Vec::new(); devices.len()];

    while !stop.load(Ordering::Relaxed) {
        let mut had_events = false;

        for (dev, frame) in devices.iter_mut().zip(frames.iter_mut()) {
            match dev.fetch_events() {
                Ok(events) => {
                    for ev in events {
                        had_events = true;

                        if let InputEventKind::Synchronization(_) = ev.kind() {
                            if !frame.is_empty() {
                                frame.push(ev);
                                if let Err(e) = vdev.emit(frame.as_slice()) {
                                    warn!("uinput emit failed: {e}");
                                }
                                frame.clear();
                            }
                            continue;
                        }

                        match translate(&ev, Instant::now()) {
                            Some(pointer_event) => {
                                if classifier(pointer_event).is_allow() {
                                    frame.push(ev);
                                } else if !matches!(pointer_event.kind, EventKind::Move) {
                                    debug!("dropped {:?}", pointer_event.kind);
                                }
                            }
                            None => frame.push(ev),
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    // No events available, continue to next device
                }
                Err(e) => return Err(e).context("Failed to read events from evdev device"),
            }
        }

        if !had_events {
            thread::sleep(Duration::from_millis(1));
        }
    }

    // Best-effort ungrab. (Dropping the devices should also release the grabs.)
    for mut dev in devices {
        let _ = dev.ungrab();
    }
    Ok(())
}

fn set_nonblocking(dev: &Device) -> Result<()> {
    let raw_fd = dev.as_raw_fd();

    // Preserve existing flags; just OR in O_NONBLOCK.
    let current = unsafe { libc::fcntl(raw_fd, libc::F_GETFL) };
    if current < 0 {
        return Err(std::io::Error::last_os_error()).context("fcntl(F_GETFL) failed");
    }

    let rc = unsafe { libc::fcntl(raw_fd, libc::F_SETFL, current | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error()).context("fcntl(F_SETFL, O_NONBLOCK) failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    fn key(code: u16, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, code, value)
    }

    #[test]
    fn test_translate_buttons() {
        let now = Instant::now();
        assert_eq!(
            translate(&key(272, 1), now),
            Some(PointerEvent::down(Button::Left, now))
        );
        assert_eq!(
            translate(&key(273, 0), now),
            Some(PointerEvent::up(Button::Right, now))
        );
    }

    #[test]
    fn test_translate_ignores_repeat_and_other_buttons() {
        let now = Instant::now();
        assert_eq!(translate(&key(272, 2), now), None);
        // BTN_MIDDLE passes through untouched
        assert_eq!(translate(&key(274, 1), now), None);
    }

    #[test]
    fn test_translate_motion() {
        let now = Instant::now();
        let rel_x = InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_X.0, 3);
        let wheel = InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_WHEEL.0, 1);
        assert_eq!(translate(&rel_x, now), Some(PointerEvent::moved(now)));
        assert_eq!(translate(&wheel, now), None);
    }

    #[test]
    fn test_list_pointer_interfaces() {
        // Runs the discovery; finds nothing without readable /dev/input nodes
        let interfaces = list_pointer_interfaces();
        for iface in &interfaces {
            assert!(iface.has_left_right);
            assert_ne!(iface.name, VIRTUAL_DEVICE_NAME);
        }
    }
}
