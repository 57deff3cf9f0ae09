//! clickguard - stops worn mouse switches from double clicking
//!
//! Grabs the pointer devices, filters bounced button events and re-emits the
//! rest on a virtual pointer until interrupted.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use clickguard::sink::{LogCategory, LogLine, LogReceiver, LogSink, RecvTimeoutError};
use clickguard::{Guard, RatioWindow, Settings, source};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Interval of the blocked-counter poll
const COUNTER_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RatioArg {
    Sliding,
    Cumulative,
}

impl From<RatioArg> for RatioWindow {
    fn from(arg: RatioArg) -> Self {
        match arg {
            RatioArg::Sliding => RatioWindow::Sliding,
            RatioArg::Cumulative => RatioWindow::Cumulative,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "clickguard", version)]
#[command(about = "Blocks accidental double clicks from worn mouse switches")]
struct Cli {
    /// Suppression window in milliseconds (1-500)
    #[arg(long = "delay-ms")]
    delay_ms: Option<u64>,

    /// Intercept only this /dev/input/eventN device
    #[arg(long)]
    device: Option<PathBuf>,

    /// How the short-click ratio is computed
    #[arg(long = "ratio-window", value_enum)]
    ratio_window: Option<RatioArg>,

    /// Console log level (error, warn, info, debug, trace)
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save: bool,

    /// List pointer devices and exit
    #[arg(long = "list-devices")]
    list_devices: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(delay_ms) = cli.delay_ms {
        settings.delay_ms = delay_ms;
    }
    if let Some(device) = cli.device {
        settings.device = Some(device);
    }
    if let Some(window) = cli.ratio_window {
        settings.ratio_window = window.into();
    }
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }

    tracing_subscriber::fmt()
        .with_max_level(settings.tracing_level())
        .init();

    info!("clickguard {} starting...", env!("CARGO_PKG_VERSION"));

    if cli.list_devices {
        list_devices();
        return Ok(());
    }

    let config = settings
        .engine_config()
        .context("Invalid delay setting")?;

    if cli.save {
        settings.save().context("Failed to save settings")?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let (sink, receiver) = LogSink::bounded(settings.max_log_lines);
    let drain_stop = Arc::new(AtomicBool::new(false));
    let drain_stop_thread = drain_stop.clone();
    let drain = thread::Builder::new()
        .name("clickguard-log".into())
        .spawn(move || drain_log(receiver, drain_stop_thread))
        .context("Failed to spawn log drain thread")?;

    sink.info(format!(
        "Starting click protection with {}ms delay",
        config.base_delay.as_millis()
    ));

    let mut guard = Guard::new(source::platform_source(settings.device.clone()));
    let started = guard.start(config, sink.clone());

    let mut source_lost = false;
    if started.is_ok() {
        let counter = guard.blocked_counter();
        let mut last_reported = counter.get();
        while running.load(Ordering::SeqCst) {
            thread::sleep(COUNTER_POLL_INTERVAL);
            if !guard.poll_source() {
                source_lost = true;
                break;
            }
            let count = counter.get();
            if count > last_reported {
                info!("Blocked clicks: {}", count);
                last_reported = count;
            }
        }
        guard.stop();
    }

    let total = guard.blocked_count();
    drop(guard);
    if sink.dropped() > 0 {
        warn!("{} log line(s) dropped while the queue was full", sink.dropped());
    }
    drop(sink);

    drain_stop.store(true, Ordering::SeqCst);
    if drain.join().is_err() {
        error!("log drain thread panicked");
    }

    started.context("Failed to start protection")?;
    if source_lost {
        anyhow::bail!("Pointer input was lost; protection stopped ({} click(s) blocked)", total);
    }
    info!("clickguard shutting down ({} click(s) blocked)", total);
    Ok(())
}

/// Print engine log lines in emission order until told to stop
fn drain_log(receiver: LogReceiver, stop: Arc<AtomicBool>) {
    loop {
        match receiver.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => emit(&line),
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
    for line in receiver.drain() {
        emit(&line);
    }
}

fn emit(line: &LogLine) {
    match line.category {
        LogCategory::Blocked => warn!(target: "clickguard::events", "{}", line),
        _ => info!(target: "clickguard::events", "{}", line),
    }
}

#[cfg(target_os = "linux")]
fn list_devices() {
    let interfaces = source::linux::list_pointer_interfaces();
    if interfaces.is_empty() {
        info!("No pointer devices found in /dev/input/ (check permissions?)");
        return;
    }
    info!("Detected {} pointer interface(s):", interfaces.len());
    for iface in &interfaces {
        info!(
            "  {:?}: '{}' [motion={}, buttons={}]",
            iface.path, iface.name, iface.has_motion, iface.num_buttons
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn list_devices() {
    info!("Pointer interception is only supported on Linux");
}
