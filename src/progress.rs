//! Terminal feedback for scans, linking passes and optimization phases.
//!
//! Bars and spinners draw on stderr. In log-only mode (`--log-only`) they are
//! hidden and a [`Progress`] reports plain lines every few steps instead, so
//! output stays readable when redirected to a file.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Switch every bar and spinner created afterwards to log-only output.
pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Install the stderr tracing subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// "42.0s" under a minute, "1.5m" above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// The log-only line for step `current` of `total`, or `None` between reports.
/// Reports every `every` steps and always on the last one.
pub fn progress_line(phase: &str, current: u64, total: u64, every: u64) -> Option<String> {
    if total == 0 || current == 0 {
        return None;
    }
    if current % every.max(1) != 0 && current != total {
        return None;
    }
    let pct = 100.0 * current as f64 / total as f64;
    Some(format!("[{}] {}/{} ({:.1}%)", phase, current, total, pct))
}

/// A counted pass over `total` items.
pub struct Progress {
    bar: ProgressBar,
    phase: &'static str,
    total: u64,
    every: u64,
    current: u64,
}

impl Progress {
    pub fn new(phase: &'static str, message: &str, total: u64, every: u64) -> Self {
        let bar = ProgressBar::new(total);
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (ETA: {eta})")
                    .unwrap()
                    .progress_chars("=> "),
            );
        }
        bar.set_message(message.to_string());
        Self {
            bar,
            phase,
            total,
            every,
            current: 0,
        }
    }

    pub fn inc(&mut self) {
        self.current += 1;
        self.bar.inc(1);
        if is_log_only() {
            if let Some(line) = progress_line(self.phase, self.current, self.total, self.every) {
                eprintln!("{}", line);
            }
        }
    }

    pub fn position(&self) -> u64 {
        self.current
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

/// Spinner for a phase with no known length. Hidden in log-only mode.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} [{elapsed_precise}]")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}
