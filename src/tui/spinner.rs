//! Spinner shown while a provider is answering

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICKS: &[&str] = &[
    "\u{2800}", "\u{2801}", "\u{2803}", "\u{2807}", "\u{280f}", "\u{281f}", "\u{283f}",
    "\u{287f}", "\u{28ff}", "\u{28fe}", "\u{28fc}", "\u{28f8}", "\u{28f0}", "\u{28e0}",
    "\u{28c0}", "\u{2880}", "\u{2800}",
];

pub struct WaitSpinner {
    bar: ProgressBar,
    active: bool,
}

impl WaitSpinner {
    /// Spinner drawing to stderr, so piped answers stay clean
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        Self { bar, active: false }
    }

    /// Hidden spinner for non-interactive output
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            active: false,
        }
    }

    pub fn start(&mut self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.active = true;
    }

    pub fn stop(&mut self) {
        if self.active {
            self.bar.finish_and_clear();
            self.active = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for WaitSpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaitSpinner {
    fn drop(&mut self) {
        self.stop();
    }
}
