//! Progress indicators for hostfleet

use std::time::Duration;

use colored::Colorize;
use converge::{GroupPlan, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner with a message, ticking in the background
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("{} {}", "✓".green(), msg);
}

pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    eprintln!("{} {}", "✗".red(), msg);
}

/// Per-group progress bar for a reconciliation pass
///
/// Callbacks arrive from worker threads; `ProgressBar` is internally
/// synchronized, so no extra locking is needed.
pub struct GroupProgress {
    bar: ProgressBar,
}

impl GroupProgress {
    pub fn new(groups: usize) -> Self {
        let bar = ProgressBar::new(groups as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Clear the bar, leaving printed lines in place
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for GroupProgress {
    fn on_group_start(&self, plan: &GroupPlan) {
        if plan.is_noop() {
            self.bar.set_message(format!("host group {}: checking", plan.index));
        } else {
            self.bar.set_message(format!(
                "host group {}: {} step(s)",
                plan.index,
                plan.actions.len()
            ));
        }
    }

    fn on_group_complete(&self, index: usize, result: &converge::Result<()>) {
        match result {
            Ok(()) => self
                .bar
                .println(format!("  {} host group {index}", "✓".green())),
            Err(e) => self
                .bar
                .println(format!("  {} host group {index}: {e}", "✗".red())),
        }
        self.bar.inc(1);
    }
}
