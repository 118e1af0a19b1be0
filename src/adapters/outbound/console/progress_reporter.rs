use crate::compliance::domain::Status;
use crate::ports::outbound::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::sync::Mutex;

/// StderrProgressReporter adapter for reporting progress to stderr
///
/// Keeps stdout free for the report. Per-control status lines are colored
/// when stderr is a terminal and `NO_COLOR` is unset; an indicatif bar tracks
/// finished controls.
pub struct StderrProgressReporter {
    progress_bar: Mutex<Option<ProgressBar>>,
    colored: bool,
}

impl StderrProgressReporter {
    pub fn new() -> Self {
        Self {
            progress_bar: Mutex::new(None),
            colored: std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    fn get_or_create_progress_bar(&self, total: usize) -> ProgressBar {
        let mut slot = self
            .progress_bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pb) = slot.as_ref() {
            return pb.clone();
        }

        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("   {spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) - {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        pb.set_style(style);
        *slot = Some(pb.clone());
        pb
    }

    fn finish_progress_bar(&self) {
        let slot = self
            .progress_bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pb) = slot.as_ref() {
            pb.finish_and_clear();
        }
    }

    /// Prints through the bar when one is active so lines don't tear it
    fn print_line(&self, line: String) {
        let slot = self
            .progress_bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match slot.as_ref() {
            Some(pb) if !pb.is_finished() => pb.suspend(|| eprintln!("{}", line)),
            _ => eprintln!("{}", line),
        }
    }

    fn status_label(&self, status: Status) -> String {
        let label = format!("{:<14}", status.as_str());
        if !self.colored {
            return label;
        }
        match status {
            Status::Pass => label.green().to_string(),
            Status::Fail => label.red().bold().to_string(),
            Status::Error => label.magenta().bold().to_string(),
            Status::SkippedManual => label.yellow().to_string(),
            Status::NotApplicable => label.dimmed().to_string(),
            Status::Cancelled => label.dimmed().italic().to_string(),
        }
    }
}

impl Default for StderrProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for StderrProgressReporter {
    fn report(&self, message: &str) {
        self.print_line(message.to_string());
    }

    fn report_progress(&self, current: usize, total: usize, message: Option<&str>) {
        let pb = self.get_or_create_progress_bar(total);
        pb.set_position(current as u64);
        if let Some(msg) = message {
            pb.set_message(msg.to_string());
        }
    }

    fn report_status(&self, control_id: &str, status: Status) {
        self.print_line(format!("   {} {}", self.status_label(status), control_id));
    }

    fn report_error(&self, message: &str) {
        self.finish_progress_bar();
        eprintln!("{}", message);
    }

    fn report_completion(&self, message: &str) {
        self.finish_progress_bar();
        eprintln!();
        if self.colored {
            eprintln!("{}", message.bold());
        } else {
            eprintln!("{}", message);
        }
    }
}
