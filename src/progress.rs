use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};

const SPINNER_TEMPLATE: &str = "{spinner:.dim} {msg}";
const COUNTER_TEMPLATE: &str = "{spinner:.dim} {msg} {pos}/{len}";

/// Stderr progress for a stage: a spinner, or a spinner with a `done/total`
/// count when the stage works through a known number of files.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: impl Into<String>) -> Self {
        Self::start(ProgressBar::new_spinner(), SPINNER_TEMPLATE, message)
    }

    /// A spinner that counts up to `total` via [`inc`](Self::inc).
    pub fn counter(total: usize, message: impl Into<String>) -> Self {
        Self::start(ProgressBar::new(total as u64), COUNTER_TEMPLATE, message)
    }

    fn start(bar: ProgressBar, template: &str, message: impl Into<String>) -> Self {
        bar.set_style(
            ProgressStyle::default_spinner()
                .template(template)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.into());
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }

    /// Clear the spinner and print a `✔ message` line to stderr.
    pub fn finish(self, message: impl Into<String>) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", "✔".green(), message.into());
    }

    /// Print a `! message` line above the spinner without stopping it.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        self.bar
            .suspend(|| eprintln!("{} {}", "!".yellow().bold(), message));
    }
}
