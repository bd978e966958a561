//! Spinner for populate runs, drawn with indicatif on stderr.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::context::UiContext;
use super::render::badge;
use super::theme::{spinner_frames, Badge};

/// An indeterminate progress line.
///
/// The runtime blocks the main thread while notes are populated, so the
/// bar ticks from indicatif's own thread.
pub struct Spinner<'a> {
    ctx: &'a UiContext,
    message: String,
    bar: Option<ProgressBar>,
}

fn spinner_style(unicode: bool) -> ProgressStyle {
    let mut ticks = spinner_frames(unicode).to_vec();
    // indicatif shows the last tick string once the bar is finished.
    ticks.push("");
    let template = if unicode {
        "{spinner:.cyan} {msg}..."
    } else {
        "{spinner} {msg}..."
    };
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&ticks)
}

impl<'a> Spinner<'a> {
    pub fn new(ctx: &'a UiContext, message: &str) -> Self {
        let bar = ctx.allows_animation().then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style(ctx.unicode));
            bar.set_message(message.to_string());
            bar
        });
        Self {
            ctx,
            message: message.to_string(),
            bar,
        }
    }

    /// Begin ticking, or print the message once when not animating.
    pub fn start(&self) {
        match &self.bar {
            Some(bar) => bar.enable_steady_tick(Duration::from_millis(80)),
            None if !self.ctx.mode.is_json() => eprintln!("{}...", self.message),
            None => {}
        }
    }

    fn clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Finish with a success badge.
    pub fn finish(&self, message: &str) {
        self.clear();
        if !self.ctx.mode.is_json() {
            eprintln!("{}", badge(self.ctx, Badge::Ok, message));
        }
    }

    /// Finish with a warning badge.
    pub fn finish_warn(&self, message: &str) {
        self.clear();
        if !self.ctx.mode.is_json() {
            eprintln!("{}", badge(self.ctx, Badge::Warn, message));
        }
    }

    /// Clear the line without a message; used before an error is printed.
    pub fn abandon(&self) {
        self.clear();
    }
}
