//! UI context for environment detection and configuration.

use std::io::IsTerminal;

use super::mode::{Format, OutputMode};

/// Terminal and environment context for UI decisions.
#[derive(Debug, Clone)]
pub struct UiContext {
    pub is_tty: bool,
    /// Whether color output is enabled
    pub color: bool,
    /// Whether unicode symbols are enabled
    pub unicode: bool,
    /// Terminal width (columns)
    pub width: usize,
    pub mode: OutputMode,
}

impl UiContext {
    /// Inspect stdout and the environment. `format` is the `--format` flag,
    /// or the config file's `output.format` when the flag is absent.
    pub fn from_env(json: bool, format: Option<Format>, no_color: bool, ascii: bool) -> Self {
        let is_tty = std::io::stdout().is_terminal();
        let term_is_dumb = std::env::var("TERM").is_ok_and(|v| v == "dumb");
        let mode = OutputMode::resolve(json, format, is_tty, term_is_dumb);
        Self::for_mode(mode, is_tty, no_color, ascii)
    }

    fn for_mode(mode: OutputMode, is_tty: bool, no_color: bool, ascii: bool) -> Self {
        // Plain and JSON output stay free of escape codes even on a terminal.
        let color = mode.is_pretty() && !no_color && std::env::var_os("NO_COLOR").is_none();
        Self {
            is_tty,
            color,
            unicode: !ascii,
            width: terminal_width().unwrap_or(80),
            mode,
        }
    }

    /// Check if animations (spinners) are allowed.
    pub fn allows_animation(&self) -> bool {
        self.is_tty && self.mode == OutputMode::Pretty
    }

    /// Widest a single table cell should get.
    pub fn cell_width(&self) -> usize {
        (self.width / 3).clamp(16, 60)
    }
}

fn terminal_width() -> Option<usize> {
    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 {
                return Some(width);
            }
        }
    }

    #[cfg(unix)]
    {
        use std::mem::MaybeUninit;

        let mut winsize = MaybeUninit::<libc::winsize>::uninit();
        // SAFETY: TIOCGWINSZ only writes into the winsize buffer we pass.
        let result =
            unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, winsize.as_mut_ptr()) };
        if result == 0 {
            // SAFETY: ioctl returned success, so the struct was filled in.
            let ws = unsafe { winsize.assume_init() };
            if ws.ws_col > 0 {
                return Some(ws.ws_col as usize);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_never_animates() {
        let ctx = UiContext::from_env(true, None, false, false);
        assert_eq!(ctx.mode, OutputMode::Json);
        assert!(!ctx.allows_animation());
        assert!(!ctx.color);
    }

    #[test]
    fn test_plain_terminal_has_no_color() {
        let ctx = UiContext::for_mode(OutputMode::Plain, true, false, false);
        assert!(!ctx.color);
        assert!(!ctx.allows_animation());
    }

    #[test]
    fn test_no_color_flag() {
        let ctx = UiContext::for_mode(OutputMode::Pretty, true, true, false);
        assert!(!ctx.color);
        assert!(ctx.allows_animation());
    }

    #[test]
    fn test_ascii_disables_unicode() {
        let ctx = UiContext::for_mode(OutputMode::Plain, false, false, true);
        assert!(!ctx.unicode);
    }

    #[test]
    fn test_cell_width_bounds() {
        let mut ctx = UiContext::for_mode(OutputMode::Plain, false, false, false);
        ctx.width = 20;
        assert_eq!(ctx.cell_width(), 16);
        ctx.width = 600;
        assert_eq!(ctx.cell_width(), 60);
    }
}
