//! Terminal notifier
//!
//! Writes messages to stdout/stderr. Used when no chat transport is wired in,
//! and handy for dry runs.

use super::Notifier;
use crate::domain::ChannelId;
use crate::error::SendError;
use std::io::{self, Write};

/// Terminal/console notifier
pub struct TerminalNotifier {
    /// Use stderr instead of stdout
    use_stderr: bool,
    /// Use colors (ANSI escape codes)
    use_colors: bool,
}

impl TerminalNotifier {
    /// Create a notifier that writes to stderr
    pub fn stderr() -> Self {
        Self {
            use_stderr: true,
            use_colors: Self::supports_color(),
        }
    }

    /// Create a notifier that writes to stdout
    pub fn stdout() -> Self {
        Self {
            use_stderr: false,
            use_colors: Self::supports_color(),
        }
    }

    /// Enable or disable ANSI colors
    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.use_colors = enabled && Self::supports_color();
        self
    }

    /// Check if terminal supports colors
    fn supports_color() -> bool {
        std::env::var("TERM")
            .map(|term| term != "dumb")
            .unwrap_or(false)
    }

    fn render(&self, channel: &ChannelId, text: &str) -> String {
        let stamp = chrono::Utc::now().format("%H:%M:%S");
        let header = if self.use_colors {
            format!("\x1b[36m#{}\x1b[0m", channel)
        } else {
            format!("#{}", channel)
        };

        let mut out = format!("[{}] {}", stamp, header);
        for line in text.lines() {
            out.push_str("\n    ");
            out.push_str(line);
        }
        out
    }
}

impl Notifier for TerminalNotifier {
    fn send(&self, channel: &ChannelId, text: &str) -> Result<(), SendError> {
        let message = self.render(channel, text);

        let result = if self.use_stderr {
            let stderr = io::stderr();
            let mut handle = stderr.lock();
            writeln!(handle, "{}", message)
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", message)
        };

        result.map_err(|e| SendError::Transient(e.to_string()))
    }

    fn name(&self) -> &str {
        "terminal"
    }
}
