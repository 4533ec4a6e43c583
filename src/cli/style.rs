//! Terminal styling helpers

use owo_colors::{OwoColorize, Stream, Style};

/// Check mark used in summaries
pub const CHECK: &str = "✓";

/// Styling shortcuts that respect `NO_COLOR` and non-tty output
pub trait Stylize: std::fmt::Display + Sized {
    /// Bold text for headings
    fn emphasis(&self) -> String {
        styled(self, Style::new().bold())
    }

    /// Highlighted values (branch names, counts)
    fn accent(&self) -> String {
        styled(self, Style::new().cyan())
    }

    /// De-emphasized text
    fn muted(&self) -> String {
        styled(self, Style::new().dimmed())
    }

    /// Successful outcomes
    fn success(&self) -> String {
        styled(self, Style::new().green())
    }

    /// Non-fatal problems
    fn warn(&self) -> String {
        styled(self, Style::new().yellow())
    }

    /// Errors
    fn error(&self) -> String {
        styled(self, Style::new().red().bold())
    }
}

impl<T: std::fmt::Display> Stylize for T {}

fn styled(value: &impl std::fmt::Display, style: Style) -> String {
    value
        .if_supports_color(Stream::Stdout, |v| v.style(style))
        .to_string()
}

/// Green check mark
pub fn check() -> String {
    CHECK.success()
}

/// Arrow used for list items
pub fn arrow() -> String {
    "→".muted()
}
