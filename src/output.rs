//! # Output Styling
//!
//! Decides whether terminal output is coloured and offers small helpers for
//! the coloured fragments of the reporter lines.
//!
//! Colour is chosen from the `--color` flag (`always`, `never`, `auto`). In
//! `auto` mode it is turned off by `NO_COLOR` (any value), `CLICOLOR=0` or
//! `TERM=dumb`, forced on by `CLICOLOR_FORCE`, and otherwise follows whether
//! stdout is a terminal.

use std::env;

use console::style;

/// Output configuration for controlling colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Builds the configuration from the value of `--color`.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    pub fn green(&self, text: impl std::fmt::Display) -> String {
        self.paint(text, Tint::Green)
    }

    pub fn red(&self, text: impl std::fmt::Display) -> String {
        self.paint(text, Tint::Red)
    }

    pub fn yellow(&self, text: impl std::fmt::Display) -> String {
        self.paint(text, Tint::Yellow)
    }

    fn paint(&self, text: impl std::fmt::Display, tint: Tint) -> String {
        if !self.use_color {
            return text.to_string();
        }
        let styled = style(text.to_string()).force_styling(true);
        match tint {
            Tint::Green => styled.green(),
            Tint::Red => styled.red(),
            Tint::Yellow => styled.yellow(),
        }
        .to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

#[derive(Debug, Clone, Copy)]
enum Tint {
    Green,
    Red,
    Yellow,
}
