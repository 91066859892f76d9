//! # Output Configuration
//!
//! Controls how the CLI renders results: colors and emoji status markers are
//! used only when the terminal and the user's preferences allow them.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use asset_shelf::output::{marker, OutputConfig, Status};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//!
//! // Status markers fall back to `[OK]`, `[FAIL]`, ... without color
//! println!("{} rename 'Chair'", marker(&config, Status::Done));
//! ```

use std::env;

use console::style;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// # Behavior
    /// - `--color=always`: Force colors on (overrides NO_COLOR)
    /// - `--color=never`: Force colors off
    /// - `--color=auto`: Detect based on environment
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    ///
    /// The decision is also handed to `console`, so styled markers follow it.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        console::set_colors_enabled(use_color);
        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // NO_COLOR disables colors even when empty (https://no-color.org/)
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        // CLICOLOR_FORCE wins over TTY detection
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        // TTY and color support as seen by console
        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the appropriate string based on color configuration.
///
/// When colors are enabled, returns the emoji. When disabled, returns
/// the plain text alternative.
///
/// # Arguments
/// * `config` - The output configuration
/// * `emoji_str` - The emoji to use when colors are enabled
/// * `plain` - The plain text to use when colors are disabled
///
/// # Example
/// ```rust,ignore
/// let config = OutputConfig::from_env_and_flag("auto");
/// println!("{} Bundled 3 asset(s)", emoji(&config, "📦", "[BUNDLE]"));
/// ```
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Result category of one line of CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Unchanged,
    Skipped,
    DryRun,
    Warning,
    Failed,
}

/// Leading marker for a status line.
///
/// An emoji when colors are enabled, a bracketed tag such as `[OK]` or
/// `[FAIL]` otherwise. Either form is styled by status; `console` drops the
/// styling when colors are off.
pub fn marker(config: &OutputConfig, status: Status) -> String {
    let (icon, plain) = match status {
        Status::Done => ("✅", "[OK]"),
        Status::Unchanged => ("➖", "[SAME]"),
        Status::Skipped => ("⏭️", "[SKIP]"),
        Status::DryRun => ("📝", "[PLAN]"),
        Status::Warning => ("⚠️", "[WARN]"),
        Status::Failed => ("❌", "[FAIL]"),
    };
    let text = emoji(config, icon, plain);
    match status {
        Status::Done => style(text).green().to_string(),
        Status::Warning | Status::Skipped => style(text).yellow().to_string(),
        Status::Failed => style(text).red().bold().to_string(),
        Status::Unchanged | Status::DryRun => style(text).dim().to_string(),
    }
}
