//! Terminal logging with coloured module prefixes.
//!
//! Every component receives a [`Logger`] by reference; there is no global
//! verbosity flag. Use the macros for formatted output:
//!
//! ```ignore
//! log!(logger, "prune"; "removed {} files", count);
//! debug!(logger, "reach"; "scanning {}", path);
//! warn!(logger, "zip"; "skipping {}", name);
//! ```

use owo_colors::OwoColorize;
use std::io::{Write, stderr, stdout};

/// How much the run prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Nothing but fatal errors.
    Quiet,
    #[default]
    Normal,
    /// Disposition of every processed file.
    Verbose,
}

/// Log sink scoped to one invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    verbosity: Verbosity,
}

/// Log a message with a coloured module prefix.
#[macro_export]
macro_rules! log {
    ($logger:expr, $module:expr; $($arg:tt)*) => {{
        $logger.log($module, &format!($($arg)*))
    }};
}

/// Log a message only when running verbosely.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $module:expr; $($arg:tt)*) => {{
        if $logger.is_verbose() {
            $logger.log($module, &format!($($arg)*))
        }
    }};
}

/// Log a warning to stderr.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $module:expr; $($arg:tt)*) => {{
        $logger.warn($module, &format!($($arg)*))
    }};
}

impl Logger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// A logger that prints nothing. Used by tests and library callers.
    pub fn silent() -> Self {
        Self::new(Verbosity::Quiet)
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity >= Verbosity::Verbose
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn log(&self, module: &str, message: &str) {
        if self.is_quiet() {
            return;
        }
        let mut out = stdout().lock();
        writeln!(out, "{} {message}", colorize_prefix(module)).ok();
    }

    pub fn warn(&self, module: &str, message: &str) {
        if self.is_quiet() {
            return;
        }
        let prefix = format!("[{module}]");
        let mut err = stderr().lock();
        writeln!(err, "{} {message}", prefix.bright_yellow().bold()).ok();
    }
}

/// Apply colour to a module prefix based on module type
fn colorize_prefix(module: &str) -> String {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "purge" | "prune" => prefix.bright_red().bold().to_string(),
        "reach" | "keep" => prefix.bright_green().bold().to_string(),
        "image" | "census" => prefix.bright_magenta().bold().to_string(),
        "search" => prefix.bright_cyan().bold().to_string(),
        "zip" | "fetch" => prefix.bright_blue().bold().to_string(),
        _ => prefix.bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_ordering_drives_debug_output() {
        assert!(Logger::new(Verbosity::Verbose).is_verbose());
        assert!(!Logger::new(Verbosity::Normal).is_verbose());
        assert!(Logger::silent().is_quiet());
        assert_eq!(Logger::default().verbosity(), Verbosity::Normal);
    }

    #[test]
    fn prefix_contains_module_name() {
        assert!(colorize_prefix("prune").contains("[prune]"));
        assert!(colorize_prefix("other").contains("[other]"));
    }
}
