//! Per-invocation configuration.
//!
//! Built once from [`Cli`] and passed down by reference; nothing here is
//! process-global.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::logger::Verbosity;

/// Lossless quality level.
pub const LOSSLESS: u8 = 100;
pub const DEFAULT_FLOOR: u8 = 15;
pub const DEFAULT_STEP: u8 = 5;

/// Where the input archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Local(PathBuf),
    Remote(String),
}

impl Input {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Input::Remote(raw.to_string())
        } else {
            Input::Local(PathBuf::from(raw))
        }
    }

    /// File stem used to derive the default output name.
    fn stem(&self) -> String {
        let name = match self {
            Input::Local(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            Input::Remote(url) => {
                let tail = url
                    .split(['?', '#'])
                    .next()
                    .unwrap_or_default()
                    .rsplit('/')
                    .next()
                    .unwrap_or_default();
                Path::new(tail)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default()
            }
        };
        if name.is_empty() { "book".to_string() } else { name }
    }

    /// Default output: `<stem>-min.epub` beside a local input, or in the
    /// working directory for a remote one.
    pub fn default_output(&self) -> PathBuf {
        let file_name = format!("{}-min.epub", self.stem());
        match self {
            Input::Local(path) => path.with_file_name(file_name),
            Input::Remote(_) => PathBuf::from(file_name),
        }
    }
}

/// Quality search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPolicy {
    pub initial_quality: u8,
    pub floor: u8,
    pub step: u8,
    /// Target archive size in bytes.
    pub target_size: Option<u64>,
    pub estimate_source_quality: bool,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            initial_quality: LOSSLESS,
            floor: DEFAULT_FLOOR,
            step: DEFAULT_STEP,
            target_size: None,
            estimate_source_quality: true,
        }
    }
}

impl SearchPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.initial_quality > LOSSLESS || self.floor > LOSSLESS {
            bail!("quality values must lie in 0..=100");
        }
        if self.step == 0 {
            bail!("quality step must be at least 1");
        }
        Ok(())
    }

    /// Upper bound on attempts: `(100 - floor) / step + 2`.
    pub fn max_attempts(&self) -> usize {
        (LOSSLESS.saturating_sub(self.floor) / self.step.max(1)) as usize + 2
    }
}

#[derive(Debug, Clone)]
pub struct ShrinkConfig {
    pub input: Input,
    pub output: PathBuf,
    pub search: SearchPolicy,
    /// Extra purge globs on top of the built-in defaults.
    pub purge_patterns: Vec<String>,
    /// Image worker threads; `None` lets rayon decide.
    pub jobs: Option<usize>,
    pub verbosity: Verbosity,
}

impl ShrinkConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let input = Input::parse(&cli.input);
        let output = cli
            .output
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| input.default_output());

        let target_size = match cli.target_size {
            Some(kb) => match kb.checked_mul(1024) {
                Some(bytes) => Some(bytes),
                None => bail!("--targetsize {} KB does not fit in a byte count", kb),
            },
            None => None,
        };

        let search = SearchPolicy {
            initial_quality: cli.quality,
            floor: cli.floor,
            step: cli.step,
            target_size,
            estimate_source_quality: !cli.no_estimate,
        };
        search.validate()?;

        if let Some(0) = cli.jobs {
            bail!("--jobs must be at least 1");
        }

        let verbosity = if cli.quiet {
            Verbosity::Quiet
        } else if cli.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };

        Ok(Self {
            input,
            output,
            search,
            purge_patterns: cli.ignore.clone(),
            jobs: cli.jobs,
            verbosity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(args: &[&str]) -> Result<ShrinkConfig> {
        let mut argv = vec!["epub-shrink"];
        argv.extend_from_slice(args);
        ShrinkConfig::from_cli(&Cli::try_parse_from(argv)?)
    }

    #[test]
    fn default_output_sits_beside_local_input() {
        let cfg = config(&["books/novel.epub"]).unwrap();
        assert_eq!(cfg.output, PathBuf::from("books/novel-min.epub"));
        assert_eq!(cfg.input, Input::Local(PathBuf::from("books/novel.epub")));
    }

    #[test]
    fn remote_output_uses_url_file_name() {
        let cfg = config(&["https://example.com/dl/novel.epub?token=1"]).unwrap();
        assert_eq!(cfg.output, PathBuf::from("novel-min.epub"));
        let cfg = config(&["https://example.com/"]).unwrap();
        assert_eq!(cfg.output, PathBuf::from("book-min.epub"));
    }

    #[test]
    fn target_size_is_converted_to_bytes() {
        let cfg = config(&["a.epub", "-t", "300", "-v"]).unwrap();
        assert_eq!(cfg.search.target_size, Some(300 * 1024));
        assert_eq!(cfg.verbosity, Verbosity::Verbose);
    }

    #[test]
    fn target_size_that_overflows_bytes_is_rejected() {
        let max = u64::MAX.to_string();
        let err = config(&["a.epub", "-t", &max]).unwrap_err();
        assert!(err.to_string().contains("--targetsize"));

        let largest = (u64::MAX / 1024).to_string();
        let cfg = config(&["a.epub", "-t", &largest]).unwrap();
        assert_eq!(cfg.search.target_size, Some(u64::MAX / 1024 * 1024));
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(config(&["a.epub", "-j", "0"]).is_err());
    }

    #[test]
    fn attempt_bound_matches_floor_and_step() {
        let policy = SearchPolicy::default();
        assert_eq!(policy.max_attempts(), 19);
        let policy = SearchPolicy { floor: 100, ..SearchPolicy::default() };
        assert_eq!(policy.max_attempts(), 2);
    }
}
