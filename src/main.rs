//! Command-line entry point for epub-shrink.

use anyhow::Result;
use clap::Parser;

use epub_shrink::fsutil::format_size;
use epub_shrink::{Cli, Logger, ShrinkConfig, ShrinkReport, log, shrink, warn};

/// Exit status when the output was written but the input's manifest and
/// files disagreed.
const EXIT_DESYNC: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ShrinkConfig::from_cli(&cli)?;
    let log = Logger::new(config.verbosity);

    let report = shrink(&config, &log).await?;
    print_summary(&report, &config, &log);

    if report.has_desync() {
        warn!(log, "purge"; "manifest and archive contents were out of sync");
        std::process::exit(EXIT_DESYNC);
    }
    Ok(())
}

fn print_summary(report: &ShrinkReport, config: &ShrinkConfig, log: &Logger) {
    log!(log, "done"; "{} -> {} ({:.1}% saved) at q{}",
        format_size(report.original_size),
        format_size(report.final_size),
        report.saved_ratio() * 100.0,
        report.final_quality);
    log!(log, "done"; "{} purged, {} unreferenced removed, {} image(s), {} attempt(s)",
        report.prune.purged.len(),
        report.prune.removed.len(),
        report.images,
        report.trail.len());
    if !report.target_met {
        log!(log, "done"; "target size not reached");
    }
    if !report.warnings.is_empty() {
        log!(log, "done"; "{} warning(s):", report.warnings.len());
        for warning in &report.warnings {
            log!(log, "done"; "  {}", warning);
        }
    }
    log!(log, "done"; "written to {}", config.output.display());
}
