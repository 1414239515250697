//! End-to-end run: extract, purge, prune, census, search.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::{Input, ShrinkConfig};
use crate::driver::CompressionDriver;
use crate::error::Warning;
use crate::images::{Census, ImageCodec, ToolCodec};
use crate::io::{LocalFileReader, ReadAt, fetch_remote};
use crate::logger::Logger;
use crate::package::Package;
use crate::reach::{KeepSet, ReachabilityEngine};
use crate::rules::{purge, seed_keep_set};
use crate::zip::ZipExtractor;
use crate::{debug, log};

/// Outcome of purge plus reachability on an exploded tree.
#[derive(Debug, Default)]
pub struct PruneSummary {
    pub purged: Vec<String>,
    pub removed: Vec<String>,
    pub kept: KeepSet,
    pub warnings: Vec<Warning>,
}

/// Purge, seed, prune and write the package document back.
///
/// Only a missing or unreadable package document fails; everything else
/// is reported through [`PruneSummary::warnings`].
pub fn prune_tree(root: &Path, extra_patterns: &[String], log: &Logger) -> Result<PruneSummary> {
    let mut package = Package::load(root)?;
    log!(log, "prune"; "{} ({} manifest items)", package.opf_path(), package.len());

    let purged = purge(&mut package, root, extra_patterns, log);
    let seed = seed_keep_set(&package, log);
    debug!(log, "keep"; "{} seeded path(s)", seed.len());

    let pruned = ReachabilityEngine::new(root, log).prune(&mut package, &seed);
    package.write(root)?;
    log!(log, "prune"; "purged {}, removed {} unreferenced, kept {}",
        purged.removed.len(), pruned.removed.len(), pruned.kept.len());

    let mut warnings = purged.warnings;
    warnings.extend(pruned.warnings);
    Ok(PruneSummary {
        purged: purged.removed,
        removed: pruned.removed,
        kept: pruned.kept,
        warnings,
    })
}

#[derive(Debug)]
pub struct ShrinkReport {
    pub original_size: u64,
    pub final_size: u64,
    pub final_quality: u8,
    /// `(quality, size)` of every attempt.
    pub trail: Vec<(u8, u64)>,
    pub target_met: bool,
    pub images: usize,
    pub prune: PruneSummary,
    /// Prune warnings followed by those of the kept compression attempt.
    pub warnings: Vec<Warning>,
}

impl ShrinkReport {
    /// Fraction of the original size saved, in `0.0..=1.0` unless the
    /// output grew.
    pub fn saved_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        1.0 - self.final_size as f64 / self.original_size as f64
    }

    /// Whether any manifest/disk desync was found.
    pub fn has_desync(&self) -> bool {
        self.warnings.iter().any(Warning::is_desync)
    }
}

/// Shrink the configured input into the configured output.
pub async fn shrink(config: &ShrinkConfig, log: &Logger) -> Result<ShrinkReport> {
    let tools = ToolCodec::detect();
    if !tools.has_tools() {
        debug!(log, "image"; "no jpegoptim/oxipng on PATH, lossless pass uses the built-in encoders");
    }
    let codec: Arc<dyn ImageCodec> = Arc::new(tools);
    match &config.input {
        Input::Local(path) => {
            let reader = Arc::new(LocalFileReader::new(path)?);
            shrink_archive(reader, config, codec, log).await
        }
        Input::Remote(url) => {
            let reader = Arc::new(fetch_remote(url, log).await?);
            shrink_archive(reader, config, codec, log).await
        }
    }
}

pub async fn shrink_archive<R: ReadAt + 'static>(
    reader: Arc<R>,
    config: &ShrinkConfig,
    codec: Arc<dyn ImageCodec>,
    log: &Logger,
) -> Result<ShrinkReport> {
    let original_size = reader.size();
    let workspace = tempfile::Builder::new().prefix("epub-shrink-").tempdir()?;
    let root = workspace.path().join("book");

    let files = ZipExtractor::new(reader).extract_all(&root).await?;
    log!(log, "zip"; "extracted {} file(s)", files.len());

    let prune = prune_tree(&root, &config.purge_patterns, log)?;
    let census = Census::take(&root, config.search.estimate_source_quality, log);

    let driver = CompressionDriver::new(config.search, codec, config.jobs, log)?;
    let search = driver.run(&root, &census, &config.output).await?;

    let mut warnings = prune.warnings.clone();
    warnings.extend(search.warnings);
    Ok(ShrinkReport {
        original_size,
        final_size: search.attempt.size,
        final_quality: search.attempt.quality,
        trail: search.trail,
        target_met: search.target_met,
        images: census.len(),
        prune,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchPolicy;
    use crate::images::NativeCodec;
    use crate::logger::Verbosity;
    use crate::testing::write_book;
    use crate::zip::{TYPE_MARKER, repack};
    use std::fs;

    fn config(input: &Path, output: &Path) -> ShrinkConfig {
        ShrinkConfig {
            input: Input::Local(input.to_path_buf()),
            output: output.to_path_buf(),
            search: SearchPolicy::default(),
            purge_patterns: Vec::new(),
            jobs: Some(2),
            verbosity: Verbosity::Quiet,
        }
    }

    #[test]
    fn prune_tree_applies_purge_then_reachability() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_book(root);

        let summary = prune_tree(root, &[], &Logger::silent()).unwrap();
        assert_eq!(
            summary.purged,
            vec!["OEBPS/Text/Generic Cross Sales.xhtml", "OEBPS/.DS_Store"]
        );
        // promo.png was only linked from the purged page
        assert!(summary.removed.iter().any(|p| p == "OEBPS/Images/promo.png"));
        assert!(!root.join("OEBPS/Images/promo.png").exists());
        assert!(summary.warnings.is_empty());

        let opf = fs::read_to_string(root.join("OEBPS/content.opf")).unwrap();
        assert!(!opf.contains("promo.png"));
        assert!(!opf.contains("Cross%20Sales"));
        assert!(!opf.contains(r#"idref="cross""#));
        assert!(opf.contains("Images/img1.png"));
    }

    #[tokio::test]
    async fn shrinks_an_archive_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("book");
        write_book(&book);
        let input = dir.path().join("book.epub");
        repack(&book, &input).await.unwrap();
        let output = dir.path().join("book-min.epub");

        let config = config(&input, &output);
        let reader = Arc::new(LocalFileReader::new(&input).unwrap());
        let report = shrink_archive(reader, &config, Arc::new(NativeCodec), &Logger::silent())
            .await
            .unwrap();

        assert_eq!(report.final_quality, 100);
        assert_eq!(report.trail.len(), 1);
        assert!(report.final_size < report.original_size);
        assert!(report.saved_ratio() > 0.0);
        assert!(!report.has_desync());

        let reader = Arc::new(LocalFileReader::new(&output).unwrap());
        let names: Vec<String> = ZipExtractor::new(reader)
            .list_files()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.file_name)
            .collect();
        assert_eq!(names[0], TYPE_MARKER);
        for kept in ["OEBPS/Text/a.xhtml", "OEBPS/Images/img1.png", "OEBPS/Fonts/font1.woff"] {
            assert!(names.iter().any(|n| n == kept), "{kept} missing");
        }
        for gone in ["OEBPS/Images/img3.png", "OEBPS/Fonts/font2.woff", "OEBPS/.DS_Store"] {
            assert!(!names.iter().any(|n| n == gone), "{gone} still present");
        }
    }

    #[tokio::test]
    async fn dotfiles_survive_unless_purged() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("book");
        write_book(&book);

        // A declared and linked stylesheet whose name starts with a dot
        let opf_path = book.join("OEBPS/content.opf");
        let opf = fs::read_to_string(&opf_path).unwrap().replace(
            "</manifest>",
            r#"<item id="dotcss" href=".fonts.css" media-type="text/css"/></manifest>"#,
        );
        fs::write(&opf_path, opf).unwrap();
        let chapter_path = book.join("OEBPS/Text/a.xhtml");
        let chapter = fs::read_to_string(&chapter_path).unwrap().replace(
            "</head>",
            r#"<link rel="stylesheet" href="../.fonts.css"/></head>"#,
        );
        fs::write(&chapter_path, chapter).unwrap();
        fs::write(book.join("OEBPS/.fonts.css"), "body { margin: 0 }").unwrap();

        // Undeclared dotfiles no purge pattern names
        fs::write(book.join("OEBPS/.keep"), "").unwrap();
        fs::write(book.join("META-INF/.meta"), "x").unwrap();

        let input = dir.path().join("book.epub");
        repack(&book, &input).await.unwrap();
        let output = dir.path().join("book-min.epub");

        let config = config(&input, &output);
        let reader = Arc::new(LocalFileReader::new(&input).unwrap());
        let report = shrink_archive(reader, &config, Arc::new(NativeCodec), &Logger::silent())
            .await
            .unwrap();
        assert!(!report.has_desync());

        let reader = Arc::new(LocalFileReader::new(&output).unwrap());
        let names: Vec<String> = ZipExtractor::new(reader)
            .list_files()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.file_name)
            .collect();
        for kept in ["OEBPS/.fonts.css", "OEBPS/.keep", "META-INF/.meta"] {
            assert!(names.iter().any(|n| n == kept), "{kept} missing");
        }
        assert!(!names.iter().any(|n| n == "OEBPS/.DS_Store"));
    }

    #[tokio::test]
    async fn missing_purge_target_is_reported_as_desync() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("book");
        write_book(&book);
        fs::remove_file(book.join("OEBPS/Text/Generic Cross Sales.xhtml")).unwrap();
        let input = dir.path().join("book.epub");
        repack(&book, &input).await.unwrap();

        let config = config(&input, &dir.path().join("out.epub"));
        let reader = Arc::new(LocalFileReader::new(&input).unwrap());
        let report = shrink_archive(reader, &config, Arc::new(NativeCodec), &Logger::silent())
            .await
            .unwrap();
        assert!(report.has_desync());
        assert!(dir.path().join("out.epub").exists());
    }

    #[tokio::test]
    async fn archive_without_package_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("book");
        fs::create_dir_all(&book).unwrap();
        fs::write(book.join(TYPE_MARKER), "application/epub+zip").unwrap();
        let input = dir.path().join("empty.epub");
        repack(&book, &input).await.unwrap();

        let output = dir.path().join("out.epub");
        let config = config(&input, &output);
        let reader = Arc::new(LocalFileReader::new(&input).unwrap());
        let err = shrink_archive(reader, &config, Arc::new(NativeCodec), &Logger::silent())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::ShrinkError>(),
            Some(crate::error::ShrinkError::MissingPackage(_))
        ));
        assert!(!output.exists());
    }
}
