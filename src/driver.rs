//! Quality search over whole-archive attempts.
//!
//! Each attempt copies the pruned baseline into its own scratch directory,
//! recompresses every image at the attempt's quality, repacks and measures.
//! The baseline itself is never written to.

use anyhow::{Context, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::{LOSSLESS, SearchPolicy};
use crate::error::Warning;
use crate::fsutil::{copy_tree, format_size};
use crate::images::{Census, ImageAsset, ImageCodec, compress_all};
use crate::logger::Logger;
use crate::zip::repack;
use crate::{debug, log};

/// Where the search stands for a given quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Lossless,
    LossySearch(u8),
    Converged,
}

impl SearchState {
    pub fn of(quality: Option<u8>) -> Self {
        match quality {
            None => SearchState::Converged,
            Some(q) if q >= LOSSLESS => SearchState::Lossless,
            Some(q) => SearchState::LossySearch(q),
        }
    }
}

/// Quality to try after an attempt at `current` produced `size` bytes, or
/// `None` once the search has converged.
///
/// The sequence is strictly decreasing and never drops below the floor.
/// Leaving lossless with a source estimate jumps straight to one below it,
/// since re-encoding above the source quality cannot shrink anything.
pub fn next_quality(
    policy: &SearchPolicy,
    current: u8,
    size: u64,
    source_estimate: Option<u8>,
) -> Option<u8> {
    let target_met = policy.target_size.is_none_or(|target| size <= target);
    if target_met || current <= policy.floor {
        return None;
    }

    let mut next = current.saturating_sub(policy.step);
    if current >= LOSSLESS {
        if let Some(estimate) = source_estimate {
            next = next.min(estimate.saturating_sub(1));
        }
    }
    Some(next.max(policy.floor))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionAttempt {
    pub quality: u8,
    pub size: u64,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct SearchOutcome {
    /// The kept attempt; `path` is the final output location.
    pub attempt: CompressionAttempt,
    /// `(quality, size)` of every attempt, in order.
    pub trail: Vec<(u8, u64)>,
    pub target_met: bool,
    /// Compression failures of the kept attempt.
    pub warnings: Vec<Warning>,
}

pub struct CompressionDriver<'a> {
    policy: SearchPolicy,
    codec: Arc<dyn ImageCodec>,
    pool: Arc<ThreadPool>,
    log: &'a Logger,
}

impl<'a> CompressionDriver<'a> {
    pub fn new(
        policy: SearchPolicy,
        codec: Arc<dyn ImageCodec>,
        jobs: Option<usize>,
        log: &'a Logger,
    ) -> Result<Self> {
        policy.validate()?;
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("image-{i}"));
        if let Some(jobs) = jobs {
            builder = builder.num_threads(jobs);
        }
        let pool = builder.build().context("cannot start image workers")?;

        Ok(Self {
            policy,
            codec,
            pool: Arc::new(pool),
            log,
        })
    }

    /// Search for the highest quality whose archive fits the target and
    /// write that archive to `output`.
    pub async fn run(&self, baseline: &Path, census: &Census, output: &Path) -> Result<SearchOutcome> {
        let scratch = tempfile::Builder::new()
            .prefix("epub-shrink-search-")
            .tempdir()?;
        let assets: Arc<Vec<ImageAsset>> = Arc::new(census.assets().cloned().collect());
        let source_estimate = if self.policy.estimate_source_quality {
            census.max_source_quality()
        } else {
            None
        };
        if let Some(estimate) = source_estimate {
            debug!(self.log, "search"; "source quality estimate: {}", estimate);
        }

        let mut quality = self.policy.initial_quality;
        let mut trail = Vec::new();
        // Dropping an attempt's directory deletes it, so only the latest survives
        let mut last: Option<(CompressionAttempt, Vec<Warning>, TempDir)> = None;

        for _ in 0..self.policy.max_attempts() {
            let (attempt, warnings, dir) = self
                .attempt(baseline, scratch.path(), &assets, quality)
                .await?;
            log!(self.log, "search"; "q{}: {}", quality, format_size(attempt.size));
            trail.push((quality, attempt.size));

            let next = next_quality(&self.policy, quality, attempt.size, source_estimate);
            last = Some((attempt, warnings, dir));
            debug!(self.log, "search"; "{:?} -> {:?}", SearchState::of(Some(quality)), SearchState::of(next));
            let Some(q) = next else {
                break;
            };
            quality = q;
        }

        let (mut attempt, warnings, _dir) =
            last.context("quality search made no attempt")?;
        let target_met = self
            .policy
            .target_size
            .is_none_or(|target| attempt.size <= target);
        if !target_met {
            log!(self.log, "search"; "target not reached; stopping at the floor (q{})", attempt.quality);
        }

        tokio::fs::copy(&attempt.path, output)
            .await
            .with_context(|| format!("cannot write {}", output.display()))?;
        attempt.path = output.to_path_buf();

        Ok(SearchOutcome {
            attempt,
            trail,
            target_met,
            warnings,
        })
    }

    async fn attempt(
        &self,
        baseline: &Path,
        scratch: &Path,
        assets: &Arc<Vec<ImageAsset>>,
        quality: u8,
    ) -> Result<(CompressionAttempt, Vec<Warning>, TempDir)> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("q{quality}-"))
            .tempdir_in(scratch)?;
        let tree = dir.path().join("tree");

        let warnings = {
            let baseline = baseline.to_path_buf();
            let tree = tree.clone();
            let codec = Arc::clone(&self.codec);
            let pool = Arc::clone(&self.pool);
            let assets = Arc::clone(assets);
            let log = *self.log;
            tokio::task::spawn_blocking(move || -> Result<Vec<Warning>> {
                copy_tree(&baseline, &tree)?;
                Ok(compress_all(codec.as_ref(), &tree, &assets, quality, &pool, &log))
            })
            .await??
        };

        let path = dir.path().join("attempt.epub");
        let size = repack(&tree, &path).await?;
        Ok((CompressionAttempt { quality, size, path }, warnings, dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::RasterFormat;
    use crate::testing::write_book;

    fn policy(target: Option<u64>) -> SearchPolicy {
        SearchPolicy {
            target_size: target,
            ..SearchPolicy::default()
        }
    }

    #[test]
    fn no_target_stops_after_one_attempt() {
        assert_eq!(next_quality(&policy(None), 100, 10_000, None), None);
    }

    #[test]
    fn met_target_stops() {
        assert_eq!(next_quality(&policy(Some(500)), 80, 500, None), None);
        assert_eq!(next_quality(&policy(Some(500)), 80, 501, None), Some(75));
    }

    #[test]
    fn unreachable_target_walks_down_to_the_floor() {
        let policy = policy(Some(1));
        let mut sequence = vec![100u8];
        while let Some(q) = next_quality(&policy, *sequence.last().unwrap(), 1_000, None) {
            sequence.push(q);
        }
        let expected: Vec<u8> = (3..=20).rev().map(|i| i * 5).collect();
        assert_eq!(sequence, expected);
        assert!(sequence.len() <= policy.max_attempts());
    }

    #[test]
    fn uneven_step_clamps_to_the_floor() {
        let policy = SearchPolicy {
            step: 40,
            ..policy(Some(1))
        };
        assert_eq!(next_quality(&policy, 100, 10, None), Some(60));
        assert_eq!(next_quality(&policy, 60, 10, None), Some(20));
        assert_eq!(next_quality(&policy, 20, 10, None), Some(15));
        assert_eq!(next_quality(&policy, 15, 10, None), None);
    }

    #[test]
    fn source_estimate_shortcuts_the_first_step() {
        let policy = policy(Some(1));
        assert_eq!(next_quality(&policy, 100, 10, Some(72)), Some(71));
        // Only the transition out of lossless uses it
        assert_eq!(next_quality(&policy, 71, 10, Some(72)), Some(66));
        // Never above an ordinary step, never below the floor
        assert_eq!(next_quality(&policy, 100, 10, Some(99)), Some(95));
        assert_eq!(next_quality(&policy, 100, 10, Some(3)), Some(15));
    }

    #[test]
    fn states() {
        assert_eq!(SearchState::of(Some(100)), SearchState::Lossless);
        assert_eq!(SearchState::of(Some(40)), SearchState::LossySearch(40));
        assert_eq!(SearchState::of(None), SearchState::Converged);
    }

    /// Writes a file whose size tracks the quality, so archive size falls
    /// with every attempt.
    struct SizedByQuality;

    impl ImageCodec for SizedByQuality {
        fn compress(&self, path: &Path, _format: RasterFormat, quality: u8) -> Result<()> {
            let mut state = 0x2545_F491u32;
            let bytes: Vec<u8> = (0..usize::from(quality) * 200)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    state as u8
                })
                .collect();
            std::fs::write(path, bytes)?;
            Ok(())
        }
    }

    async fn search(target: Option<u64>) -> (SearchOutcome, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let baseline = dir.path().join("book");
        write_book(&baseline);
        let log = Logger::silent();
        let census = Census::take(&baseline, false, &log);
        let driver =
            CompressionDriver::new(policy(target), Arc::new(SizedByQuality), Some(2), &log).unwrap();
        let output = dir.path().join("out.epub");
        let outcome = driver.run(&baseline, &census, &output).await.unwrap();
        (outcome, dir)
    }

    #[tokio::test]
    async fn reachable_target_is_met() {
        let (unbounded, _dir) = search(None).await;
        assert_eq!(unbounded.trail.len(), 1);
        let lossless = unbounded.attempt.size;

        // Reachable part-way down
        let (outcome, dir) = search(Some(lossless * 7 / 10)).await;
        assert!(outcome.target_met);
        assert!(outcome.attempt.size <= lossless * 7 / 10);
        assert!(outcome.attempt.quality < 100 && outcome.attempt.quality > 15);
        assert!(outcome.trail.windows(2).all(|w| w[1].0 < w[0].0 && w[1].1 <= w[0].1));
        assert_eq!(outcome.attempt.path, dir.path().join("out.epub"));
        assert!(outcome.attempt.path.exists());
    }

    #[tokio::test]
    async fn unreachable_target_stops_at_the_floor() {
        let (outcome, _dir) = search(Some(1)).await;
        assert!(!outcome.target_met);
        assert_eq!(outcome.attempt.quality, 15);
        assert_eq!(outcome.trail.len(), 18);
    }

    #[tokio::test]
    async fn baseline_is_never_modified() {
        let dir = tempfile::tempdir().unwrap();
        let baseline = dir.path().join("book");
        write_book(&baseline);
        let before = std::fs::read(baseline.join("OEBPS/Images/img1.png")).unwrap();

        let log = Logger::silent();
        let census = Census::take(&baseline, false, &log);
        let driver = CompressionDriver::new(policy(Some(1)), Arc::new(SizedByQuality), None, &log).unwrap();
        driver
            .run(&baseline, &census, &dir.path().join("out.epub"))
            .await
            .unwrap();

        assert_eq!(std::fs::read(baseline.join("OEBPS/Images/img1.png")).unwrap(), before);
    }
}
