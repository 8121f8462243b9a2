use crate::{config::Config, jobs::VideoJob, util::sha256_hex};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The video could not be opened, reported a zero frame rate, or broke while decoding.
    InvalidSource,
    /// An image or directory could not be written.
    WriteFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidSource => f.write_str("InvalidSource"),
            FailureKind::WriteFailure => f.write_str("WriteFailure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct JobFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl JobFailure {
    pub fn invalid_source(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InvalidSource,
            detail: detail.into(),
        }
    }

    pub fn write(err: anyhow::Error) -> Self {
        Self {
            kind: FailureKind::WriteFailure,
            detail: format!("{err:#}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleOutcome {
    pub job: VideoJob,
    /// Frames on disk for this job, including those written before a failure.
    pub frames_written: u64,
    pub error: Option<JobFailure>,
}

impl SampleOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub strategy_name: String,
    /// Configured worker bound; 1 for sequential runs.
    pub workers: usize,
    /// In dispatch order.
    pub outcomes: Vec<SampleOutcome>,
    pub duration_seconds: f64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&VideoJob, &JobFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error.as_ref().map(|e| (&o.job, e)))
    }

    pub fn frames_written(&self) -> u64 {
        self.outcomes.iter().map(|o| o.frames_written).sum()
    }

    /// Which job failed with which kind; comparable across strategies.
    pub fn failure_set(&self) -> BTreeSet<(PathBuf, FailureKind)> {
        self.failures()
            .map(|(job, err)| (job.source_path.clone(), err.kind))
            .collect()
    }
}

/// Human-readable summary: header line, then one line per failed job.
pub fn render(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "strategy={} workers={} duration={:.3}s jobs={} succeeded={} failed={} frames={}",
        report.strategy_name,
        report.workers,
        report.duration_seconds,
        report.outcomes.len(),
        report.succeeded(),
        report.failed(),
        report.frames_written(),
    );
    for (job, err) in report.failures() {
        let _ = writeln!(
            out,
            "  FAILED {} {}: {}",
            job.source_path.display(),
            err.kind,
            err.detail
        );
    }
    out
}

pub fn emit(report: &BatchReport) {
    for (job, err) in report.failures() {
        warn!(
            "job failed source={} kind={} {}",
            job.source_path.display(),
            err.kind,
            err.detail
        );
    }
    info!(
        "batch done strategy={} duration={:.3}s succeeded={} failed={}",
        report.strategy_name,
        report.duration_seconds,
        report.succeeded(),
        report.failed()
    );
    print!("{}", render(report));
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub source_dir: PathBuf,
    pub output_root: PathBuf,
    pub started: String,
    pub finished: String,
    pub report: BatchReport,
}

/// Writes the summary JSON and, when enabled, the effective config into
/// `out_root`. The batch has already finished, so failures are only logged.
pub fn write_batch_artifacts(
    cfg: &Config,
    source: &Path,
    out_root: &Path,
    report: &BatchReport,
    started: String,
    finished: String,
) {
    if cfg.batch.write_summary_json {
        let cfg_hash = sha256_hex(cfg.normalized_for_hash().as_bytes());
        let run_id = sha256_hex(format!("{}:{}", cfg_hash, source.display()).as_bytes());
        let summary = BatchSummary {
            run_id,
            source_dir: source.to_path_buf(),
            output_root: out_root.to_path_buf(),
            started,
            finished,
            report: report.clone(),
        };
        let path = out_root.join(&cfg.batch.summary_filename);
        if let Err(err) = write_json(&path, &summary) {
            warn!("summary not written: {err:#}");
        }
    }

    if cfg.debug.dump_effective_config {
        let path = out_root.join("effective-config.toml");
        let raw = toml::to_string(cfg).unwrap_or_default();
        if let Err(err) = std::fs::write(&path, raw) {
            warn!("effective config not written to {}: {err}", path.display());
        }
    }
}

fn write_json(path: &Path, summary: &BatchSummary) -> Result<()> {
    let raw = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, raw).with_context(|| format!("write summary: {}", path.display()))
}
