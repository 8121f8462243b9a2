use crate::{
    config::Config,
    jobs,
    media::{ffmpeg::FfmpegDecoder, jpeg::JpegWriter},
    orchestrator::{Orchestrator, Strategy},
    report::{self, BatchReport},
    sampler::FrameSampler,
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "frame-batch")]
#[command(about = "Sample one frame per second from every video in a folder")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./frame-batch.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct BatchPaths {
    /// Folder of videos (defaults to paths.source_dir).
    #[arg(long)]
    pub source: Option<PathBuf>,
    /// Folder receiving one sub-folder per video (defaults to paths.output_root).
    #[arg(long)]
    pub out_root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that ffmpeg and ffprobe can be run.
    Doctor {},
    /// List the jobs a run would dispatch, without decoding.
    Plan {
        #[command(flatten)]
        paths: BatchPaths,
    },
    Run {
        #[command(flatten)]
        paths: BatchPaths,
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
        /// Worker count for the pooled strategy.
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Run sequentially, then pooled, into separate sub-folders and compare timings.
    Compare {
        #[command(flatten)]
        paths: BatchPaths,
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let mut cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Doctor {} => {
            cfg.validate()?;
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            doctor(&cfg)
        }
        Command::Plan { paths } => {
            apply_paths(&mut cfg, paths);
            cfg.validate()?;
            let _guard = init_logging(&args, &cfg, None)?;
            plan(&cfg)
        }
        Command::Run {
            paths,
            strategy,
            concurrency,
        } => {
            apply_paths(&mut cfg, paths);
            if let Some(s) = strategy {
                cfg.batch.strategy = *s;
            }
            if let Some(n) = concurrency {
                cfg.batch.concurrency = *n;
            }
            cfg.validate()?;
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            run(&cfg)
        }
        Command::Compare { paths, concurrency } => {
            apply_paths(&mut cfg, paths);
            if let Some(n) = concurrency {
                cfg.batch.concurrency = *n;
            }
            cfg.validate()?;
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            compare(&cfg)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("frame-batch.toml");
    default.exists().then_some(default)
}

fn apply_paths(cfg: &mut Config, paths: &BatchPaths) {
    if let Some(src) = &paths.source {
        cfg.paths.source_dir = src.display().to_string();
    }
    if let Some(out) = &paths.out_root {
        cfg.paths.output_root = out.display().to_string();
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.paths.output_root).join("frame-batch.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let diag = FfmpegDecoder::new(cfg).doctor();
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn plan(cfg: &Config) -> Result<()> {
    let jobs = jobs::enumerate(
        Path::new(&cfg.paths.source_dir),
        Path::new(&cfg.paths.output_root),
    )?;
    println!("{}", serde_json::to_string_pretty(&jobs)?);
    Ok(())
}

fn run(cfg: &Config) -> Result<()> {
    let source = Path::new(&cfg.paths.source_dir);
    let out_root = Path::new(&cfg.paths.output_root);
    execute_batch(cfg, source, out_root, cfg.batch.strategy)?;
    Ok(())
}

fn compare(cfg: &Config) -> Result<()> {
    let source = Path::new(&cfg.paths.source_dir);
    let out_root = Path::new(&cfg.paths.output_root);

    let seq = execute_batch(cfg, source, &out_root.join("sequential"), Strategy::Sequential)?;
    let pooled = execute_batch(cfg, source, &out_root.join("pooled"), Strategy::Pooled)?;

    if seq.failure_set() != pooled.failure_set() {
        warn!("strategies disagree on failed jobs; inspect both reports");
    }

    let speedup = if pooled.duration_seconds > 0.0 {
        seq.duration_seconds / pooled.duration_seconds
    } else {
        0.0
    };
    println!(
        "sequential={:.3}s pooled({})={:.3}s speedup={:.2}x",
        seq.duration_seconds, pooled.workers, pooled.duration_seconds, speedup
    );
    Ok(())
}

/// Enumerates, samples and reports one batch into `out_root`.
fn execute_batch(
    cfg: &Config,
    source: &Path,
    out_root: &Path,
    strategy: Strategy,
) -> Result<BatchReport> {
    let jobs = jobs::enumerate(source, out_root)?;
    if let Err(err) = ensure_dir(out_root) {
        // Each job reports its own WriteFailure; the batch still runs.
        warn!("output root unavailable: {err:#}");
    }
    info!(
        "source={} out={} jobs={}",
        source.display(),
        out_root.display(),
        jobs.len()
    );

    let sampler = FrameSampler::new(FfmpegDecoder::new(cfg), JpegWriter::new(cfg));
    let orchestrator = Orchestrator::new(strategy, cfg.batch.concurrency);

    let started = now_rfc3339();
    let report = orchestrator.run(&jobs, |job| sampler.sample(job));
    let finished = now_rfc3339();

    if cfg.batch.print_summary {
        report::emit(&report);
    } else {
        info!(
            "batch done strategy={} duration={:.3}s succeeded={} failed={}",
            report.strategy_name,
            report.duration_seconds,
            report.succeeded(),
            report.failed()
        );
    }

    report::write_batch_artifacts(cfg, source, out_root, &report, started, finished);

    Ok(report)
}
