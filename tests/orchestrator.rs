mod common;

use common::{Fake, FakeDecoder, FlakyWriter, touch, tree};
use frame_batch::{
    config::Config,
    jobs::{VideoJob, enumerate},
    media::jpeg::JpegWriter,
    orchestrator::{Orchestrator, Strategy},
    report::{FailureKind, SampleOutcome, render},
    sampler::FrameSampler,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn scenario_source() -> tempfile::TempDir {
    let src = tempfile::tempdir().unwrap();
    touch(src.path(), "a.mp4");
    touch(src.path(), "b.mp4");
    // A directory posing as a video: listed, but not readable as a file.
    std::fs::create_dir(src.path().join("c.mp4")).unwrap();
    src
}

fn scenario_decoder() -> FakeDecoder {
    FakeDecoder::new()
        .with("a.mp4", Fake::Video { frames: 90, fps: 30.0 })
        .with("b.mp4", Fake::Video { frames: 90, fps: 0.0 })
        .with("c.mp4", Fake::Video { frames: 90, fps: 30.0 })
}

fn name_of(outcome: &SampleOutcome) -> String {
    outcome
        .job
        .source_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned()
}

#[test]
fn mixed_batch_pooled_two_workers() {
    let src = scenario_source();
    let out = tempfile::tempdir().unwrap();
    let jobs = enumerate(src.path(), out.path()).unwrap();

    let sampler = FrameSampler::new(scenario_decoder(), JpegWriter::new(&Config::default()));
    let report = Orchestrator::new(Strategy::Pooled, 2).run(&jobs, |job| sampler.sample(job));

    assert_eq!(report.strategy_name, "pooled");
    assert_eq!(report.workers, 2);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 2);

    let a = &report.outcomes[0];
    assert_eq!(name_of(a), "a.mp4");
    assert!(a.succeeded());
    assert_eq!(a.frames_written, 3);

    for outcome in &report.outcomes[1..] {
        assert_eq!(outcome.frames_written, 0);
        assert_eq!(outcome.error.as_ref().unwrap().kind, FailureKind::InvalidSource);
    }
    assert_eq!(name_of(&report.outcomes[1]), "b.mp4");
    assert_eq!(name_of(&report.outcomes[2]), "c.mp4");

    assert_eq!(tree(out.path()), ["a/frame0.jpg", "a/frame1.jpg", "a/frame2.jpg"]);
}

#[test]
fn strategies_agree_on_files_and_failures() {
    let src = scenario_source();
    touch(src.path(), "d.mov");
    touch(src.path(), "e.avi");
    let decoder = || {
        scenario_decoder()
            .with("d.mov", Fake::Video { frames: 125, fps: 25.0 })
            .with("e.avi", Fake::Breaks { ok_frames: 70, fps: 24.0 })
    };

    let seq_out = tempfile::tempdir().unwrap();
    let seq_jobs = enumerate(src.path(), seq_out.path()).unwrap();
    let seq_sampler = FrameSampler::new(decoder(), JpegWriter::new(&Config::default()));
    let seq = Orchestrator::new(Strategy::Sequential, 1).run(&seq_jobs, |j| seq_sampler.sample(j));
    assert_eq!(seq.strategy_name, "sequential");
    assert_eq!(seq.workers, 1);

    for workers in [1, 3, 8] {
        let pool_out = tempfile::tempdir().unwrap();
        let pool_jobs = enumerate(src.path(), pool_out.path()).unwrap();
        let pool_sampler = FrameSampler::new(decoder(), JpegWriter::new(&Config::default()));
        let pooled = Orchestrator::new(Strategy::Pooled, workers)
            .run(&pool_jobs, |j| pool_sampler.sample(j));
        assert_eq!(pooled.strategy_name, "pooled");
        assert_eq!(pooled.workers, workers);

        assert_eq!(tree(seq_out.path()), tree(pool_out.path()));
        assert_eq!(seq.failure_set(), pooled.failure_set());
        let counts = |r: &frame_batch::report::BatchReport| -> Vec<u64> {
            r.outcomes.iter().map(|o| o.frames_written).collect()
        };
        assert_eq!(counts(&seq), counts(&pooled));
    }
}

#[test]
fn write_failure_is_isolated() {
    let src = tempfile::tempdir().unwrap();
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        touch(src.path(), name);
    }
    let out = tempfile::tempdir().unwrap();
    let jobs = enumerate(src.path(), out.path()).unwrap();

    let decoder = FakeDecoder::new()
        .with("a.mp4", Fake::Video { frames: 60, fps: 30.0 })
        .with("b.mp4", Fake::Video { frames: 60, fps: 30.0 })
        .with("c.mp4", Fake::Video { frames: 60, fps: 30.0 });
    let sampler = FrameSampler::new(decoder, FlakyWriter::new("b", 0));
    let report = Orchestrator::new(Strategy::Pooled, 3).run(&jobs, |j| sampler.sample(j));

    assert_eq!(report.succeeded(), 2);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.source_path, src.path().join("b.mp4"));
    assert_eq!(failures[0].1.kind, FailureKind::WriteFailure);
    assert!(out.path().join("a").join("frame1.jpg").is_file());
    assert!(out.path().join("c").join("frame1.jpg").is_file());
}

#[test]
fn rerun_overwrites_with_identical_content() {
    let src = tempfile::tempdir().unwrap();
    touch(src.path(), "a.mp4");
    let out = tempfile::tempdir().unwrap();
    let jobs = enumerate(src.path(), out.path()).unwrap();
    let sampler = FrameSampler::new(
        FakeDecoder::new().with("a.mp4", Fake::Video { frames: 60, fps: 30.0 }),
        JpegWriter::new(&Config::default()),
    );
    let orchestrator = Orchestrator::new(Strategy::Pooled, 2);

    orchestrator.run(&jobs, |j| sampler.sample(j));
    let first = std::fs::read(out.path().join("a").join("frame1.jpg")).unwrap();
    let again = orchestrator.run(&jobs, |j| sampler.sample(j));
    let second = std::fs::read(out.path().join("a").join("frame1.jpg")).unwrap();

    assert!(again.outcomes[0].succeeded());
    assert_eq!(first, second);
    assert_eq!(tree(out.path()), ["a/frame0.jpg", "a/frame1.jpg"]);
}

fn synthetic_jobs(n: usize) -> Vec<VideoJob> {
    (0..n)
        .map(|i| VideoJob {
            source_path: PathBuf::from(format!("/in/{i}.mp4")),
            output_dir: PathBuf::from(format!("/out/{i}")),
        })
        .collect()
}

fn ok(job: &VideoJob) -> SampleOutcome {
    SampleOutcome {
        job: job.clone(),
        frames_written: 1,
        error: None,
    }
}

#[test]
fn pool_never_exceeds_worker_bound() {
    let jobs = synthetic_jobs(12);
    let in_flight = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);

    let report = Orchestrator::new(Strategy::Pooled, 3).run(&jobs, |job| {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(15));
        in_flight.fetch_sub(1, Ordering::SeqCst);
        ok(job)
    });

    assert_eq!(report.outcomes.len(), 12);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[test]
fn outcomes_follow_dispatch_order() {
    let jobs = synthetic_jobs(6);
    let report = Orchestrator::new(Strategy::Pooled, 6).run(&jobs, |job| {
        // Early jobs finish last.
        let index: u64 = job
            .source_path
            .file_stem()
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        std::thread::sleep(Duration::from_millis((6 - index) * 10));
        ok(job)
    });

    let order: Vec<_> = report.outcomes.iter().map(|o| o.job.clone()).collect();
    assert_eq!(order, jobs);
}

#[test]
fn empty_batch_reports_nothing() {
    let report = Orchestrator::new(Strategy::Pooled, 4).run(&[], ok);
    assert!(report.outcomes.is_empty());
    assert_eq!(report.failed(), 0);
}

#[test]
fn render_lists_every_failure() {
    let src = scenario_source();
    let out = tempfile::tempdir().unwrap();
    let jobs = enumerate(src.path(), out.path()).unwrap();
    let sampler = FrameSampler::new(scenario_decoder(), JpegWriter::new(&Config::default()));
    let report = Orchestrator::new(Strategy::Sequential, 1).run(&jobs, |j| sampler.sample(j));

    let text = render(&report);
    assert!(text.starts_with("strategy=sequential workers=1 "));
    assert!(text.contains("succeeded=1 failed=2"));
    let b = Path::new(src.path()).join("b.mp4");
    assert!(text.contains(&format!("FAILED {} InvalidSource", b.display())));
    assert_eq!(text.matches("FAILED").count(), 2);
}
