use super::{
    FrameDecoder, FrameStream,
    types::{Frame, MediaDiag, ProbeOut, ProbeStream, VideoInfo},
};
use crate::config::Config;
use anyhow::{Context, Result, anyhow, bail};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Decodes through the `ffprobe`/`ffmpeg` command line tools, one child
/// process per open stream.
pub struct FfmpegDecoder {
    ffmpeg_exe: PathBuf,
    ffprobe_exe: PathBuf,
    probe_timeout: Duration,
}

impl FfmpegDecoder {
    pub fn new(cfg: &Config) -> Self {
        Self {
            ffmpeg_exe: expand_tilde(&cfg.decoder.ffmpeg_exe),
            ffprobe_exe: expand_tilde(&cfg.decoder.ffprobe_exe),
            probe_timeout: Duration::from_secs(cfg.decoder.probe_timeout_seconds.max(1)),
        }
    }

    pub fn doctor(&self) -> MediaDiag {
        let ffmpeg = tool_version(&self.ffmpeg_exe);
        let ffprobe = tool_version(&self.ffprobe_exe);
        let error = match (&ffmpeg, &ffprobe) {
            (Err(e), _) | (_, Err(e)) => Some(format!("{e:#}")),
            _ => None,
        };
        MediaDiag {
            ok: error.is_none(),
            ffmpeg: ffmpeg.ok(),
            ffprobe: ffprobe.ok(),
            error,
        }
    }

    fn probe(&self, source: &Path) -> Result<VideoInfo> {
        debug!(
            "ffprobe {} timeout={:?}",
            source.display(),
            self.probe_timeout
        );
        let child = Command::new(&self.ffprobe_exe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,duration\
                 :stream_tags=rotate:stream_side_data=rotation",
                "-of",
                "json",
            ])
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {}", self.ffprobe_exe.display()))?;

        let output = wait_with_timeout(child, self.probe_timeout)?;
        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed on {}: {}",
                source.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let probe: ProbeOut = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing ffprobe JSON output: {}", source.display()))?;
        probe_to_info(&probe).with_context(|| format!("no usable video stream: {}", source.display()))
    }
}

impl FrameDecoder for FfmpegDecoder {
    type Stream = FfmpegStream;

    fn open(&self, source: &Path) -> Result<FfmpegStream> {
        if !source.is_file() {
            bail!("not a readable file: {}", source.display());
        }
        let info = self.probe(source)?;

        // ffmpeg autorotates; -s pins the output to the display size we report.
        let size_arg = format!("{}x{}", info.width, info.height);
        let mut child = Command::new(&self.ffmpeg_exe)
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(source)
            .args([
                "-vsync", "0", "-s", &size_arg, "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {}", self.ffmpeg_exe.display()))?;

        let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;
        let stderr_reader = child.stderr.take();
        // Drain stderr so a chatty decoder never blocks on a full pipe.
        let stderr = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr_reader {
                let _ = err.read_to_end(&mut buf);
            }
            buf
        });

        let frame_len = Frame::byte_len(info.width, info.height);
        Ok(FfmpegStream {
            info,
            frame_len,
            child,
            stdout: BufReader::with_capacity(frame_len.clamp(64 * 1024, 8 * 1024 * 1024), stdout),
            stderr: Some(stderr),
            finished: false,
        })
    }
}

pub struct FfmpegStream {
    info: VideoInfo,
    frame_len: usize,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    finished: bool,
}

impl FfmpegStream {
    fn take_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|h| h.join().ok())
            .map(|b| String::from_utf8_lossy(&b).trim().to_string())
            .unwrap_or_default()
    }
}

impl FrameStream for FfmpegStream {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let mut data = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut data) {
            Ok(()) => Ok(Some(Frame {
                width: self.info.width,
                height: self.info.height,
                data,
            })),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.finished = true;
                let status = self.child.wait().with_context(|| "waiting for ffmpeg")?;
                if status.success() {
                    Ok(None)
                } else {
                    Err(anyhow!("ffmpeg exited with {status}: {}", self.take_stderr()))
                }
            }
            Err(e) => {
                self.finished = true;
                Err(e).with_context(|| "reading decoded frame")
            }
        }
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        let _ = self.take_stderr();
    }
}

fn probe_to_info(probe: &ProbeOut) -> Result<VideoInfo> {
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| anyhow!("ffprobe reported no video stream"))?;

    let coded_w = stream.width.unwrap_or(0);
    let coded_h = stream.height.unwrap_or(0);
    if coded_w == 0 || coded_h == 0 {
        bail!("video stream has no dimensions");
    }
    let (width, height) = match rotation(stream).rem_euclid(360) {
        90 | 270 => (coded_h, coded_w),
        _ => (coded_w, coded_h),
    };

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .filter(|r| *r > 0.0)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(0.0);

    let total_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .or_else(|| {
            let secs: f64 = stream.duration.as_deref()?.trim().parse().ok()?;
            Some((secs * frame_rate).round() as u64)
        })
        .unwrap_or(0);

    Ok(VideoInfo {
        width,
        height,
        total_frames,
        frame_rate,
    })
}

/// Display rotation in whole degrees, from the side data (newer ffmpeg) or the
/// legacy `rotate` tag.
fn rotation(stream: &ProbeStream) -> i64 {
    let from_side_data = stream
        .side_data_list
        .iter()
        .filter_map(|sd| sd.rotation.as_ref())
        .find_map(|v| match v {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
    let degrees = from_side_data
        .or_else(|| stream.tags.rotate.as_deref()?.trim().parse().ok())
        .unwrap_or(0.0);
    degrees.round() as i64
}

/// Parses ffprobe rationals such as `30000/1001`. `0/0` yields `Some(0.0)`.
fn parse_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 { Some(0.0) } else { Some(num / den) }
        }
        None => raw.parse().ok(),
    }
}

fn tool_version(exe: &Path) -> Result<String> {
    let out = Command::new(exe)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("running {} -version", exe.display()))?;
    if !out.status.success() {
        bail!("{} -version exited with {}", exe.display(), out.status);
    }
    Ok(String::from_utf8_lossy(&out.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string())
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<Output> {
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            break status;
        }
        if start.elapsed() > timeout {
            warn!("ffprobe timed out after {:?}", timeout);
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_thread.join();
            let _ = stderr_thread.join();
            bail!("ffprobe exceeded timeout ({:?})", timeout);
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    let stdout = stdout_thread
        .join()
        .map_err(|_| anyhow!("stdout reader thread panicked"))??;
    let stderr = stderr_thread
        .join()
        .map_err(|_| anyhow!("stderr reader thread panicked"))??;
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}
