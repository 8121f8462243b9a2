#![allow(dead_code)]

use anyhow::{Result, bail};
use frame_batch::{
    config::Config,
    media::{Frame, FrameDecoder, FrameStream, FrameWriter, VideoInfo, jpeg::JpegWriter},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy)]
pub enum Fake {
    Video { frames: u64, fps: f64 },
    /// Decodes `ok_frames` frames, then the decoder errors.
    Breaks { ok_frames: u64, fps: f64 },
}

/// Decoder keyed by file name. Unknown names and non-files fail to open.
#[derive(Default)]
pub struct FakeDecoder {
    videos: HashMap<String, Fake>,
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, fake: Fake) -> Self {
        self.videos.insert(name.to_string(), fake);
        self
    }
}

impl FrameDecoder for FakeDecoder {
    type Stream = FakeStream;

    fn open(&self, source: &Path) -> Result<FakeStream> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if !source.is_file() {
            bail!("not a readable file: {}", source.display());
        }
        let Some(fake) = self.videos.get(name).copied() else {
            bail!("unknown video: {name}");
        };
        self.opened.fetch_add(1, Ordering::SeqCst);

        let (frames, fps, fail_at) = match fake {
            Fake::Video { frames, fps } => (frames, fps, None),
            Fake::Breaks { ok_frames, fps } => (u64::MAX, fps, Some(ok_frames)),
        };
        Ok(FakeStream {
            info: VideoInfo {
                width: 4,
                height: 2,
                total_frames: if fail_at.is_some() { 0 } else { frames },
                frame_rate: fps,
            },
            frames,
            fail_at,
            index: 0,
            released: self.released.clone(),
        })
    }
}

pub struct FakeStream {
    info: VideoInfo,
    frames: u64,
    fail_at: Option<u64>,
    index: u64,
    released: Arc<AtomicUsize>,
}

impl FrameStream for FakeStream {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.index) {
            bail!("corrupt packet");
        }
        if self.index >= self.frames {
            return Ok(None);
        }
        let shade = (self.index % 251) as u8;
        self.index += 1;
        Ok(Some(Frame {
            width: 4,
            height: 2,
            data: vec![shade; Frame::byte_len(4, 2)],
        }))
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Real JPEG writer that refuses one (leaf dir, second) pair.
pub struct FlakyWriter {
    inner: JpegWriter,
    fail_leaf: String,
    fail_second: u64,
}

impl FlakyWriter {
    pub fn new(fail_leaf: &str, fail_second: u64) -> Self {
        Self {
            inner: JpegWriter::new(&Config::default()),
            fail_leaf: fail_leaf.to_string(),
            fail_second,
        }
    }
}

impl FrameWriter for FlakyWriter {
    fn prepare_dir(&self, dir: &Path) -> Result<()> {
        self.inner.prepare_dir(dir)
    }

    fn write_frame(&self, dir: &Path, second: u64, frame: &Frame) -> Result<PathBuf> {
        let leaf = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if leaf == self.fail_leaf && second == self.fail_second {
            bail!("disk full");
        }
        self.inner.write_frame(dir, second, frame)
    }
}

pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, b"not really a video").unwrap();
    p
}

/// Relative paths of every file under `root`, sorted.
pub fn tree(root: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let rel = path.strip_prefix(base).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    if root.exists() {
        walk(root, root, &mut out);
    }
    out.sort();
    out
}
