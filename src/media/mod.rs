pub mod ffmpeg;
pub mod jpeg;
pub mod types;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use types::{Frame, MediaDiag, VideoInfo};

/// Opens video sources. Implementations are shared by every worker.
pub trait FrameDecoder: Send + Sync {
    type Stream: FrameStream;

    fn open(&self, source: &Path) -> Result<Self::Stream>;
}

/// An open video. Dropping the stream releases the underlying handle.
pub trait FrameStream {
    fn info(&self) -> VideoInfo;

    /// Next frame in decode order, `None` once exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Persists sampled frames.
pub trait FrameWriter: Send + Sync {
    /// Makes sure `dir` exists; concurrent creation of shared parents is not an error.
    fn prepare_dir(&self, dir: &Path) -> Result<()>;

    /// Writes `frame` as the image for `second`, replacing any previous file.
    fn write_frame(&self, dir: &Path, second: u64, frame: &Frame) -> Result<PathBuf>;
}
