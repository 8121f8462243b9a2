use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// 0 when the container does not say.
    pub total_frames: u64,
    pub frame_rate: f64,
}

impl VideoInfo {
    /// Frames per sampled second, truncated to a whole number.
    /// `None` when that rounds to zero.
    pub fn sample_interval(&self) -> Option<u64> {
        if !self.frame_rate.is_finite() || self.frame_rate < 1.0 {
            return None;
        }
        Some(self.frame_rate as u64)
    }
}

/// Packed RGB8 pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDiag {
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

// ffprobe -of json output, only the fields we read.

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProbeOut {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProbeStream {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub avg_frame_rate: Option<String>,
    pub r_frame_rate: Option<String>,
    pub nb_frames: Option<String>,
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: ProbeTags,
    #[serde(default)]
    pub side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ProbeTags {
    pub rotate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProbeSideData {
    /// Integer, float or string depending on the ffprobe version.
    pub rotation: Option<serde_json::Value>,
}
