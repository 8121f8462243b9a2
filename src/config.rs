use crate::orchestrator::Strategy;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub batch: Batch,
    #[serde(default)]
    pub decoder: Decoder,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.concurrency == 0 {
            bail!("batch.concurrency must be at least 1");
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            bail!(
                "output.jpeg_quality must be within 1..=100, got {}",
                self.output.jpeg_quality
            );
        }
        if self.output.image_prefix.contains(['/', '\\']) {
            bail!("output.image_prefix must not contain path separators");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub source_dir: String,
    pub output_root: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            source_dir: "data/video".into(),
            output_root: "data/image".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Batch {
    pub strategy: Strategy,
    pub concurrency: usize,
    pub print_summary: bool,
    pub write_summary_json: bool,
    pub summary_filename: String,
}
impl Default for Batch {
    fn default() -> Self {
        Self {
            strategy: Strategy::Pooled,
            concurrency: 4,
            print_summary: true,
            write_summary_json: true,
            summary_filename: "batch-summary.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Decoder {
    pub ffmpeg_exe: String,
    pub ffprobe_exe: String,
    pub probe_timeout_seconds: u64,
}
impl Default for Decoder {
    fn default() -> Self {
        Self {
            ffmpeg_exe: "ffmpeg".into(),
            ffprobe_exe: "ffprobe".into(),
            probe_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub image_prefix: String,
    pub jpeg_quality: u8,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            image_prefix: "frame".into(),
            jpeg_quality: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub dump_effective_config: bool,
}
