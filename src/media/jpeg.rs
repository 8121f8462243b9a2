use super::{FrameWriter, types::Frame};
use crate::{config::Config, util::ensure_dir};
use anyhow::{Context, Result, bail};
use image::{ExtendedColorType, ImageEncoder, codecs::jpeg::JpegEncoder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes `<dir>/<prefix><second>.jpg`.
pub struct JpegWriter {
    prefix: String,
    quality: u8,
}

impl JpegWriter {
    pub fn new(cfg: &Config) -> Self {
        Self {
            prefix: cfg.output.image_prefix.clone(),
            quality: cfg.output.jpeg_quality,
        }
    }

    pub fn file_name(&self, second: u64) -> String {
        format!("{}{}.jpg", self.prefix, second)
    }
}

impl FrameWriter for JpegWriter {
    fn prepare_dir(&self, dir: &Path) -> Result<()> {
        ensure_dir(dir)
    }

    fn write_frame(&self, dir: &Path, second: u64, frame: &Frame) -> Result<PathBuf> {
        if frame.data.len() != Frame::byte_len(frame.width, frame.height) {
            bail!(
                "frame buffer is {} bytes, expected {}x{} RGB",
                frame.data.len(),
                frame.width,
                frame.height
            );
        }

        let path = dir.join(self.file_name(second));
        let file =
            File::create(&path).with_context(|| format!("create image: {}", path.display()))?;
        let mut out = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .write_image(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
            .with_context(|| format!("encode jpeg: {}", path.display()))?;
        out.flush()
            .with_context(|| format!("flush image: {}", path.display()))?;
        Ok(path)
    }
}
