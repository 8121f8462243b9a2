use crate::{
    jobs::VideoJob,
    media::{FrameDecoder, FrameStream, FrameWriter},
    report::{JobFailure, SampleOutcome},
};
use tracing::{debug, info};

/// Writes one frame per elapsed second of a single video.
pub struct FrameSampler<D, W> {
    decoder: D,
    writer: W,
}

impl<D: FrameDecoder, W: FrameWriter> FrameSampler<D, W> {
    pub fn new(decoder: D, writer: W) -> Self {
        Self { decoder, writer }
    }

    /// Never fails: problems are recorded in the returned outcome.
    pub fn sample(&self, job: &VideoJob) -> SampleOutcome {
        let mut frames_written = 0;
        let error = self.sample_into(job, &mut frames_written).err();
        SampleOutcome {
            job: job.clone(),
            frames_written,
            error,
        }
    }

    fn sample_into(&self, job: &VideoJob, written: &mut u64) -> Result<(), JobFailure> {
        let mut stream = self
            .decoder
            .open(&job.source_path)
            .map_err(|e| JobFailure::invalid_source(format!("{e:#}")))?;

        let info = stream.info();
        let Some(every) = info.sample_interval() else {
            return Err(JobFailure::invalid_source(format!(
                "frame rate is zero ({})",
                info.frame_rate
            )));
        };

        info!(
            "sampling {} total_frames={} fps={} out={}",
            job.source_path.display(),
            info.total_frames,
            info.frame_rate,
            job.output_dir.display()
        );

        self.writer
            .prepare_dir(&job.output_dir)
            .map_err(JobFailure::write)?;

        let mut index: u64 = 0;
        while let Some(frame) = stream
            .next_frame()
            .map_err(|e| JobFailure::invalid_source(format!("decode failed at frame {index}: {e:#}")))?
        {
            if index % every == 0 {
                let second = index / every;
                let path = self
                    .writer
                    .write_frame(&job.output_dir, second, &frame)
                    .map_err(JobFailure::write)?;
                *written += 1;
                debug!("wrote {}", path.display());
            }
            index += 1;
        }

        Ok(())
    }
}
