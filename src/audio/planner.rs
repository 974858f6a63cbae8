//! Splits audio into chunks that respect the transcription service's limits.

use super::PcmAudio;
use crate::error::{KapittelError, Result};
use tracing::{debug, info, instrument};

/// Bytes reserved for the WAV header when checking the size limit.
///
/// Covers both the plain (44 byte) and the extensible (68 byte) header.
pub const WAV_HEADER_ALLOWANCE: usize = 80;

/// Upper bounds for one chunk, imposed by the transcription service.
#[derive(Debug, Clone, Copy)]
pub struct ChunkLimits {
    pub max_duration_seconds: f64,
    pub max_bytes: usize,
}

/// A contiguous slice of the source audio, ready to upload.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Position of this chunk in the plan.
    pub index: usize,
    /// Start of the chunk relative to the source, in seconds.
    pub start_offset: f64,
    /// End of the chunk relative to the source, in seconds.
    pub end_offset: f64,
    /// Self-contained WAV file.
    pub payload: Vec<u8>,
}

impl AudioChunk {
    pub fn duration(&self) -> f64 {
        self.end_offset - self.start_offset
    }
}

/// Plans contiguous, non-overlapping chunks over a whole stream.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    limits: ChunkLimits,
}

impl ChunkPlanner {
    pub fn new(limits: ChunkLimits) -> Self {
        Self { limits }
    }

    /// Largest number of frames a chunk may hold under both limits.
    pub fn frames_per_chunk(&self, audio: &PcmAudio) -> Result<usize> {
        let rate = audio.spec().sample_rate as f64;

        let max_duration = self.limits.max_duration_seconds;
        if max_duration.is_nan() || max_duration <= 0.0 {
            return Err(KapittelError::InvalidInput(format!(
                "Chunk duration limit must be positive, got {}",
                max_duration
            )));
        }

        let by_duration = (max_duration * rate).floor() as usize;
        let by_bytes = self.limits.max_bytes.saturating_sub(WAV_HEADER_ALLOWANCE) / audio.block_align();
        let frames = by_duration.min(by_bytes);

        if frames == 0 {
            return Err(KapittelError::InvalidInput(format!(
                "Chunk limits ({}s, {} bytes) cannot hold a single audio frame",
                self.limits.max_duration_seconds, self.limits.max_bytes
            )));
        }

        debug!(
            "Chunk size: {} frames (duration allows {}, size allows {})",
            frames, by_duration, by_bytes
        );
        Ok(frames)
    }

    /// Split the audio into chunks covering it from start to end.
    #[instrument(skip_all, fields(duration = audio.duration_seconds()))]
    pub fn plan(&self, audio: &PcmAudio) -> Result<Vec<AudioChunk>> {
        let total_frames = audio.frames();
        if total_frames == 0 {
            return Err(KapittelError::InvalidInput(
                "Audio duration must be greater than zero".to_string(),
            ));
        }

        let frames_per_chunk = self.frames_per_chunk(audio)?;

        let mut chunks = Vec::with_capacity(total_frames.div_ceil(frames_per_chunk));
        let mut start = 0;

        while start < total_frames {
            let end = (start + frames_per_chunk).min(total_frames);
            chunks.push(AudioChunk {
                index: chunks.len(),
                start_offset: audio.frame_time(start),
                end_offset: audio.frame_time(end),
                payload: audio.encode_frames(start..end)?,
            });
            start = end;
        }

        info!("Planned {} audio chunks", chunks.len());
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm::mono_spec;

    fn silence(seconds: f64, sample_rate: u32) -> PcmAudio {
        let frames = (seconds * sample_rate as f64).round() as usize;
        PcmAudio::new(mono_spec(sample_rate), vec![0; frames]).unwrap()
    }

    fn planner(max_duration_seconds: f64) -> ChunkPlanner {
        ChunkPlanner::new(ChunkLimits {
            max_duration_seconds,
            max_bytes: usize::MAX,
        })
    }

    #[test]
    fn test_twenty_five_minutes_in_ten_minute_chunks() {
        let audio = silence(25.0 * 60.0, 100);
        let chunks = planner(600.0).plan(&audio).unwrap();

        let durations: Vec<f64> = chunks.iter().map(|c| c.duration()).collect();
        assert_eq!(durations, vec![600.0, 600.0, 300.0]);
        assert_eq!(chunks[2].end_offset, 1500.0);
    }

    #[test]
    fn test_short_stream_is_one_chunk() {
        let audio = silence(42.0, 100);
        let chunks = planner(600.0).plan(&audio).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_offset, 0.0);
        assert_eq!(chunks[0].end_offset, 42.0);
    }

    #[test]
    fn test_zero_duration_is_invalid() {
        let audio = PcmAudio::new(mono_spec(100), vec![]).unwrap();
        let err = planner(600.0).plan(&audio).unwrap_err();
        assert!(matches!(err, KapittelError::InvalidInput(_)));
    }

    #[test]
    fn test_byte_limit_binds_first() {
        let audio = silence(10.0, 100);
        // 200 bytes of samples = 100 frames = 1 second per chunk
        let chunks = ChunkPlanner::new(ChunkLimits {
            max_duration_seconds: 600.0,
            max_bytes: WAV_HEADER_ALLOWANCE + 200,
        })
        .plan(&audio)
        .unwrap();

        assert_eq!(chunks.len(), 10);
        for chunk in &chunks {
            assert!(chunk.payload.len() <= WAV_HEADER_ALLOWANCE + 200);
            assert!((chunk.duration() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_limits_too_small_for_a_frame() {
        let audio = silence(1.0, 100);
        let err = ChunkPlanner::new(ChunkLimits {
            max_duration_seconds: 60.0,
            max_bytes: 10,
        })
        .plan(&audio)
        .unwrap_err();
        assert!(matches!(err, KapittelError::InvalidInput(_)));
    }

    #[test]
    fn test_chunks_are_contiguous_and_bounded() {
        for &duration in &[0.01, 1.0, 59.99, 60.0, 61.0, 333.33, 1799.5] {
            for &limit in &[0.5, 7.0, 60.0, 600.0] {
                let audio = silence(duration, 100);
                let chunks = planner(limit).plan(&audio).unwrap();

                assert_eq!(chunks[0].start_offset, 0.0);
                assert_eq!(chunks.last().unwrap().end_offset, audio.duration_seconds());
                for (i, chunk) in chunks.iter().enumerate() {
                    assert_eq!(chunk.index, i);
                    assert!(chunk.duration() <= limit + 1e-9);
                    assert!(chunk.duration() > 0.0);
                }
                for pair in chunks.windows(2) {
                    assert_eq!(pair[0].end_offset, pair[1].start_offset);
                }
                let total: f64 = chunks.iter().map(|c| c.duration()).sum();
                assert!((total - audio.duration_seconds()).abs() < 1e-6);
            }
        }
    }
}
