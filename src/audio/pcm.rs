//! In-memory PCM audio and WAV encoding of frame ranges.

use crate::error::{KapittelError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Cursor, Read};
use std::ops::Range;
use std::path::Path;

/// Decoded 16-bit PCM audio, interleaved by channel.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    spec: WavSpec,
    samples: Vec<i16>,
}

impl PcmAudio {
    /// Wrap already decoded samples.
    pub fn new(spec: WavSpec, samples: Vec<i16>) -> Result<Self> {
        if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
            return Err(KapittelError::Audio(format!(
                "Unsupported sample format: {} bit {:?} (expected 16 bit integer PCM)",
                spec.bits_per_sample, spec.sample_format
            )));
        }
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(KapittelError::Audio(
                "Audio must have at least one channel and a non-zero sample rate".to_string(),
            ));
        }
        if samples.len() % spec.channels as usize != 0 {
            return Err(KapittelError::Audio(format!(
                "Sample count {} is not a multiple of {} channels",
                samples.len(),
                spec.channels
            )));
        }
        Ok(Self { spec, samples })
    }

    /// Read a WAV file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path)
            .map_err(|e| KapittelError::Audio(format!("Cannot open {}: {}", path.display(), e)))?;
        Self::from_wav_reader(reader)
    }

    /// Read WAV data from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let reader = WavReader::new(reader)
            .map_err(|e| KapittelError::Audio(format!("Invalid WAV data: {}", e)))?;
        Self::from_wav_reader(reader)
    }

    fn from_wav_reader<R: Read>(mut reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let samples = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| KapittelError::Audio(format!("Failed to decode samples: {}", e)))?;
        Self::new(spec, samples)
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.spec.channels as usize
    }

    /// Bytes per frame in the encoded payload.
    pub fn block_align(&self) -> usize {
        self.spec.channels as usize * 2
    }

    /// Time of a frame boundary in seconds.
    pub fn frame_time(&self, frame: usize) -> f64 {
        frame as f64 / self.spec.sample_rate as f64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_time(self.frames())
    }

    /// Encode a range of frames as a standalone WAV file.
    pub fn encode_frames(&self, frames: Range<usize>) -> Result<Vec<u8>> {
        let channels = self.spec.channels as usize;
        let samples = &self.samples[frames.start * channels..frames.end * channels];

        let mut buffer = Vec::with_capacity(samples.len() * 2 + 64);
        {
            let mut writer = WavWriter::new(Cursor::new(&mut buffer), self.spec)
                .map_err(|e| KapittelError::Audio(format!("WAV encoding failed: {}", e)))?;
            for sample in samples {
                writer
                    .write_sample(*sample)
                    .map_err(|e| KapittelError::Audio(format!("WAV encoding failed: {}", e)))?;
            }
            writer
                .finalize()
                .map_err(|e| KapittelError::Audio(format!("WAV encoding failed: {}", e)))?;
        }
        Ok(buffer)
    }
}

#[cfg(test)]
pub(crate) fn mono_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}
