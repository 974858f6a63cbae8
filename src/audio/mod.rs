//! Audio handling: extraction from video, PCM decoding and chunk planning.

mod extract;
mod pcm;
mod planner;

pub use extract::{extract_audio, video_id_from_path, EXTRACT_SAMPLE_RATE};
pub use pcm::PcmAudio;
pub use planner::{AudioChunk, ChunkLimits, ChunkPlanner, WAV_HEADER_ALLOWANCE};

