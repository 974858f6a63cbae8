//! Audio extraction from video containers using ffmpeg.

use crate::error::{KapittelError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Sample rate requested from ffmpeg. Speech models resample to 16kHz anyway.
pub const EXTRACT_SAMPLE_RATE: u32 = 16_000;

/// Derive a stable video ID from a file path.
///
/// Uses the file stem with everything but ASCII alphanumerics, `-` and `_`
/// replaced by `_`.
pub fn video_id_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");

    let id: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if id.is_empty() {
        "video".to_string()
    } else {
        id
    }
}

/// Extracts the audio track of a video as 16kHz mono 16-bit WAV.
///
/// If the target file already exists it is reused without running ffmpeg.
#[instrument(skip(output_dir), fields(video = %video_path.display()))]
pub async fn extract_audio(video_path: &Path, output_dir: &Path) -> Result<PathBuf> {
    if !video_path.exists() {
        return Err(KapittelError::InvalidInput(format!(
            "Video file not found: {}",
            video_path.display()
        )));
    }

    std::fs::create_dir_all(output_dir)?;
    let target_path = output_dir.join(format!("{}.wav", video_id_from_path(video_path)));

    if target_path.exists() {
        info!("Using cached audio file");
        return Ok(target_path);
    }

    debug!("Extracting audio to {:?}", target_path);

    let result = Command::new("ffmpeg")
        .arg("-i").arg(video_path)
        .arg("-vn")
        .arg("-ac").arg("1")
        .arg("-ar").arg(EXTRACT_SAMPLE_RATE.to_string())
        .arg("-c:a").arg("pcm_s16le")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(&target_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => {
            info!("Extracted audio track");
            Ok(target_path)
        }
        Ok(out) => {
            let _ = std::fs::remove_file(&target_path);
            let err = String::from_utf8_lossy(&out.stderr);
            Err(KapittelError::ToolFailed(format!("ffmpeg audio extraction failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(KapittelError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(KapittelError::ToolFailed(format!("ffmpeg error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_from_path() {
        assert_eq!(video_id_from_path(Path::new("/videos/Lecture 01.mp4")), "Lecture_01");
        assert_eq!(video_id_from_path(Path::new("intro-to_rust.mkv")), "intro-to_rust");
    }

    #[tokio::test]
    async fn test_missing_video_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_audio(&dir.path().join("nope.mp4"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, KapittelError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cached_audio_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("talk.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        let cached = dir.path().join("talk.wav");
        std::fs::write(&cached, b"cached").unwrap();

        let path = extract_audio(&video, dir.path()).await.unwrap();
        assert_eq!(path, cached);
    }
}
