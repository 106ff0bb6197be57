use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::{AcquisitionError, AudioFormat};

/// ffmpeg wrapper that turns downloaded media into the configured audio codec
pub struct Transcoder {
    ffmpeg_path: String,
    target: AudioFormat,
}

impl Transcoder {
    pub fn new(ffmpeg_path: impl Into<String>, target_extension: &str) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            target: AudioFormat::from_extension(target_extension).unwrap_or(AudioFormat::Mp3),
        }
    }

    pub fn target(&self) -> AudioFormat {
        self.target
    }

    /// Whether the file can be handed to speech-to-text as is
    pub fn is_target_format(&self, path: &Path) -> bool {
        AudioFormat::from_path(path) == Some(self.target)
    }

    /// Convert `source` next to itself, returning the new path; no-op when already in the target codec
    pub async fn ensure_target_format(&self, source: &Path) -> Result<PathBuf, AcquisitionError> {
        if self.is_target_format(source) {
            return Ok(source.to_path_buf());
        }

        let target_path = source.with_file_name(format!("audio.{}", self.target.as_str()));
        tracing::debug!(
            source = %source.display(),
            target = %target_path.display(),
            "Transcoding downloaded media"
        );

        let output = Command::new(&self.ffmpeg_path)
            .args([
                "-i",
                &source.to_string_lossy(),
                "-vn", // No video
                "-acodec",
                codec_for(self.target),
                "-ab",
                "128k",
                "-ar",
                "44100",
                "-y", // Overwrite output file
                &target_path.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| AcquisitionError::Transcode(format!("failed to run {}: {}", self.ffmpeg_path, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AcquisitionError::Transcode(error.trim().to_string()));
        }

        Ok(target_path)
    }
}

fn codec_for(format: AudioFormat) -> &'static str {
    match format {
        AudioFormat::Mp3 => "libmp3lame",
        AudioFormat::M4a | AudioFormat::Mp4 => "aac",
        AudioFormat::Wav => "pcm_s16le",
        AudioFormat::Flac => "flac",
        AudioFormat::Ogg | AudioFormat::Webm => "libopus",
    }
}
