use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{AcquisitionError, AudioSource};
use crate::config::AcquisitionConfig;

/// Audio downloader for any site yt-dlp supports
pub struct YtDlpAudioSource {
    yt_dlp_path: String,
    audio_format: String,
    audio_quality: String,
    socket_timeout_secs: u64,
    user_agent: String,
}

impl YtDlpAudioSource {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            yt_dlp_path: config.yt_dlp_path.clone(),
            audio_format: config.audio_format.clone(),
            audio_quality: config.audio_quality.clone(),
            socket_timeout_secs: config.socket_timeout_secs,
            user_agent: config.user_agent.clone(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Arguments for a best-audio download transcoded to the configured codec
    pub(crate) fn download_args(&self, url: &str, output_template: &Path) -> Vec<String> {
        vec![
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.audio_format.clone(),
            "--audio-quality".to_string(),
            format!("{}K", self.audio_quality),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            "--user-agent".to_string(),
            self.user_agent.clone(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--output".to_string(),
            output_template.to_string_lossy().into_owned(),
            // end of options; a URL starting with '-' must not be parsed as a flag
            "--".to_string(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl AudioSource for YtDlpAudioSource {
    async fn fetch_audio(&self, url: &str, work_dir: &Path) -> Result<PathBuf, AcquisitionError> {
        let output_template = work_dir.join("audio.%(ext)s");

        tracing::info!(url, format = %self.audio_format, "Extracting audio with yt-dlp");

        let output = Command::new(&self.yt_dlp_path)
            .args(self.download_args(url, &output_template))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AcquisitionError::AudioExtraction(format!("failed to run {}: {}", self.yt_dlp_path, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AcquisitionError::AudioExtraction(error.trim().to_string()));
        }

        let audio_path = find_audio_output(work_dir, &self.audio_format).await.ok_or_else(|| {
            AcquisitionError::AudioExtraction(format!("no audio file was produced in {}", work_dir.display()))
        })?;

        tracing::info!(path = %audio_path.display(), "Audio extracted");
        Ok(audio_path)
    }

    fn source_name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Locate the extracted `audio.*` file
///
/// The extension follows the codec name for most formats, but not all of them
/// (`vorbis` is written as `.ogg`, `best` keeps the source container).
async fn find_audio_output(work_dir: &Path, audio_format: &str) -> Option<PathBuf> {
    let expected = work_dir.join(format!("audio.{}", audio_format));
    if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
        return Some(expected);
    }

    let mut entries = tokio::fs::read_dir(work_dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_audio_stem = path.file_stem().and_then(|s| s.to_str()) == Some("audio");
        let partial = matches!(
            path.extension().and_then(|e| e.to_str()),
            None | Some("part") | Some("ytdl") | Some("temp")
        );
        if is_audio_stem && !partial && path.is_file() {
            return Some(path);
        }
    }

    None
}
