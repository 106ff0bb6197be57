use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod download_api;
pub mod transcode;
pub mod youtube;
pub mod ytdlp;

pub use download_api::DownloadApiSource;
pub use youtube::{extract_youtube_video_id, YoutubeCaptionSource};
pub use ytdlp::YtDlpAudioSource;

/// Video platforms recognised from a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Vimeo,
    Tiktok,
    Instagram,
    Twitter,
    Rumble,
    Dailymotion,
    Other,
}

impl Platform {
    /// Every known platform, in detection order
    pub const KNOWN: [Platform; 7] = [
        Platform::Youtube,
        Platform::Vimeo,
        Platform::Tiktok,
        Platform::Instagram,
        Platform::Twitter,
        Platform::Rumble,
        Platform::Dailymotion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Vimeo => "vimeo",
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Rumble => "rumble",
            Platform::Dailymotion => "dailymotion",
            Platform::Other => "other",
        }
    }

    /// Human-facing name
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Vimeo => "Vimeo",
            Platform::Tiktok => "TikTok",
            Platform::Instagram => "Instagram",
            Platform::Twitter => "Twitter/X",
            Platform::Rumble => "Rumble",
            Platform::Dailymotion => "DailyMotion",
            Platform::Other => "Other",
        }
    }

    /// Domain fragments that identify the platform
    fn markers(&self) -> &'static [&'static str] {
        match self {
            Platform::Youtube => &["youtube.com", "youtu.be"],
            Platform::Vimeo => &["vimeo.com"],
            Platform::Tiktok => &["tiktok.com"],
            Platform::Instagram => &["instagram.com"],
            Platform::Twitter => &["twitter.com", "x.com"],
            Platform::Rumble => &["rumble.com"],
            Platform::Dailymotion => &["dailymotion.com"],
            Platform::Other => &[],
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a URL by case-insensitive substring match; first match wins
pub fn detect_platform(url: &str) -> Platform {
    let url_lower = url.to_lowercase();

    Platform::KNOWN
        .into_iter()
        .find(|platform| platform.markers().iter().any(|m| url_lower.contains(m)))
        .unwrap_or(Platform::Other)
}

/// Audio containers the pipeline knows how to name and upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
    Mp4,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
            AudioFormat::Mp4 => "mp4",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "opus" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            "mp4" | "m4v" => Some(AudioFormat::Mp4),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Mp4 => "video/mp4",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AcquisitionError {
    #[error("Failed to extract video ID: {0}")]
    VideoId(String),

    #[error("Failed to get YouTube transcript: {0}")]
    TranscriptUnavailable(String),

    #[error("Failed to extract audio via yt-dlp: {0}")]
    AudioExtraction(String),

    #[error("Download API request failed: {0}")]
    DownloadApi(String),

    #[error("Failed to convert audio with ffmpeg: {0}")]
    Transcode(String),
}

/// What an acquisition strategy produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// Text is already available, no speech-to-text needed
    Transcript(String),
    /// Local audio file inside the request's scratch directory
    Audio(PathBuf),
}

/// Fetches an existing caption track for a video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Return the flattened caption text, failing when no track exists
    async fn fetch_transcript(&self, video_id: &str, work_dir: &Path) -> Result<String, AcquisitionError>;

    fn source_name(&self) -> &'static str;
}

/// Produces a local audio file for a video URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Write audio into `work_dir` and return its path
    async fn fetch_audio(&self, url: &str, work_dir: &Path) -> Result<PathBuf, AcquisitionError>;

    fn source_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_urls_detected() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ&t=10",
            "HTTPS://WWW.YOUTUBE.COM/shorts/abc",
        ] {
            assert_eq!(detect_platform(url), Platform::Youtube, "{url}");
        }
    }

    #[test]
    fn test_known_platforms_detected() {
        assert_eq!(detect_platform("https://vimeo.com/76979871"), Platform::Vimeo);
        assert_eq!(detect_platform("https://www.tiktok.com/@user/video/1"), Platform::Tiktok);
        assert_eq!(detect_platform("https://www.instagram.com/reel/xyz/"), Platform::Instagram);
        assert_eq!(detect_platform("https://twitter.com/user/status/1"), Platform::Twitter);
        assert_eq!(detect_platform("https://x.com/user/status/1"), Platform::Twitter);
        assert_eq!(detect_platform("https://rumble.com/v1abc.html"), Platform::Rumble);
        assert_eq!(detect_platform("https://www.dailymotion.com/video/x7"), Platform::Dailymotion);
    }

    #[test]
    fn test_unknown_domain_is_other() {
        assert_eq!(detect_platform("https://example.com/video.mp4"), Platform::Other);
        assert_eq!(detect_platform(""), Platform::Other);
    }

    #[test]
    fn test_first_match_wins() {
        // a YouTube link shared through a tweet URL still contains both markers
        assert_eq!(
            detect_platform("https://youtube.com/redirect?q=https://x.com/a"),
            Platform::Youtube
        );
    }

    #[test]
    fn test_platform_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Platform::Dailymotion).unwrap(), "\"dailymotion\"");
        assert_eq!(Platform::Twitter.to_string(), "twitter");
    }

    #[test]
    fn test_audio_format_from_path() {
        assert_eq!(AudioFormat::from_path(Path::new("/tmp/a/audio.mp3")), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_path(Path::new("clip.M4A")), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::from_path(Path::new("noext")), None);
    }
}
