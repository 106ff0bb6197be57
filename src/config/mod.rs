use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener
    pub server: ServerConfig,

    /// How captions and audio are obtained
    pub acquisition: AcquisitionConfig,

    /// Speech-to-text backend
    pub speech: SpeechConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// Captions for YouTube, yt-dlp audio download for everything else
    Auto,
    /// yt-dlp audio download for every platform
    Download,
    /// Paid download API for every platform
    DownloadApi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub strategy: StrategyMode,

    /// yt-dlp executable
    pub yt_dlp_path: String,

    /// ffmpeg executable, used to transcode files fetched from the download API
    pub ffmpeg_path: String,

    /// Target codec for extracted audio
    pub audio_format: String,

    /// Target bitrate passed to the audio extractor (kbps)
    pub audio_quality: String,

    pub socket_timeout_secs: u64,

    pub user_agent: String,

    /// Caption languages tried for YouTube, in preference order
    pub caption_languages: Vec<String>,

    pub download_api: DownloadApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadApiConfig {
    /// Endpoint queried with `?url=<video url>`
    pub endpoint: Option<String>,

    /// Value for the host header some API gateways require
    pub host: Option<String>,

    /// Header carrying the API key
    pub key_header: String,

    /// Read from DOWNLOAD_API_KEY; never written back to disk
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// JSON field holding the direct download link
    pub link_field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProvider {
    /// OpenAI-compatible `/audio/transcriptions` endpoint
    Cloud,
    /// Whisper model loaded in-process (requires the `local-whisper` feature)
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub provider: SpeechProvider,

    /// Model name for the cloud API or Hugging Face repo id for the local engine
    pub model: String,

    pub api_base_url: String,

    /// Read from SPEECH_API_KEY or OPENAI_API_KEY; never written back to disk
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Language hint (ISO 639-1); auto-detect when unset
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Parent directory for per-request scratch directories
    pub temp_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyMode::Auto,
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            audio_format: "mp3".to_string(),
            audio_quality: "192".to_string(),
            socket_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            caption_languages: vec!["en".to_string(), "en-US".to_string()],
            download_api: DownloadApiConfig::default(),
        }
    }
}

impl Default for DownloadApiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            host: None,
            key_header: "X-RapidAPI-Key".to_string(),
            api_key: None,
            link_field: "link".to_string(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: SpeechProvider::Cloud,
            model: "whisper-1".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            language: None,
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, the default locations, or defaults,
    /// then apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Ok(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("video-transcriber").join("config.yaml"))
    }

    /// Overlay secrets and the listen address from the environment
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty("HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(key) = non_empty("DOWNLOAD_API_KEY") {
            self.acquisition.download_api.api_key = Some(key);
        }
        if let Some(key) = non_empty("SPEECH_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.speech.api_key = Some(key);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be non-zero");
        }

        if self.acquisition.strategy == StrategyMode::DownloadApi {
            let api = &self.acquisition.download_api;
            if api.endpoint.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("acquisition.download_api.endpoint must be set for the download_api strategy");
            }
            if api.api_key.is_none() {
                anyhow::bail!("DOWNLOAD_API_KEY must be set for the download_api strategy");
            }
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  Strategy: {:?}", self.acquisition.strategy);
        println!(
            "  Audio: {} @ {}k via {}",
            self.acquisition.audio_format, self.acquisition.audio_quality, self.acquisition.yt_dlp_path
        );
        println!("  Caption languages: {}", self.acquisition.caption_languages.join(","));
        if let Some(endpoint) = &self.acquisition.download_api.endpoint {
            println!("  Download API: {}", endpoint);
            println!(
                "  Download API key: {}",
                if self.acquisition.download_api.api_key.is_some() { "set" } else { "missing" }
            );
        }
        println!("  Speech provider: {:?} ({})", self.speech.provider, self.speech.model);
        if self.speech.provider == SpeechProvider::Cloud {
            println!("  Speech API: {}", self.speech.api_base_url);
        }
        if let Some(dir) = &self.app.temp_dir {
            println!("  Temp dir: {}", dir.display());
        }
    }
}
