use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::{Config, StrategyMode};
use crate::extractors::{
    detect_platform, extract_youtube_video_id, Acquired, AcquisitionError, AudioSource, CaptionSource,
    DownloadApiSource, Platform, YoutubeCaptionSource, YtDlpAudioSource,
};
use crate::TranscriptorError;

pub mod cloud;
pub mod factory;

#[cfg(feature = "local-whisper")]
mod audio_decoder;
#[cfg(feature = "local-whisper")]
pub mod local;

pub use cloud::CloudSpeechEngine;
pub use factory::SpeechEngineFactory;

/// Returned in place of a transcript when the recogniser hears nothing usable
pub const UNINTELLIGIBLE_TEXT: &str = "Could not understand the audio";

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("speech could not be understood")]
    Unintelligible,
    #[error("Speech recognition service error: {0}")]
    ApiRequestFailed(String),
    #[error("Failed to transcribe audio: {0}")]
    TranscriptionFailed(String),
    #[error("audio decoding failed: {0}")]
    DecodingFailed(String),
    #[error("model loading failed: {0}")]
    ModelLoadFailed(String),
}

/// Converts a local audio file into text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError>;

    fn name(&self) -> &'static str;
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    /// URL as submitted
    pub url: String,

    pub transcript: String,

    pub platform: Platform,

    /// Which collaborator produced the text
    pub method: String,
}

/// Acquisition route chosen for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Captions,
    Download,
    DownloadApi,
}

/// detect platform → acquire captions or audio → speech-to-text
pub struct TranscriptionPipeline {
    strategy: StrategyMode,
    captions: Arc<dyn CaptionSource>,
    downloader: Arc<dyn AudioSource>,
    download_api: Option<Arc<dyn AudioSource>>,
    speech: Arc<dyn SpeechToText>,
    temp_root: Option<PathBuf>,
}

impl TranscriptionPipeline {
    pub fn new(
        captions: Arc<dyn CaptionSource>,
        downloader: Arc<dyn AudioSource>,
        speech: Arc<dyn SpeechToText>,
    ) -> Self {
        Self {
            strategy: StrategyMode::Auto,
            captions,
            downloader,
            download_api: None,
            speech,
            temp_root: None,
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyMode) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_download_api(mut self, source: Arc<dyn AudioSource>) -> Self {
        self.download_api = Some(source);
        self
    }

    /// Create per-request scratch directories under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Wire up the real collaborators described by `config`
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let acquisition = &config.acquisition;

        let captions = Arc::new(YoutubeCaptionSource::new(
            acquisition.yt_dlp_path.clone(),
            acquisition.caption_languages.clone(),
            acquisition.socket_timeout_secs,
        ));
        let downloader = Arc::new(YtDlpAudioSource::new(acquisition));

        // Model loading may download weights and parse them, keep it off the reactor
        let speech_config = config.speech.clone();
        let speech = tokio::task::spawn_blocking(move || SpeechEngineFactory::create(&speech_config)).await??;
        tracing::info!(engine = speech.name(), "Speech-to-text engine ready");

        let mut pipeline = Self::new(captions, downloader, speech).with_strategy(acquisition.strategy);

        if acquisition.strategy == StrategyMode::DownloadApi {
            pipeline = pipeline.with_download_api(Arc::new(DownloadApiSource::new(acquisition)?));
        }
        if let Some(root) = &config.app.temp_dir {
            fs_err::create_dir_all(root)?;
            pipeline = pipeline.with_temp_root(root.clone());
        }

        Ok(pipeline)
    }

    pub fn strategy(&self) -> StrategyMode {
        self.strategy
    }

    /// Run the whole pipeline for one URL
    ///
    /// The scratch directory lives for the duration of this call and is removed on every
    /// exit path when the `TempDir` guard drops.
    pub async fn transcribe_from_url(&self, url: &str) -> Result<TranscriptionResult, TranscriptorError> {
        let submitted = url;
        let url = url.trim();
        if url.is_empty() {
            return Err(TranscriptorError::EmptyUrl);
        }
        if url.starts_with('-') {
            return Err(TranscriptorError::InvalidUrl(url.to_string()));
        }

        let work_dir = self.create_work_dir()?;
        tracing::debug!(path = %work_dir.path().display(), "Created scratch directory");

        let platform = detect_platform(url);
        let route = self.route_for(platform);
        tracing::info!(url, %platform, ?route, "Detected platform");

        let (acquired, source) = self.acquire(route, url, work_dir.path()).await?;

        let (transcript, method) = match acquired {
            Acquired::Transcript(text) => (text, source.to_string()),
            Acquired::Audio(path) => {
                let text = self.speech_to_text(&path).await?;
                (text, format!("{} + {}", source, self.speech.name()))
            }
        };

        tracing::info!(url, %platform, chars = transcript.len(), method = %method, "Transcription finished");

        Ok(TranscriptionResult {
            url: submitted.to_string(),
            transcript,
            platform,
            method,
        })
    }

    fn route_for(&self, platform: Platform) -> Route {
        match self.strategy {
            StrategyMode::Auto if platform == Platform::Youtube => Route::Captions,
            StrategyMode::Auto | StrategyMode::Download => Route::Download,
            StrategyMode::DownloadApi => Route::DownloadApi,
        }
    }

    async fn acquire(
        &self,
        route: Route,
        url: &str,
        work_dir: &Path,
    ) -> Result<(Acquired, &'static str), AcquisitionError> {
        match route {
            Route::Captions => {
                let video_id = extract_youtube_video_id(url)?;
                tracing::info!(video_id = %video_id, "Getting transcript for YouTube video");
                let text = self.captions.fetch_transcript(&video_id, work_dir).await?;
                Ok((Acquired::Transcript(text), self.captions.source_name()))
            }
            Route::Download => {
                let path = self.downloader.fetch_audio(url, work_dir).await?;
                Ok((Acquired::Audio(path), self.downloader.source_name()))
            }
            Route::DownloadApi => {
                let source = self
                    .download_api
                    .as_ref()
                    .ok_or_else(|| AcquisitionError::DownloadApi("download API is not configured".to_string()))?;
                let path = source.fetch_audio(url, work_dir).await?;
                Ok((Acquired::Audio(path), source.source_name()))
            }
        }
    }

    async fn speech_to_text(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        tracing::info!(path = %audio_path.display(), engine = self.speech.name(), "Transcribing audio");

        match self.speech.transcribe(audio_path).await {
            Ok(text) => Ok(text),
            Err(TranscriptionError::Unintelligible) => {
                tracing::warn!(path = %audio_path.display(), "Speech was not recognised");
                Ok(UNINTELLIGIBLE_TEXT.to_string())
            }
            Err(e) => Err(e),
        }
    }

    fn create_work_dir(&self) -> Result<TempDir, TranscriptorError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("transcribe-");

        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };

        dir.map_err(|e| TranscriptorError::FileError(format!("Failed to create temporary directory: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{MockAudioSource, MockCaptionSource};

    fn captions() -> MockCaptionSource {
        let mut mock = MockCaptionSource::new();
        mock.expect_source_name().return_const("captions");
        mock
    }

    fn downloader(name: &'static str) -> MockAudioSource {
        let mut mock = MockAudioSource::new();
        mock.expect_source_name().return_const(name);
        mock
    }

    fn speech() -> MockSpeechToText {
        let mut mock = MockSpeechToText::new();
        mock.expect_name().return_const("speech");
        mock
    }

    /// Audio source that writes a file into the scratch directory
    fn writes_audio(mock: &mut MockAudioSource) {
        mock.expect_fetch_audio().times(1).returning(|_, dir| {
            let path = dir.join("audio.mp3");
            std::fs::write(&path, b"ID3").unwrap();
            Ok(path)
        });
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_youtube_uses_captions() {
        let mut captions = captions();
        captions
            .expect_fetch_transcript()
            .withf(|id, _| id.to_string() == "dQw4w9WgXcQ")
            .times(1)
            .returning(|_, _| Ok("never gonna give you up".to_string()));
        let mut downloader = downloader("yt-dlp");
        downloader.expect_fetch_audio().never();
        let mut speech = speech();
        speech.expect_transcribe().never();

        let pipeline = TranscriptionPipeline::new(Arc::new(captions), Arc::new(downloader), Arc::new(speech));
        let result = pipeline
            .transcribe_from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();

        assert_eq!(result.platform, Platform::Youtube);
        assert_eq!(result.transcript, "never gonna give you up");
        assert_eq!(result.method, "captions");
    }

    #[tokio::test]
    async fn test_other_platforms_download_and_transcribe() {
        let mut captions = captions();
        captions.expect_fetch_transcript().never();
        let mut downloader = downloader("yt-dlp");
        writes_audio(&mut downloader);
        let mut speech = speech();
        speech
            .expect_transcribe()
            .withf(|path| path.ends_with("audio.mp3") && path.exists())
            .times(1)
            .returning(|_| Ok("bonjour".to_string()));

        let pipeline = TranscriptionPipeline::new(Arc::new(captions), Arc::new(downloader), Arc::new(speech));
        let result = pipeline.transcribe_from_url("https://vimeo.com/76979871").await.unwrap();

        assert_eq!(result.platform, Platform::Vimeo);
        assert_eq!(result.transcript, "bonjour");
        assert_eq!(result.method, "yt-dlp + speech");
    }

    #[tokio::test]
    async fn test_download_strategy_applies_to_youtube() {
        let mut captions = captions();
        captions.expect_fetch_transcript().never();
        let mut downloader = downloader("yt-dlp");
        writes_audio(&mut downloader);
        let mut speech = speech();
        speech.expect_transcribe().returning(|_| Ok("text".to_string()));

        let pipeline = TranscriptionPipeline::new(Arc::new(captions), Arc::new(downloader), Arc::new(speech))
            .with_strategy(StrategyMode::Download);
        let result = pipeline.transcribe_from_url("https://youtu.be/dQw4w9WgXcQ").await.unwrap();

        assert_eq!(result.platform, Platform::Youtube);
        assert_eq!(result.transcript, "text");
    }

    #[tokio::test]
    async fn test_download_api_strategy() {
        let mut downloader = downloader("yt-dlp");
        downloader.expect_fetch_audio().never();
        let mut api = downloader_named_api();
        writes_audio(&mut api);
        let mut speech = speech();
        speech.expect_transcribe().returning(|_| Ok("via api".to_string()));

        let pipeline = TranscriptionPipeline::new(Arc::new(captions()), Arc::new(downloader), Arc::new(speech))
            .with_strategy(StrategyMode::DownloadApi)
            .with_download_api(Arc::new(api));
        let result = pipeline.transcribe_from_url("https://www.tiktok.com/@a/video/1").await.unwrap();

        assert_eq!(result.platform, Platform::Tiktok);
        assert_eq!(result.method, "download API + speech");
    }

    fn downloader_named_api() -> MockAudioSource {
        downloader("download API")
    }

    #[tokio::test]
    async fn test_download_api_strategy_without_source_fails() {
        let pipeline = TranscriptionPipeline::new(Arc::new(captions()), Arc::new(downloader("yt-dlp")), Arc::new(speech()))
            .with_strategy(StrategyMode::DownloadApi);

        let err = pipeline.transcribe_from_url("https://vimeo.com/1").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_unintelligible_audio_becomes_placeholder_text() {
        let mut downloader = downloader("yt-dlp");
        writes_audio(&mut downloader);
        let mut speech = speech();
        speech
            .expect_transcribe()
            .returning(|_| Err(TranscriptionError::Unintelligible));

        let pipeline = TranscriptionPipeline::new(Arc::new(captions()), Arc::new(downloader), Arc::new(speech));
        let result = pipeline.transcribe_from_url("https://rumble.com/v1.html").await.unwrap();

        assert_eq!(result.transcript, UNINTELLIGIBLE_TEXT);
    }

    #[tokio::test]
    async fn test_scratch_dir_removed_after_success_and_failure() {
        let root = tempfile::tempdir().unwrap();

        let mut downloader = downloader("yt-dlp");
        downloader.expect_fetch_audio().times(2).returning(|_, dir| {
            let path = dir.join("audio.mp3");
            std::fs::write(&path, b"ID3").unwrap();
            Ok(path)
        });
        let mut speech = speech();
        let mut calls = 0;
        speech.expect_transcribe().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok("ok".to_string())
            } else {
                Err(TranscriptionError::ApiRequestFailed("status 500: boom".to_string()))
            }
        });

        let pipeline = TranscriptionPipeline::new(Arc::new(captions()), Arc::new(downloader), Arc::new(speech))
            .with_temp_root(root.path());

        pipeline.transcribe_from_url("https://vimeo.com/1").await.unwrap();
        assert!(is_empty_dir(root.path()));

        let err = pipeline.transcribe_from_url("https://vimeo.com/2").await.unwrap_err();
        assert_eq!(err.to_string(), "Speech recognition service error: status 500: boom");
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_bad_youtube_url_fails_before_fetching() {
        let mut captions = captions();
        captions.expect_fetch_transcript().never();

        let pipeline = TranscriptionPipeline::new(Arc::new(captions), Arc::new(downloader("yt-dlp")), Arc::new(speech()));
        let err = pipeline
            .transcribe_from_url("https://www.youtube.com/@somechannel")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to extract video ID: Invalid YouTube URL");
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let pipeline = TranscriptionPipeline::new(Arc::new(captions()), Arc::new(downloader("yt-dlp")), Arc::new(speech()));
        let err = pipeline.transcribe_from_url("   ").await.unwrap_err();
        assert!(matches!(err, TranscriptorError::EmptyUrl));
    }

    #[tokio::test]
    async fn test_option_like_url_rejected_before_acquisition() {
        let mut downloader = downloader("yt-dlp");
        downloader.expect_fetch_audio().never();

        let pipeline = TranscriptionPipeline::new(Arc::new(captions()), Arc::new(downloader), Arc::new(speech()));
        let err = pipeline
            .transcribe_from_url("--update-to=someone/repo@tag")
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptorError::InvalidUrl(_)));
        assert_eq!(err.to_string(), "Invalid URL: --update-to=someone/repo@tag");
    }

    #[tokio::test]
    async fn test_result_echoes_url_as_submitted() {
        let mut downloader = downloader("yt-dlp");
        downloader
            .expect_fetch_audio()
            .withf(|url, _| url.to_string() == "https://vimeo.com/1")
            .times(1)
            .returning(|_, dir| {
                let path = dir.join("audio.mp3");
                std::fs::write(&path, b"ID3").unwrap();
                Ok(path)
            });
        let mut speech = speech();
        speech.expect_transcribe().returning(|_| Ok("hi".to_string()));

        let pipeline = TranscriptionPipeline::new(Arc::new(captions()), Arc::new(downloader), Arc::new(speech));
        let result = pipeline.transcribe_from_url("  https://vimeo.com/1\n").await.unwrap();

        assert_eq!(result.url, "  https://vimeo.com/1\n");
        assert_eq!(result.platform, Platform::Vimeo);
    }
}
