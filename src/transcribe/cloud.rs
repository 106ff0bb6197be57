use async_trait::async_trait;
use reqwest::multipart;
use std::path::Path;

use super::{SpeechToText, TranscriptionError};
use crate::extractors::AudioFormat;

/// OpenAI-compatible `/audio/transcriptions` client
pub struct CloudSpeechEngine {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    language: Option<String>,
}

impl CloudSpeechEngine {
    pub fn new(api_key: Option<String>, base_url: Option<String>, model: Option<String>, language: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
            language,
        }
    }
}

#[async_trait]
impl SpeechToText for CloudSpeechEngine {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let audio_data = tokio::fs::read(audio_path)
            .await
            .map_err(|e| TranscriptionError::TranscriptionFailed(format!("cannot read {}: {}", audio_path.display(), e)))?;

        let format = AudioFormat::from_path(audio_path).unwrap_or(AudioFormat::Mp3);
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("audio.{}", format.as_str()));

        let file_part = multipart::Part::bytes(audio_data)
            .file_name(file_name)
            .mime_str(format.mime_type())
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", file_part);
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        tracing::debug!(model = %self.model, path = %audio_path.display(), "Sending audio to speech recognition API");

        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let transcript = response
            .text()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("body: {}", e)))?;
        let transcript = transcript.trim();

        if transcript.is_empty() {
            return Err(TranscriptionError::Unintelligible);
        }

        tracing::info!(chars = transcript.len(), "Speech recognition completed");

        Ok(transcript.to_string())
    }

    fn name(&self) -> &'static str {
        "cloud speech-to-text"
    }
}
