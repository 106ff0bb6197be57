use std::sync::Arc;

use super::cloud::CloudSpeechEngine;
use super::{SpeechToText, TranscriptionError};
use crate::config::{SpeechConfig, SpeechProvider};

pub struct SpeechEngineFactory;

impl SpeechEngineFactory {
    /// Build the configured speech-to-text backend; the local model is loaded here, once
    pub fn create(config: &SpeechConfig) -> Result<Arc<dyn SpeechToText>, TranscriptionError> {
        match config.provider {
            SpeechProvider::Cloud => Ok(Arc::new(CloudSpeechEngine::new(
                config.api_key.clone(),
                Some(config.api_base_url.clone()),
                Some(config.model.clone()),
                config.language.clone(),
            ))),
            SpeechProvider::Local => Self::create_local(config),
        }
    }

    #[cfg(feature = "local-whisper")]
    fn create_local(config: &SpeechConfig) -> Result<Arc<dyn SpeechToText>, TranscriptionError> {
        let engine = super::local::LocalWhisperEngine::load(&config.model, config.language.as_deref())?;
        Ok(Arc::new(engine))
    }

    #[cfg(not(feature = "local-whisper"))]
    fn create_local(_config: &SpeechConfig) -> Result<Arc<dyn SpeechToText>, TranscriptionError> {
        Err(TranscriptionError::ModelLoadFailed(
            "local speech-to-text requires building with the `local-whisper` feature".to_string(),
        ))
    }
}
