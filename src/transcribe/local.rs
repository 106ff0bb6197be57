use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;

use super::audio_decoder::decode_audio_to_pcm;
use super::{SpeechToText, TranscriptionError};

const MAX_DECODE_TOKENS: usize = 224;
const MEL_FILTERS_REPO: &str = "FL33TW00D-HF/whisper-base";

/// Whisper model loaded once per process and shared by every request
pub struct LocalWhisperEngine {
    inner: Arc<LoadedModel>,
}

struct LoadedModel {
    // The decoder keeps a kv-cache, so inference needs exclusive access
    model: Mutex<m::model::Whisper>,
    tokenizer: Tokenizer,
    config: Config,
    device: Device,
    mel_filters: Vec<f32>,
    language_token: Option<u32>,
}

impl LocalWhisperEngine {
    /// Fetch weights from the Hugging Face hub (cached locally) and load them on the CPU
    pub fn load(model_id: &str, language: Option<&str>) -> Result<Self, TranscriptionError> {
        let device = Device::Cpu;

        tracing::info!(device = ?device, model = model_id, "Loading Whisper model");

        let api = Api::new().map_err(|e| TranscriptionError::ModelLoadFailed(e.to_string()))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("config.json: {}", e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("tokenizer.json: {}", e)))?;
        let weights_path = repo.get("model.safetensors").map_err(|e| {
            TranscriptionError::ModelLoadFailed(format!("model.safetensors: {}", e))
        })?;

        let mel_repo = api.repo(Repo::new(MEL_FILTERS_REPO.to_string(), RepoType::Model));
        let mel_bytes_path = mel_repo
            .get("melfilters.bytes")
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("melfilters.bytes: {}", e)))?;

        let config_contents = fs_err::read_to_string(&config_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("read config: {}", e)))?;
        let config: Config = serde_json::from_str(&config_contents)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("parse config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("tokenizer: {}", e)))?;

        let mel_bytes = fs_err::read(&mel_bytes_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("mel filters: {}", e)))?;
        let mel_filters = read_mel_filters(&mel_bytes, config.num_mel_bins)?;

        // Multilingual checkpoints accept a language token; English-only ones do not
        let language_token = language.and_then(|lang| tokenizer.token_to_id(&format!("<|{}|>", lang)));

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, &device)
                .map_err(|e| TranscriptionError::ModelLoadFailed(format!("weights: {}", e)))?
        };

        let model = m::model::Whisper::load(&vb, config.clone())
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("model: {}", e)))?;

        tracing::info!(model = model_id, "Whisper model loaded");

        Ok(Self {
            inner: Arc::new(LoadedModel {
                model: Mutex::new(model),
                tokenizer,
                config,
                device,
                mel_filters,
                language_token,
            }),
        })
    }
}

impl LoadedModel {
    fn transcribe_pcm(&self, pcm: &[f32]) -> Result<String, TranscriptionError> {
        let chunk_samples = m::N_SAMPLES;
        let n_mel = self.config.num_mel_bins;

        let mut model = self
            .model
            .lock()
            .map_err(|_| TranscriptionError::TranscriptionFailed("model lock poisoned".to_string()))?;

        let mut segments: Vec<String> = Vec::new();
        for (i, chunk) in pcm.chunks(chunk_samples).enumerate() {
            let mut samples = chunk.to_vec();
            samples.resize(chunk_samples, 0.0);

            let mel_data = m::audio::pcm_to_mel(&self.config, &samples, &self.mel_filters);
            let n_frames = mel_data.len() / n_mel;
            let mel = Tensor::from_vec(mel_data, (1, n_mel, n_frames), &self.device)
                .map_err(|e| TranscriptionError::TranscriptionFailed(format!("mel tensor: {}", e)))?;

            tracing::debug!(segment = i, "Transcribing audio segment");
            let text = self.decode_segment(&mut model, &mel)?;
            if !text.is_empty() {
                segments.push(text);
            }
        }

        Ok(segments.join(" "))
    }

    fn decode_segment(&self, model: &mut m::model::Whisper, mel: &Tensor) -> Result<String, TranscriptionError> {
        let failed = |e: candle_core::Error| TranscriptionError::TranscriptionFailed(e.to_string());

        let sot_token = token_id(&self.tokenizer, m::SOT_TOKEN)?;
        let transcribe_token = token_id(&self.tokenizer, m::TRANSCRIBE_TOKEN)?;
        let no_timestamps_token = token_id(&self.tokenizer, m::NO_TIMESTAMPS_TOKEN)?;
        let eot_token = token_id(&self.tokenizer, m::EOT_TOKEN)?;

        let audio_features = model.encoder.forward(mel, true).map_err(failed)?;

        let mut tokens = vec![sot_token];
        if let Some(lang) = self.language_token {
            tokens.push(lang);
        }
        tokens.extend([transcribe_token, no_timestamps_token]);
        let prompt_len = tokens.len();

        for _ in 0..MAX_DECODE_TOKENS {
            let token_tensor = Tensor::new(tokens.as_slice(), &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(failed)?;

            let decoder_output = model
                .decoder
                .forward(&token_tensor, &audio_features, tokens.len() == prompt_len)
                .map_err(failed)?;

            let logits = model
                .decoder
                .final_linear(&decoder_output.squeeze(0).map_err(failed)?)
                .map_err(failed)?;

            let seq_len = logits.dim(0).map_err(failed)?;
            let next_token = logits
                .get(seq_len - 1)
                .and_then(|last| last.argmax(0))
                .and_then(|t| t.to_scalar::<u32>())
                .map_err(failed)?;

            if next_token == eot_token {
                break;
            }
            tokens.push(next_token);
        }

        model.reset_kv_cache();

        let text = self
            .tokenizer
            .decode(&tokens[prompt_len..], true)
            .map_err(|e| TranscriptionError::TranscriptionFailed(format!("detokenize: {}", e)))?;

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl SpeechToText for LocalWhisperEngine {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        let data = tokio::fs::read(audio_path)
            .await
            .map_err(|e| TranscriptionError::TranscriptionFailed(format!("cannot read {}: {}", audio_path.display(), e)))?;
        let extension = audio_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);

        let inner = Arc::clone(&self.inner);
        let transcript = tokio::task::spawn_blocking(move || {
            let pcm = decode_audio_to_pcm(data, extension.as_deref())?;
            inner.transcribe_pcm(&pcm)
        })
        .await
        .map_err(|e| TranscriptionError::TranscriptionFailed(format!("inference task: {}", e)))??;

        if transcript.is_empty() {
            return Err(TranscriptionError::Unintelligible);
        }

        tracing::info!(chars = transcript.len(), "Local transcription completed");
        Ok(transcript)
    }

    fn name(&self) -> &'static str {
        "local whisper"
    }
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32, TranscriptionError> {
    tokenizer.token_to_id(token).ok_or_else(|| {
        TranscriptionError::TranscriptionFailed(format!("token not found: {}", token))
    })
}

fn read_mel_filters(bytes: &[u8], num_mel_bins: usize) -> Result<Vec<f32>, TranscriptionError> {
    let expected_len = num_mel_bins * (m::N_FFT / 2 + 1);
    if bytes.len() < expected_len * 4 {
        return Err(TranscriptionError::ModelLoadFailed(format!(
            "mel filters file too small: {} bytes, expected at least {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .take(expected_len)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
