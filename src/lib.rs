//! Video Transcriber - an HTTP service that turns video URLs into transcripts
//!
//! YouTube videos are served from their existing caption tracks; everything else is
//! downloaded as audio (yt-dlp or a paid download API) and run through speech-to-text.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod server;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{detect_platform, extract_youtube_video_id, Acquired, Platform};
pub use transcribe::{SpeechToText, TranscriptionPipeline, TranscriptionResult};

/// Errors surfaced by a single transcription request
#[derive(thiserror::Error, Debug)]
pub enum TranscriptorError {
    #[error("URL must not be empty")]
    EmptyUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Acquisition(#[from] extractors::AcquisitionError),

    #[error(transparent)]
    Transcription(#[from] transcribe::TranscriptionError),

    #[error("File operation failed: {0}")]
    FileError(String),
}
