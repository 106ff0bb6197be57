use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcriber",
    about = "Video Transcriber - turn video URLs into text transcripts",
    version,
    long_about = "An HTTP service and CLI that transcribes videos from YouTube, Vimeo, TikTok, Instagram, Twitter/X, Rumble, DailyMotion and anything else yt-dlp understands. YouTube captions are used directly; other platforms are downloaded and run through speech-to-text."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a YAML configuration file
    #[arg(short, long, global = true, value_name = "FILE", env = "TRANSCRIBER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (POST /transcribe, GET /health)
    Serve {
        /// Address to bind (overrides config and HOST)
        #[arg(long, value_name = "ADDR")]
        host: Option<String>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Transcribe a single video URL and print the result
    Transcribe {
        /// Video URL (YouTube, Vimeo, TikTok, Instagram, Twitter/X, Rumble, DailyMotion, ...)
        #[arg(value_name = "URL")]
        url: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show or write the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the effective configuration to the config file
        #[arg(short, long)]
        write: bool,
    },

    /// List supported platforms
    Platforms,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON, same shape as the HTTP response
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
