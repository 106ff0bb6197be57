use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use video_transcriber::cli::{Cli, Commands};
use video_transcriber::config::Config;
use video_transcriber::extractors::Platform;
use video_transcriber::server::{self, AppState};
use video_transcriber::transcribe::TranscriptionPipeline;
use video_transcriber::{output, utils};

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "video_transcriber=debug,tower_http=debug"
    } else {
        "video_transcriber=info,tower_http=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            config.validate()?;

            // Missing tools are reported but not fatal; they may be installed later
            let missing_deps = utils::check_dependencies(&config.acquisition).await;
            for dep in &missing_deps {
                tracing::warn!(dependency = %dep, "External tool not available");
            }

            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let pipeline = TranscriptionPipeline::from_config(&config).await?;
            server::serve(AppState::new(pipeline), &host, port).await?;
        }
        Commands::Transcribe { url, output, format } => {
            config.validate()?;
            let pipeline = TranscriptionPipeline::from_config(&config).await?;

            let progress = ProgressBar::new_spinner();
            progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
            progress.set_message(format!("Transcribing {}", url));
            progress.enable_steady_tick(Duration::from_millis(120));

            let started = Instant::now();
            let result = pipeline.transcribe_from_url(&url).await;
            progress.finish_and_clear();
            let result = result?;

            tracing::info!(
                platform = %result.platform,
                method = %result.method,
                elapsed = %utils::format_duration(started.elapsed().as_secs_f64()),
                "Transcription complete"
            );

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, &format)?;
                    println!("Transcription saved to: {}", path.display());
                }
                None => output::print_to_console(&result, &format)?,
            }
        }
        Commands::Config { show, write } => {
            if write {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                config.save(&path)?;
                println!("Configuration written to: {}", path.display());
            }
            if show || !write {
                config.display();
            }
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            for platform in Platform::KNOWN {
                println!("  • {} ({})", platform.display_name(), platform.as_str());
            }
            println!("  • Anything else yt-dlp can download (reported as \"other\")");
        }
    }

    Ok(())
}
