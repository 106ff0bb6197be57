use crate::config::{AcquisitionConfig, StrategyMode};

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Check if the current environment has the external tools the configured strategy needs
pub async fn check_dependencies(config: &AcquisitionConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&config.yt_dlp_path).await {
        missing.push(format!(
            "{} - required for YouTube captions and audio extraction",
            config.yt_dlp_path
        ));
    }

    if !check_command_available(&config.ffmpeg_path).await {
        let purpose = match config.strategy {
            StrategyMode::DownloadApi => "required to transcode downloaded media",
            _ => "required by yt-dlp to extract audio",
        };
        missing.push(format!("{} - {}", config.ffmpeg_path, purpose));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    // ffmpeg takes a single-dash version flag
    let flag = if command.ends_with("ffmpeg") { "-version" } else { "--version" };

    Command::new(command)
        .arg(flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
