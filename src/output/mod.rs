use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::server::TranscribeResponse;
use crate::transcribe::TranscriptionResult;

/// Render a result in the requested format
pub fn render(result: &TranscriptionResult, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(result.transcript.clone()),
        OutputFormat::Json => {
            let response = TranscribeResponse::from(result.clone());
            Ok(serde_json::to_string_pretty(&response)?)
        }
    }
}

/// Save transcription result to file
pub fn save_to_file(result: &TranscriptionResult, path: &Path, format: &OutputFormat) -> Result<()> {
    fs_err::write(path, render(result, format)?)?;
    Ok(())
}

/// Print transcription result to console
pub fn print_to_console(result: &TranscriptionResult, format: &OutputFormat) -> Result<()> {
    println!("{}", render(result, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::Platform;

    fn result() -> TranscriptionResult {
        TranscriptionResult {
            url: "https://vimeo.com/1".to_string(),
            transcript: "hello there".to_string(),
            platform: Platform::Vimeo,
            method: "yt-dlp + speech".to_string(),
        }
    }

    #[test]
    fn test_text_is_bare_transcript() {
        assert_eq!(render(&result(), &OutputFormat::Text).unwrap(), "hello there");
    }

    #[test]
    fn test_json_matches_http_response() {
        let json: serde_json::Value = serde_json::from_str(&render(&result(), &OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["platform"], "vimeo");
        assert_eq!(json["transcript"], "hello there");
        assert!(json.get("method").is_none());
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        save_to_file(&result(), &path, &OutputFormat::Text).unwrap();
        assert_eq!(fs_err::read_to_string(&path).unwrap(), "hello there");
    }
}
