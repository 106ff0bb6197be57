use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{AcquisitionError, CaptionSource};

const SHORT_LINK_HOST: &str = "youtu.be";
const VIDEO_ID_LEN: usize = 11;

/// Extract the 11-character video id from a YouTube URL
///
/// Supports `youtu.be/<id>`, any URL with a `v` query parameter, and bare ids.
pub fn extract_youtube_video_id(url: &str) -> Result<String, AcquisitionError> {
    let url = url.trim();

    if url.contains(SHORT_LINK_HOST) {
        let last = url.rsplit('/').next().unwrap_or_default();
        let id = last.split(['?', '#']).next().unwrap_or_default();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }

    if let Some((_, query)) = url.split_once('?') {
        let query = query.split('#').next().unwrap_or_default();
        if let Some((_, v)) = url::form_urlencoded::parse(query.as_bytes()).find(|(k, _)| k == "v") {
            if !v.is_empty() {
                return Ok(v.into_owned());
            }
        }
    }

    if url.chars().count() == VIDEO_ID_LEN {
        return Ok(url.to_string());
    }

    Err(AcquisitionError::VideoId("Invalid YouTube URL".to_string()))
}

/// Caption fetcher backed by yt-dlp's subtitle writer
pub struct YoutubeCaptionSource {
    yt_dlp_path: String,
    languages: Vec<String>,
    socket_timeout_secs: u64,
}

impl YoutubeCaptionSource {
    pub fn new(yt_dlp_path: impl Into<String>, languages: Vec<String>, socket_timeout_secs: u64) -> Self {
        let languages = if languages.is_empty() {
            vec!["en".to_string(), "en-US".to_string()]
        } else {
            languages
        };

        Self {
            yt_dlp_path: yt_dlp_path.into(),
            languages,
            socket_timeout_secs,
        }
    }

    /// Pick the caption file for the most preferred language, else any VTT
    async fn find_caption_file(&self, dir: &Path, video_id: &str) -> Option<PathBuf> {
        for lang in &self.languages {
            let candidate = dir.join(format!("{}.{}.vtt", video_id, lang));
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Some(candidate);
            }
        }

        let mut entries = tokio::fs::read_dir(dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("vtt") {
                return Some(path);
            }
        }

        None
    }
}

#[async_trait]
impl CaptionSource for YoutubeCaptionSource {
    async fn fetch_transcript(&self, video_id: &str, work_dir: &Path) -> Result<String, AcquisitionError> {
        let captions_dir = work_dir.join("captions");
        tokio::fs::create_dir_all(&captions_dir)
            .await
            .map_err(|e| AcquisitionError::TranscriptUnavailable(format!("cannot create {}: {}", captions_dir.display(), e)))?;

        let watch_url = format!("https://www.youtube.com/watch?v={}", video_id);
        let output_template = captions_dir.join("%(id)s.%(ext)s");
        let socket_timeout = self.socket_timeout_secs.to_string();

        tracing::info!(video_id, languages = %self.languages.join(","), "Fetching YouTube captions");

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--skip-download",
                "--write-sub",
                "--write-auto-sub",
                "--sub-lang",
                &self.languages.join(","),
                "--sub-format",
                "vtt",
                "--socket-timeout",
                &socket_timeout,
                "--no-playlist",
                "--no-warnings",
                "--output",
                &output_template.to_string_lossy(),
                "--",
                &watch_url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AcquisitionError::TranscriptUnavailable(format!("failed to run {}: {}", self.yt_dlp_path, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AcquisitionError::TranscriptUnavailable(error.trim().to_string()));
        }

        let no_captions = || AcquisitionError::TranscriptUnavailable("No transcripts found for this video".to_string());

        let caption_file = self.find_caption_file(&captions_dir, video_id).await.ok_or_else(no_captions)?;
        let vtt = tokio::fs::read_to_string(&caption_file)
            .await
            .map_err(|e| AcquisitionError::TranscriptUnavailable(format!("cannot read captions: {}", e)))?;

        let transcript = vtt_to_text(&vtt);
        if transcript.is_empty() {
            return Err(no_captions());
        }

        tracing::info!(video_id, chars = transcript.len(), "Got transcript");
        Ok(transcript)
    }

    fn source_name(&self) -> &'static str {
        "YouTube captions (yt-dlp)"
    }
}

/// Flatten a WebVTT document into a single line of caption text
///
/// Auto-generated tracks repeat the previous line at the top of each cue, so
/// consecutive duplicates are dropped.
pub fn vtt_to_text(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_block = false;

    for raw in vtt.lines() {
        let line = raw.trim();
        if line.is_empty() {
            in_block = false;
            continue;
        }
        if in_block {
            continue;
        }
        if line.starts_with("WEBVTT") || line.starts_with("Kind:") || line.starts_with("Language:") {
            continue;
        }
        if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
            in_block = true;
            continue;
        }
        if line.contains("-->") || line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let text = decode_entities(&strip_tags(line));
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() || lines.last() == Some(&text) {
            continue;
        }
        lines.push(text);
    }

    lines.join(" ")
}

fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_url() {
        assert_eq!(
            extract_youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_v_param_among_others() {
        assert_eq!(
            extract_youtube_video_id("https://www.youtube.com/watch?feature=share&v=abc12345678&t=42").unwrap(),
            "abc12345678"
        );
        assert_eq!(extract_youtube_video_id("?v=abc12345678").unwrap(), "abc12345678");
    }

    #[test]
    fn test_short_link() {
        assert_eq!(extract_youtube_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(
            extract_youtube_video_id("https://youtu.be/dQw4w9WgXcQ?si=tracking").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_bare_id_is_idempotent() {
        let id = extract_youtube_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(extract_youtube_video_id(&id).unwrap(), id);
    }

    #[test]
    fn test_invalid_url_fails() {
        let err = extract_youtube_video_id("https://www.youtube.com/channel/UC123").unwrap_err();
        assert_eq!(err.to_string(), "Failed to extract video ID: Invalid YouTube URL");
        assert!(extract_youtube_video_id("https://youtu.be/").is_err());
    }

    #[test]
    fn test_vtt_to_text_drops_cue_metadata() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\nNOTE generated\nby a tool\n\n1\n00:00:00.000 --> 00:00:02.000\nHello <c.colorE5E5E5>world</c>\n\n2\n00:00:02.000 --> 00:00:04.000\nTom &amp; Jerry\n";
        assert_eq!(vtt_to_text(vtt), "Hello world Tom & Jerry");
    }

    #[test]
    fn test_vtt_to_text_collapses_rolling_captions() {
        let vtt = "WEBVTT\n\n00:00:00.000 --> 00:00:01.000 align:start position:0%\nnever gonna\n\n00:00:01.000 --> 00:00:02.000 align:start position:0%\nnever gonna\ngive you up\n\n00:00:02.000 --> 00:00:03.000\ngive you up\nnever gonna let you down\n";
        assert_eq!(vtt_to_text(vtt), "never gonna give you up never gonna let you down");
    }

    #[test]
    fn test_vtt_without_cues_is_empty() {
        assert_eq!(vtt_to_text("WEBVTT\n\n"), "");
    }

    #[cfg(unix)]
    const VIDEO_ID: &str = "dQw4w9WgXcQ";

    /// Stand-in for yt-dlp that writes the given caption files into `work/captions` and exits 0
    #[cfg(unix)]
    fn fake_yt_dlp(bin: &Path, work: &Path, files: &[(&str, &str)]) -> String {
        use std::os::unix::fs::PermissionsExt;

        let captions = work.join("captions");
        let mut script = String::from("#!/bin/sh\n");
        for (name, content) in files {
            script.push_str(&format!("printf '%s' '{}' > '{}/{}'\n", content, captions.display(), name));
        }
        script.push_str("exit 0\n");

        let path = bin.join("yt-dlp");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    async fn fetch_with(files: &[(&str, &str)], languages: &[&str]) -> Result<String, AcquisitionError> {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let script = fake_yt_dlp(bin.path(), work.path(), files);
        let languages = languages.iter().map(|l| l.to_string()).collect();

        YoutubeCaptionSource::new(script, languages, 5)
            .fetch_transcript(VIDEO_ID, work.path())
            .await
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_prefers_configured_language() {
        let files = [
            ("dQw4w9WgXcQ.de.vtt", "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nHallo Welt\n"),
            ("dQw4w9WgXcQ.en.vtt", "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nHello world\n"),
        ];

        let text = fetch_with(&files, &["en", "de"]).await.unwrap();
        assert_eq!(text, "Hello world");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_falls_back_to_any_caption_track() {
        let files = [("dQw4w9WgXcQ.de.vtt", "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nHallo Welt\n")];

        let text = fetch_with(&files, &["en"]).await.unwrap();
        assert_eq!(text, "Hallo Welt");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_without_subtitles_reports_no_transcripts() {
        let err = fetch_with(&[], &["en"]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get YouTube transcript: No transcripts found for this video"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_with_empty_caption_file_reports_no_transcripts() {
        let files = [("dQw4w9WgXcQ.en.vtt", "WEBVTT\n\n")];

        let err = fetch_with(&files, &["en"]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get YouTube transcript: No transcripts found for this video"
        );
    }
}
