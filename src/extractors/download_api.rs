use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::transcode::Transcoder;
use super::{AcquisitionError, AudioFormat, AudioSource};
use crate::config::AcquisitionConfig;

/// Third-party download service: asks for a direct media link, then fetches it
pub struct DownloadApiSource {
    client: Client,
    endpoint: String,
    host: Option<String>,
    key_header: String,
    api_key: String,
    link_field: String,
    transcoder: Transcoder,
}

impl DownloadApiSource {
    pub fn new(config: &AcquisitionConfig) -> anyhow::Result<Self> {
        let api = &config.download_api;
        let endpoint = api
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("download API endpoint is not configured"))?;
        let api_key = api
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("DOWNLOAD_API_KEY is not set"))?;

        Ok(Self {
            client: Client::new(),
            endpoint,
            host: api.host.clone(),
            key_header: api.key_header.clone(),
            api_key,
            link_field: api.link_field.clone(),
            transcoder: Transcoder::new(config.ffmpeg_path.clone(), &config.audio_format),
        })
    }

    /// Ask the service for a direct download link
    async fn request_link(&self, url: &str) -> Result<String, AcquisitionError> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("url", url)])
            .header(self.key_header.as_str(), &self.api_key);

        if let Some(host) = &self.host {
            request = request.header("X-RapidAPI-Host", host);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AcquisitionError::DownloadApi(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AcquisitionError::DownloadApi(format!("status {}: {}", status, body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AcquisitionError::DownloadApi(format!("invalid JSON response: {}", e)))?;

        body.get(&self.link_field)
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AcquisitionError::DownloadApi(format!("Download API response missing '{}'", self.link_field)))
    }

    /// Stream the media behind `link` into `work_dir`
    async fn download(&self, link: &str, work_dir: &Path) -> Result<PathBuf, AcquisitionError> {
        let extension = extension_for_link(link);
        let path = work_dir.join(format!("download.{}", extension));

        let response = self
            .client
            .get(link)
            .send()
            .await
            .map_err(|e| AcquisitionError::DownloadApi(format!("download: {}", e)))?;

        if !response.status().is_success() {
            return Err(AcquisitionError::DownloadApi(format!(
                "Failed to download media: HTTP {}",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| AcquisitionError::DownloadApi(format!("cannot create {}: {}", path.display(), e)))?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AcquisitionError::DownloadApi(format!("download: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AcquisitionError::DownloadApi(format!("write: {}", e)))?;
            downloaded += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| AcquisitionError::DownloadApi(format!("write: {}", e)))?;

        tracing::info!(bytes = downloaded, path = %path.display(), "Media downloaded");
        Ok(path)
    }
}

#[async_trait]
impl AudioSource for DownloadApiSource {
    async fn fetch_audio(&self, url: &str, work_dir: &Path) -> Result<PathBuf, AcquisitionError> {
        tracing::info!(url, endpoint = %self.endpoint, "Requesting download link");

        let link = self.request_link(url).await?;
        let downloaded = self.download(&link, work_dir).await?;

        self.transcoder.ensure_target_format(&downloaded).await
    }

    fn source_name(&self) -> &'static str {
        "download API"
    }
}

/// File extension from the link's last path segment, `mp4` when unknown
fn extension_for_link(link: &str) -> &'static str {
    Url::parse(link)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|name| AudioFormat::from_path(Path::new(&name)))
        .unwrap_or(AudioFormat::Mp4)
        .as_str()
}
