use reqwest::header::CONTENT_LENGTH;
use reqwest::Body;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::client::{file_id, GeminiHttp, API_KEY_HEADER};
use super::messages::{
    FileState, FileStatusResponse, UploadFileMetadata, UploadFinalizeResponse,
    UploadStartRequest,
};
use crate::config::GeminiConfig;
use crate::error::UploadError;
use crate::model::{is_usable_key, RemoteHandle};

const UPLOAD_URL_HEADER: &str = "X-Goog-Upload-URL";

/// How long to wait for server-side processing of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait between status requests
    pub interval: Duration,
    /// Maximum number of status requests
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 30, // ~5 minutes
        }
    }
}

impl From<&GeminiConfig> for PollPolicy {
    fn from(config: &GeminiConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }
}

/// Uploads local media to the Gemini file store
#[derive(Debug, Clone)]
pub struct FileUploader {
    http: GeminiHttp,
    poll: PollPolicy,
}

impl FileUploader {
    pub fn new(http: GeminiHttp, poll: PollPolicy) -> Self {
        Self { http, poll }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Upload `path` and return the remote handle assigned to it
    pub async fn upload(
        &self,
        path: &Path,
        credential: &str,
    ) -> Result<RemoteHandle, UploadError> {
        if !is_usable_key(credential) {
            return Err(UploadError::Unconfigured);
        }

        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
            _ => return Err(UploadError::EmptyOrMissingFile(path.to_path_buf())),
        };

        let mime_type = mime_type_for(path);
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_string());

        info!(
            "Uploading {} ({} bytes, {})",
            path.display(),
            size,
            mime_type
        );

        let upload_url = self
            .initiate(credential, size, mime_type, display_name)
            .await?;
        debug!("Resumable upload initiated: {}", upload_url);

        let handle = self.transfer(&upload_url, path, size, mime_type).await?;
        info!("Upload complete: {}", handle);

        Ok(handle)
    }

    async fn initiate(
        &self,
        credential: &str,
        size: u64,
        mime_type: &str,
        display_name: String,
    ) -> Result<String, UploadError> {
        let metadata = UploadStartRequest {
            file: UploadFileMetadata { display_name },
        };

        let response = self
            .http
            .client()
            .post(self.http.upload_url())
            .header(API_KEY_HEADER, credential)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&metadata)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Failed to initiate upload: {} {}", status, body);
            return Err(UploadError::InitiateFailed(format!("status {}: {}", status, body)));
        }

        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                UploadError::InitiateFailed(format!("response missing {} header", UPLOAD_URL_HEADER))
            })
    }

    async fn transfer(
        &self,
        upload_url: &str,
        path: &Path,
        size: u64,
        mime_type: &str,
    ) -> Result<RemoteHandle, UploadError> {
        let file = tokio::fs::File::open(path).await?;

        let response = self
            .http
            .client()
            .post(upload_url)
            .header(CONTENT_LENGTH, size)
            .header("Content-Type", mime_type)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(Body::from(file))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("Failed to upload file data: {} {}", status, body);
            return Err(UploadError::TransferFailed(format!("status {}: {}", status, body)));
        }

        let parsed: UploadFinalizeResponse = serde_json::from_str(&body)
            .map_err(|e| UploadError::TransferFailed(format!("malformed response: {}", e)))?;

        if parsed.file.uri.is_empty() {
            return Err(UploadError::TransferFailed("response has empty file uri".to_string()));
        }

        Ok(parsed.file.uri)
    }

    /// Poll the file status until it is ACTIVE (true), FAILED (false), or
    /// the attempt budget runs out (false).
    pub async fn wait_until_active(&self, handle: &str, credential: &str) -> bool {
        let id = file_id(handle);
        let url = self.http.file_status_url(id);

        for attempt in 1..=self.poll.max_attempts {
            let response = match self
                .http
                .client()
                .get(&url)
                .header(API_KEY_HEADER, credential)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!("Error checking status of file {}: {}", id, e);
                    return false;
                }
            };

            if !response.status().is_success() {
                error!("Failed to check status of file {}: {}", id, response.status());
                return false;
            }

            let state = match response.json::<FileStatusResponse>().await {
                Ok(status) => status.state,
                Err(e) => {
                    warn!("Unreadable status for file {}: {}", id, e);
                    None
                }
            };

            match state {
                Some(FileState::Active) => {
                    info!("File {} is active", id);
                    return true;
                }
                Some(FileState::Failed) => {
                    error!("File {} failed to process", id);
                    return false;
                }
                _ => {
                    debug!(
                        "File {} still processing (attempt {}/{})",
                        id, attempt, self.poll.max_attempts
                    );
                    if attempt < self.poll.max_attempts {
                        tokio::time::sleep(self.poll.interval).await;
                    }
                }
            }
        }

        error!(
            "File {} did not become active after {} checks",
            id, self.poll.max_attempts
        );
        false
    }
}

/// MIME type for an upload, defaulting to MP4 for screen recordings
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "mp3" => "audio/mp3",
        "m4a" => "audio/m4a",
        "wav" => "audio/wav",
        "avi" => "video/avi",
        "mov" => "video/mov",
        "webm" => "video/webm",
        _ => "video/mp4",
    }
}
