use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GeminiConfig;

/// Header carrying the API key on every Gemini request
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

/// Shared reqwest client plus the endpoint roots it talks to
#[derive(Debug, Clone)]
pub struct GeminiHttp {
    client: Client,
    base_url: String,
    upload_url: String,
}

impl GeminiHttp {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.call_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            upload_url: config.upload_url.clone(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn file_status_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.base_url, file_id)
    }

    pub fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// Send a request, retrying once when the connection itself could not be
    /// established. HTTP error statuses are returned as-is.
    pub async fn send_with_connect_retry(
        &self,
        builder: RequestBuilder,
    ) -> Result<Response, reqwest::Error> {
        let retry = builder.try_clone();
        retry_on_connect(builder.send(), move || retry.map(RequestBuilder::send)).await
    }
}

/// Await `first`; if it failed to connect, await the attempt built by `retry`
async fn retry_on_connect<T, Fut>(
    first: Fut,
    retry: impl FnOnce() -> Option<Fut>,
) -> Result<T, reqwest::Error>
where
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    match first.await {
        Err(err) if err.is_connect() => match retry() {
            Some(next) => {
                warn!("Connection failed, retrying once: {}", err);
                next.await
            }
            None => Err(err),
        },
        Err(err) => {
            debug!("Request failed without retry: {}", err);
            Err(err)
        }
        ok => ok,
    }
}

/// Last path segment of a remote handle, used as the file id
pub(crate) fn file_id(handle: &str) -> &str {
    handle.rsplit('/').next().unwrap_or(handle)
}
