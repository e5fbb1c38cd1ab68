use std::time::Duration;

use dispenser_config::Fetch;
use reqwest::{Client, Url};

use crate::error::FetchError;

/// Downloads remote key lists for bulk ingestion.
pub struct HttpFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(cfg: &Fetch) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            client,
            max_bytes: cfg.max_bytes,
        })
    }

    /// Returns the raw document body. Non-success statuses and bodies larger
    /// than the configured limit are failures.
    pub async fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        let url = Url::parse(locator).map_err(|e| FetchError::InvalidLocator(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidLocator(format!(
                "scheme {} is not supported",
                url.scheme()
            )));
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
