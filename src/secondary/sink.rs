use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::configuration::SecondarySyncTarget;

/// Accepts bulk files.
#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Uploads a single file. An error means that the whole file was
    /// rejected and may be sent again.
    async fn send(&self, file: &Path) -> Result<()>;
}

/// Posts bulk files to the `_bulk` endpoint of the secondary store.
pub struct HttpBulkSink {
    client: Client,
    url: String,
    login: String,
    password: String,
}

impl HttpBulkSink {
    pub fn new(target: &SecondarySyncTarget) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("doc-stress/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to create the HTTP client")?;
        Ok(Self {
            client,
            url: target.bulk_url(),
            login: target.login.clone(),
            password: target.password.clone(),
        })
    }
}

#[async_trait]
impl BulkSink for HttpBulkSink {
    async fn send(&self, file: &Path) -> Result<()> {
        let body = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.login, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to post to {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("bulk request rejected with status {status}");
        }
        Ok(())
    }
}
