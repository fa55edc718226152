//! Remote attachment download.

use crate::error::{PipelineError, PipelineResult};
use crate::models::AttachmentRef;
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Downloads one remote attachment reference to a local file
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Write the referenced document to `destination`, returning the byte count.
    async fn fetch(&self, reference: &AttachmentRef, destination: &Path) -> PipelineResult<u64>;
}

#[derive(Debug, Clone)]
pub struct HttpAttachmentFetcher {
    client: Client,
}

impl HttpAttachmentFetcher {
    pub fn new(timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("guestflow/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Configuration(format!("Invalid HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    async fn fetch(&self, reference: &AttachmentRef, destination: &Path) -> PipelineResult<u64> {
        let url = reqwest::Url::parse(reference.as_str())
            .map_err(|e| PipelineError::attachment_fetch(reference.as_str(), e))?;

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::attachment_fetch(reference.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::attachment_fetch(
                reference.as_str(),
                format!("HTTP {status}"),
            ));
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| PipelineError::attachment_fetch(reference.as_str(), e))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(
            reference = %reference,
            destination = %destination.display(),
            bytes = written,
            "Attachment downloaded"
        );
        Ok(written)
    }
}
