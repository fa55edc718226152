//! Attachment fetcher with a canned response.

use crate::error::{PipelineError, PipelineResult};
use crate::models::AttachmentRef;
use crate::staging::AttachmentFetcher;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug)]
pub struct ScriptedFetcher {
    body: Vec<u8>,
    failure: Option<String>,
    /// Number of leading calls that fail before the body is served
    failures_remaining: AtomicU32,
    calls: AtomicU32,
}

impl ScriptedFetcher {
    pub fn succeeding(body: Vec<u8>) -> Self {
        Self {
            body,
            failure: None,
            failures_remaining: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            body: Vec::new(),
            failure: Some(reason.to_string()),
            failures_remaining: AtomicU32::new(u32::MAX),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail the first `times` calls with `reason`, then serve `body`
    pub fn failing_times(times: u32, reason: &str, body: Vec<u8>) -> Self {
        Self {
            body,
            failure: Some(reason.to_string()),
            failures_remaining: AtomicU32::new(times),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttachmentFetcher for ScriptedFetcher {
    async fn fetch(&self, reference: &AttachmentRef, destination: &Path) -> PipelineResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            let should_fail = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                return Err(PipelineError::attachment_fetch(reference.as_str(), reason));
            }
        }
        tokio::fs::write(destination, &self.body).await?;
        Ok(self.body.len() as u64)
    }
}
