//! # File Stager
//!
//! Materializes a record's attachment under `<root>/<record id>/` for exactly one
//! submission attempt. Staging is a soft operation: any failure is logged and
//! reported as "no attachment", never as an error that stops the record.
//!
//! The stager does not decide when files go away. The orchestrator releases the
//! staged file after a successful submission and leaves it in place after a
//! failure so the operator can inspect what was sent.

use super::fetcher::{AttachmentFetcher, HttpAttachmentFetcher};
use crate::config::StagingConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{AttachmentRef, RecordId};
use crate::resilience::RetryPolicy;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_FILE_NAME: &str = "passport_document";

/// A locally materialized attachment owned by one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAttachment {
    pub record_id: RecordId,
    pub path: PathBuf,
    pub source: AttachmentRef,
}

pub struct FileStager {
    root: PathBuf,
    fetcher: Arc<dyn AttachmentFetcher>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for FileStager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStager")
            .field("root", &self.root)
            .field("retry", &self.retry)
            .finish()
    }
}

impl FileStager {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn AttachmentFetcher>, retry: RetryPolicy) -> Self {
        Self {
            root: root.into(),
            fetcher,
            retry,
        }
    }

    /// Stager downloading over HTTP with the configured short retry
    pub fn from_config(config: &StagingConfig) -> PipelineResult<Self> {
        let fetcher = HttpAttachmentFetcher::new(config.fetch_timeout())?;
        Ok(Self::new(
            config.directory.clone(),
            Arc::new(fetcher),
            config.fetch_policy(),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_dir(&self, record_id: &RecordId) -> PathBuf {
        self.root.join(sanitize_file_name(record_id.as_str(), "record"))
    }

    /// Stage `reference` for `record_id`; `None` when absent or not retrievable.
    pub async fn stage(
        &self,
        record_id: &RecordId,
        reference: Option<&AttachmentRef>,
    ) -> Option<StagedAttachment> {
        let Some(reference) = reference else {
            debug!(record_id = %record_id, "No attachment to stage");
            return None;
        };

        let dir = self.record_dir(record_id);
        if let Err(error) = tokio::fs::create_dir_all(&dir).await {
            warn!(
                record_id = %record_id,
                dir = %dir.display(),
                error = %error,
                "⚠️ Could not create staging directory, continuing without attachment"
            );
            return None;
        }

        let file_name = sanitize_file_name(
            reference.file_name_hint().unwrap_or(DEFAULT_FILE_NAME),
            DEFAULT_FILE_NAME,
        );
        let destination = dir.join(file_name);

        match self.materialize(reference, &destination).await {
            Ok(bytes) => {
                info!(
                    record_id = %record_id,
                    path = %destination.display(),
                    bytes = bytes,
                    "📎 Attachment staged"
                );
                Some(StagedAttachment {
                    record_id: record_id.clone(),
                    path: destination,
                    source: reference.clone(),
                })
            }
            Err(error) => {
                warn!(
                    record_id = %record_id,
                    reference = %reference,
                    error = %error,
                    "⚠️ Attachment unavailable, submitting without it"
                );
                if let Err(cleanup) = self.release_path(&destination).await {
                    warn!(path = %destination.display(), error = %cleanup, "Could not remove partial attachment");
                }
                remove_dir_if_empty(&dir).await;
                None
            }
        }
    }

    async fn materialize(&self, reference: &AttachmentRef, destination: &Path) -> PipelineResult<u64> {
        match reference.local_path() {
            Some(source) => {
                let source = Path::new(source);
                self.retry
                    .run("attachment_copy", |_| async move {
                        tokio::fs::copy(source, destination).await.map_err(|e| {
                            PipelineError::attachment_fetch(source.display().to_string(), e)
                        })
                    })
                    .await
            }
            None => {
                let fetcher: &dyn AttachmentFetcher = self.fetcher.as_ref();
                self.retry
                    .run("attachment_fetch", |_| fetcher.fetch(reference, destination))
                    .await
            }
        }
    }

    /// Delete a staged attachment. Releasing twice is not an error.
    pub async fn release(&self, staged: &StagedAttachment) -> PipelineResult<()> {
        self.release_path(&staged.path).await?;
        if let Some(dir) = staged.path.parent() {
            remove_dir_if_empty(dir).await;
        }
        debug!(record_id = %staged.record_id, path = %staged.path.display(), "Attachment released");
        Ok(())
    }

    /// Idempotent delete of one staged path
    pub async fn release_path(&self, path: &Path) -> PipelineResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove everything staged for a record, for operator cleanup of retained failures
    pub async fn release_record(&self, record_id: &RecordId) -> PipelineResult<()> {
        match tokio::fs::remove_dir_all(self.record_dir(record_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Files currently staged for a record
    pub async fn staged_files(&self, record_id: &RecordId) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(self.record_dir(record_id)).await else {
            return files;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            files.push(entry.path());
        }
        files.sort();
        files
    }
}

async fn remove_dir_if_empty(dir: &Path) {
    // remove_dir refuses non-empty directories, which is the desired check
    let _ = tokio::fs::remove_dir(dir).await;
}

/// Restrict a name to `[A-Za-z0-9._-]`, never starting with a dot
pub fn sanitize_file_name(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
