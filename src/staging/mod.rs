//! # Attachment Staging
//!
//! Per-record ephemeral materialization of supporting documents. Paths are
//! namespaced by record id, so two records never share a staged file.

pub mod fetcher;
pub mod stager;

pub use fetcher::{AttachmentFetcher, HttpAttachmentFetcher};
pub use stager::{sanitize_file_name, FileStager, StagedAttachment};
