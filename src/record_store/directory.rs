//! # Directory Record Store
//!
//! One directory per guest (`<root>/guest_<id>/guest_info.json`), as written by the
//! intake form handler. Documents are updated in place: unknown fields are kept,
//! and the status is written in the lowercase spelling the intake side uses.

use super::{apply_defaults, parse_count, select_pending, RecordStore, StatusUpdate};
use crate::config::RecordStoreConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{parse_timestamp, AttachmentRef, GuestRecord, RecordId};
use crate::state_machine::GuestStatus;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const GUEST_DIR_PREFIX: &str = "guest_";
pub const GUEST_INFO_FILE: &str = "guest_info.json";

#[derive(Debug, Clone)]
pub struct DirectoryRecordStore {
    root: PathBuf,
    settings: RecordStoreConfig,
}

impl DirectoryRecordStore {
    pub fn new(root: impl Into<PathBuf>, settings: RecordStoreConfig) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn info_path(&self, id: &RecordId) -> PathBuf {
        self.root.join(id.as_str()).join(GUEST_INFO_FILE)
    }

    async fn read_document(path: &Path) -> PipelineResult<Map<String, Value>> {
        let raw = tokio::fs::read_to_string(path).await?;
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(PipelineError::Io(format!(
                "{} is not a JSON object",
                path.display()
            ))),
        }
    }

    fn parse_document(&self, id: RecordId, doc: &Map<String, Value>) -> PipelineResult<GuestRecord> {
        let text = |key: &str| -> String {
            match doc.get(key) {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            }
        };

        let status = text("status").parse::<GuestStatus>().map_err(|e| {
            PipelineError::persistence(format!("parse_status {id}"), e)
        })?;

        let mut record = GuestRecord::new(
            id,
            text("firstName"),
            text("lastName"),
            text("passportNumber"),
        );
        record.submitted_at = parse_timestamp(&text("submissionTime"));
        record.email = text("email");
        record.phone = text("phone");
        record.nationality = text("nationality");
        record.nationality_code = text("nationalityCode");
        record.passport_expiry = text("passportExpiry");
        record.attachment_refs = match doc.get("passportFiles") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(AttachmentRef::new)
                .collect(),
            Some(Value::String(cell)) => AttachmentRef::parse_list(cell),
            _ => Vec::new(),
        };
        record.check_in_date = text("checkInDate");
        record.check_in_time = text("checkInTime");
        record.check_out_date = text("checkOutDate");
        record.check_out_time = text("checkOutTime");
        record.total_guests = parse_count(&text("totalGuests"), 1);
        record.children = parse_count(&text("children"), 0);
        record.status = status;
        record.processing_notes = Some(text("processingNotes")).filter(|n| !n.is_empty());
        record.last_processed_at = parse_timestamp(&text("lastProcessed"));

        apply_defaults(&mut record, &self.settings);
        Ok(record)
    }
}

#[async_trait]
impl RecordStore for DirectoryRecordStore {
    async fn list_pending(&self) -> PipelineResult<Vec<GuestRecord>> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            PipelineError::StoreUnavailable(format!("{}: {e}", self.root.display()))
        })?;

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(GUEST_DIR_PREFIX) {
                continue;
            }
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let id = RecordId::new(name);
            let path = self.info_path(&id);
            let parsed = match Self::read_document(&path).await {
                Ok(doc) => self.parse_document(id.clone(), &doc),
                Err(error) => Err(error),
            };
            match parsed {
                Ok(record) => records.push(record),
                Err(error) => warn!(record_id = %id, error = %error, "Could not read guest info"),
            }
        }

        // Directory listing order is platform-defined; fix it before the stable sort
        records.sort_by(|a, b| a.id.cmp(&b.id));
        let total = records.len();
        let pending = select_pending(records);
        info!(
            root = %self.root.display(),
            total_guests = total,
            pending = pending.len(),
            "📋 Listed pending guest records"
        );
        Ok(pending)
    }

    async fn update_status(&self, id: &RecordId, update: StatusUpdate) -> PipelineResult<()> {
        let path = self.info_path(id);
        let mut doc = Self::read_document(&path)
            .await
            .map_err(|e| PipelineError::persistence("update_status", e))?;

        let processed_at = update.processed_at.to_rfc3339();
        doc.insert(
            "status".to_string(),
            Value::String(update.status.as_str().to_lowercase()),
        );
        doc.insert(
            "processingNotes".to_string(),
            Value::String(update.notes.unwrap_or_default()),
        );
        doc.insert("lastProcessed".to_string(), Value::String(processed_at.clone()));
        if update.status == GuestStatus::Completed {
            doc.insert("portalSubmittedAt".to_string(), Value::String(processed_at));
        }

        let body = serde_json::to_string_pretty(&Value::Object(doc))
            .map_err(|e| PipelineError::persistence("update_status", e))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| PipelineError::persistence("update_status", e))?;

        debug!(record_id = %id, status = %update.status, "Guest info updated");
        Ok(())
    }
}
