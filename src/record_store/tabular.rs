//! # Tabular Record Store
//!
//! Guest records kept as rows under a header row, e.g. a form-response sheet.
//! Row 1 is the header; data row `n` has record id `row_<n>`.

use super::columns::{column_letter, ColumnMap, LogicalColumn};
use super::{apply_defaults, parse_count, select_pending, RecordStore, StatusUpdate};
use crate::config::RecordStoreConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{parse_timestamp, AttachmentRef, GuestRecord, RecordId};
use crate::state_machine::GuestStatus;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One cell write, addressed by 1-based sheet row and 0-based column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: usize,
    pub column: usize,
    pub value: String,
}

impl CellUpdate {
    pub fn new(row: usize, column: usize, value: impl Into<String>) -> Self {
        Self {
            row,
            column,
            value: value.into(),
        }
    }

    /// `A1`-style address, as spreadsheet APIs expect
    pub fn a1_notation(&self) -> String {
        format!("{}{}", column_letter(self.column), self.row)
    }
}

/// Raw access to the backing table
#[async_trait]
pub trait TableClient: Send + Sync {
    /// All rows including the header row at index 0
    async fn read_rows(&self) -> PipelineResult<Vec<Vec<String>>>;

    /// Apply a batch of cell writes
    async fn write_cells(&self, updates: Vec<CellUpdate>) -> PipelineResult<()>;
}

pub struct TabularRecordStore {
    client: Arc<dyn TableClient>,
    settings: RecordStoreConfig,
    columns: RwLock<Option<Arc<ColumnMap>>>,
}

impl std::fmt::Debug for TabularRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabularRecordStore")
            .field("sheet_name", &self.settings.sheet_name)
            .field("columns_resolved", &self.columns.read().is_some())
            .finish()
    }
}

impl TabularRecordStore {
    pub fn new(client: Arc<dyn TableClient>, settings: RecordStoreConfig) -> Self {
        Self {
            client,
            settings,
            columns: RwLock::new(None),
        }
    }

    /// Column map for `headers`, re-resolved only when the header row changes
    fn column_map(&self, headers: &[String]) -> Arc<ColumnMap> {
        if let Some(map) = self.columns.read().as_ref() {
            if map.matches(headers) {
                return map.clone();
            }
        }

        let map = Arc::new(ColumnMap::resolve(headers));
        debug!(
            sheet = %self.settings.sheet_name,
            headers = headers.len(),
            "Resolved column aliases for header row"
        );
        *self.columns.write() = Some(map.clone());
        map
    }

    async fn current_columns(&self) -> PipelineResult<Arc<ColumnMap>> {
        if let Some(map) = self.columns.read().as_ref() {
            return Ok(map.clone());
        }
        let rows = self
            .client
            .read_rows()
            .await
            .map_err(|e| PipelineError::persistence("read_header_row", e))?;
        let headers = rows.first().cloned().unwrap_or_default();
        Ok(self.column_map(&headers))
    }

    fn parse_row(&self, columns: &ColumnMap, row: &[String], row_number: usize) -> PipelineResult<GuestRecord> {
        let cell = |column| columns.cell(row, column).to_string();

        let status_cell = cell(LogicalColumn::Status);
        let status = status_cell.parse::<GuestStatus>().map_err(|e| {
            PipelineError::persistence(format!("parse_status row {row_number}"), e)
        })?;

        let mut record = GuestRecord::new(
            RecordId::for_row(row_number),
            cell(LogicalColumn::FirstName),
            cell(LogicalColumn::LastName),
            cell(LogicalColumn::PassportNumber),
        );
        record.submitted_at = parse_timestamp(columns.cell(row, LogicalColumn::Timestamp));
        record.email = cell(LogicalColumn::Email);
        record.phone = cell(LogicalColumn::Phone);
        record.nationality = cell(LogicalColumn::Nationality);
        record.nationality_code = cell(LogicalColumn::NationalityCode);
        record.passport_expiry = cell(LogicalColumn::PassportExpiry);
        record.attachment_refs =
            AttachmentRef::parse_list(columns.cell(row, LogicalColumn::AttachmentReferences));
        record.check_in_date = cell(LogicalColumn::CheckInDate);
        record.check_in_time = cell(LogicalColumn::CheckInTime);
        record.check_out_date = cell(LogicalColumn::CheckOutDate);
        record.check_out_time = cell(LogicalColumn::CheckOutTime);
        record.total_guests = parse_count(columns.cell(row, LogicalColumn::TotalGuests), 1);
        record.children = parse_count(columns.cell(row, LogicalColumn::Children), 0);
        record.status = status;
        record.processing_notes = Some(cell(LogicalColumn::ProcessingNotes)).filter(|n| !n.is_empty());
        record.last_processed_at = parse_timestamp(columns.cell(row, LogicalColumn::LastProcessed));
        if columns.has(LogicalColumn::PortalSynced) {
            record.portal_synced = Some(
                columns
                    .cell(row, LogicalColumn::PortalSynced)
                    .eq_ignore_ascii_case("true"),
            );
        }

        apply_defaults(&mut record, &self.settings);
        Ok(record)
    }
}

#[async_trait]
impl RecordStore for TabularRecordStore {
    async fn list_pending(&self) -> PipelineResult<Vec<GuestRecord>> {
        let rows = self
            .client
            .read_rows()
            .await
            .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?;

        let Some((headers, data_rows)) = rows.split_first() else {
            info!(sheet = %self.settings.sheet_name, "No rows found in record store");
            return Ok(Vec::new());
        };
        let columns = self.column_map(headers);

        let mut records = Vec::with_capacity(data_rows.len());
        for (index, row) in data_rows.iter().enumerate() {
            // Header is row 1
            let row_number = index + 2;
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            match self.parse_row(&columns, row, row_number) {
                Ok(record) => records.push(record),
                Err(error) => warn!(row = row_number, error = %error, "Skipping unparseable row"),
            }
        }

        let total = records.len();
        let pending = select_pending(records);
        info!(
            sheet = %self.settings.sheet_name,
            total_rows = total,
            pending = pending.len(),
            "📋 Listed pending guest records"
        );
        Ok(pending)
    }

    async fn update_status(&self, id: &RecordId, update: StatusUpdate) -> PipelineResult<()> {
        let row = id.row_number().ok_or_else(|| {
            PipelineError::persistence("update_status", format!("{id} is not a row id"))
        })?;
        let columns = self.current_columns().await?;

        let status_column = columns.index_of(LogicalColumn::Status).ok_or_else(|| {
            PipelineError::persistence("update_status", "no Status column in header row")
        })?;

        let mut updates = vec![CellUpdate::new(row, status_column, update.status.as_str())];
        if let (Some(column), Some(notes)) = (
            columns.index_of(LogicalColumn::ProcessingNotes),
            update.notes.as_ref(),
        ) {
            updates.push(CellUpdate::new(row, column, notes.clone()));
        }
        if let Some(column) = columns.index_of(LogicalColumn::LastProcessed) {
            updates.push(CellUpdate::new(row, column, update.processed_at.to_rfc3339()));
        }
        if update.status == GuestStatus::Completed {
            if let Some(column) = columns.index_of(LogicalColumn::PortalSynced) {
                updates.push(CellUpdate::new(row, column, "TRUE"));
            }
        }

        let cells: Vec<String> = updates.iter().map(CellUpdate::a1_notation).collect();
        self.client
            .write_cells(updates)
            .await
            .map_err(|e| PipelineError::persistence("update_status", e))?;

        debug!(record_id = %id, status = %update.status, cells = ?cells, "Status written to record store");
        Ok(())
    }
}
