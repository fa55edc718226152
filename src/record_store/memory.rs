//! In-memory [`TableClient`], used for dry runs and tests.

use super::tabular::{CellUpdate, TableClient};
use crate::error::PipelineResult;
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryTable {
    rows: Mutex<Vec<Vec<String>>>,
}

impl InMemoryTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn with_rows(headers: &[&str], rows: Vec<Vec<&str>>) -> Self {
        let mut all = Vec::with_capacity(rows.len() + 1);
        all.push(headers.iter().map(|h| h.to_string()).collect());
        all.extend(
            rows.into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect()),
        );
        Self::new(all)
    }

    pub fn push_row(&self, row: Vec<String>) {
        self.rows.lock().push(row);
    }

    pub fn snapshot(&self) -> Vec<Vec<String>> {
        self.rows.lock().clone()
    }

    /// Value at 1-based sheet `row` under the header named `header`
    pub fn cell(&self, row: usize, header: &str) -> Option<String> {
        let rows = self.rows.lock();
        let column = rows.first()?.iter().position(|h| h == header)?;
        rows.get(row.checked_sub(1)?)?.get(column).cloned()
    }
}

#[async_trait]
impl TableClient for InMemoryTable {
    async fn read_rows(&self) -> PipelineResult<Vec<Vec<String>>> {
        Ok(self.snapshot())
    }

    async fn write_cells(&self, updates: Vec<CellUpdate>) -> PipelineResult<()> {
        let mut rows = self.rows.lock();
        for update in updates {
            let Some(row_index) = update.row.checked_sub(1) else {
                continue;
            };
            if rows.len() <= row_index {
                rows.resize_with(row_index + 1, Vec::new);
            }
            let row = &mut rows[row_index];
            if row.len() <= update.column {
                row.resize(update.column + 1, String::new());
            }
            row[update.column] = update.value;
        }
        Ok(())
    }
}
