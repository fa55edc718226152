//! A [`TableClient`] whose reads and writes can be switched off.

use crate::error::{PipelineError, PipelineResult};
use crate::record_store::{CellUpdate, InMemoryTable, TableClient};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct FlakyTable {
    inner: Arc<InMemoryTable>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    rejected_writes: AtomicUsize,
}

impl FlakyTable {
    pub fn new(inner: Arc<InMemoryTable>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            rejected_writes: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryTable> {
        &self.inner
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn rejected_writes(&self) -> usize {
        self.rejected_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableClient for FlakyTable {
    async fn read_rows(&self) -> PipelineResult<Vec<Vec<String>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PipelineError::Io("table read refused".to_string()));
        }
        self.inner.read_rows().await
    }

    async fn write_cells(&self, updates: Vec<CellUpdate>) -> PipelineResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            self.rejected_writes.fetch_add(1, Ordering::SeqCst);
            return Err(PipelineError::Io("write quota exceeded".to_string()));
        }
        self.inner.write_cells(updates).await
    }
}
