//! JSON-file cell store.
//!
//! Two files, each with a single writer. The workbook bridge owns the quote
//! snapshot: it mirrors premiums, the option chain and session inputs into it.
//! This process owns the instruction file, and the bridge only reads it to
//! apply position and close rows to the workbook.
//!
//! Reads lay the instructions over the snapshot so this process always sees
//! its own writes. Every call re-reads both files, so values refreshed by the
//! bridge show up on the next round trip.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::paper::WorkbookSnapshot;
use crate::store::{normalize_column, CellAddress, CellValue, QuoteStore, StoreError};

pub struct JsonFileStore {
    snapshot_path: PathBuf,
    instructions_path: PathBuf,
    // Serializes read-modify-write cycles on the instruction file.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store over `snapshot_path`, with instructions written next to it as
    /// `<stem>.instructions.json`.
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        let snapshot_path = snapshot_path.into();
        let instructions_path = snapshot_path.with_extension("instructions.json");
        Self::with_instructions(snapshot_path, instructions_path)
    }

    pub fn with_instructions(
        snapshot_path: impl Into<PathBuf>,
        instructions_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            instructions_path: instructions_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    #[must_use]
    pub fn instructions_path(&self) -> &Path {
        &self.instructions_path
    }

    async fn load_or_empty(path: &Path) -> Result<WorkbookSnapshot, StoreError> {
        match WorkbookSnapshot::load(path).await {
            Ok(snapshot) => Ok(snapshot),
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(WorkbookSnapshot::default())
            }
            Err(e) => Err(e),
        }
    }

    async fn load_merged(&self) -> Result<WorkbookSnapshot, StoreError> {
        let mut merged = Self::load_or_empty(&self.snapshot_path).await?;
        merged.overlay(Self::load_or_empty(&self.instructions_path).await?);
        Ok(merged)
    }
}

#[async_trait]
impl QuoteStore for JsonFileStore {
    async fn read(&self, address: &CellAddress) -> Result<CellValue, StoreError> {
        Ok(self.load_merged().await?.get(address))
    }

    async fn write(&self, address: &CellAddress, value: CellValue) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut instructions = Self::load_or_empty(&self.instructions_path).await?;
        instructions.set(address, value);
        instructions.save(&self.instructions_path).await?;
        debug!(cell = %address, path = %self.instructions_path.display(), "Instruction cell written");
        Ok(())
    }

    async fn read_column(
        &self,
        sheet: &str,
        column: &str,
    ) -> Result<Vec<(u32, CellValue)>, StoreError> {
        let column = normalize_column(column)?;
        self.load_merged().await?.column(sheet, &column)
    }
}
