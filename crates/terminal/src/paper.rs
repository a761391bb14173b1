//! In-memory cell store.
//!
//! Backs paper sessions (a workbook snapshot loaded once, every write kept in
//! memory) and the test suites. Keeps a write journal so callers can see exactly
//! which instructions the engine issued.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::{normalize_column, CellAddress, CellValue, QuoteStore, StoreError};

/// Serialized workbook: sheet name -> A1 reference -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkbookSnapshot(pub BTreeMap<String, BTreeMap<String, CellValue>>);

impl WorkbookSnapshot {
    /// Loads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Writes the snapshot as pretty JSON via a temp file and rename.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let raw = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    fn into_cells(self) -> Result<BTreeMap<CellAddress, CellValue>, StoreError> {
        let mut cells = BTreeMap::new();
        for (sheet, entries) in self.0 {
            for (reference, value) in entries {
                cells.insert(CellAddress::parse(&sheet, &reference)?, value);
            }
        }
        Ok(cells)
    }

    fn from_cells(cells: &BTreeMap<CellAddress, CellValue>) -> Self {
        let mut sheets: BTreeMap<String, BTreeMap<String, CellValue>> = BTreeMap::new();
        for (address, value) in cells {
            if value.is_empty() {
                continue;
            }
            sheets
                .entry(address.sheet.clone())
                .or_default()
                .insert(address.a1(), value.clone());
        }
        Self(sheets)
    }

    pub(crate) fn get(&self, address: &CellAddress) -> CellValue {
        self.0
            .get(&address.sheet)
            .and_then(|sheet| sheet.get(&address.a1()))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn set(&mut self, address: &CellAddress, value: CellValue) {
        let sheet = self.0.entry(address.sheet.clone()).or_default();
        if value.is_empty() {
            sheet.remove(&address.a1());
        } else {
            sheet.insert(address.a1(), value);
        }
    }

    /// Lays `other` over this snapshot; cells present in `other` win.
    pub(crate) fn overlay(&mut self, other: WorkbookSnapshot) {
        for (sheet, entries) in other.0 {
            self.0.entry(sheet).or_default().extend(entries);
        }
    }

    pub(crate) fn column(&self, sheet: &str, column: &str) -> Result<Vec<(u32, CellValue)>, StoreError> {
        let Some(cells) = self.0.get(sheet) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for (reference, value) in cells {
            let address = CellAddress::parse(sheet, reference)?;
            if address.column == column && !value.is_empty() {
                out.push((address.row, value.clone()));
            }
        }
        out.sort_by_key(|(row, _)| *row);
        Ok(out)
    }
}

/// Thread-safe in-memory [`QuoteStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    cells: RwLock<BTreeMap<CellAddress, CellValue>>,
    journal: RwLock<Vec<(CellAddress, CellValue)>>,
    failing: RwLock<HashSet<CellAddress>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAddress`] if the snapshot holds a bad reference.
    pub fn from_snapshot(snapshot: WorkbookSnapshot) -> Result<Self, StoreError> {
        let store = Self::new();
        *store.cells.write() = snapshot.into_cells()?;
        Ok(store)
    }

    /// Loads a paper session from a snapshot file. Writes never touch the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let snapshot = WorkbookSnapshot::load(path).await?;
        info!(path = %path.display(), "Paper store loaded from snapshot");
        Self::from_snapshot(snapshot)
    }

    /// Current contents as a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> WorkbookSnapshot {
        WorkbookSnapshot::from_cells(&self.cells.read())
    }

    /// Sets a cell directly, bypassing the journal (stands in for the
    /// external feed updating the workbook).
    pub fn set(&self, address: &CellAddress, value: impl Into<CellValue>) {
        self.cells.write().insert(address.clone(), value.into());
    }

    /// Reads a cell directly.
    #[must_use]
    pub fn get(&self, address: &CellAddress) -> CellValue {
        self.cells.read().get(address).cloned().unwrap_or_default()
    }

    /// Every write issued through [`QuoteStore::write`], in order.
    #[must_use]
    pub fn journal(&self) -> Vec<(CellAddress, CellValue)> {
        self.journal.read().clone()
    }

    /// Number of journaled writes to `address`.
    #[must_use]
    pub fn writes_to(&self, address: &CellAddress) -> usize {
        self.journal.read().iter().filter(|(a, _)| a == address).count()
    }

    /// Makes every read and write of `address` fail until [`Self::recover`].
    pub fn fail(&self, address: &CellAddress) {
        self.failing.write().insert(address.clone());
    }

    pub fn recover(&self, address: &CellAddress) {
        self.failing.write().remove(address);
    }

    fn check(&self, address: &CellAddress) -> Result<(), StoreError> {
        if self.failing.read().contains(address) {
            return Err(StoreError::Unavailable {
                address: address.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteStore for MemoryStore {
    async fn read(&self, address: &CellAddress) -> Result<CellValue, StoreError> {
        self.check(address)?;
        Ok(self.get(address))
    }

    async fn write(&self, address: &CellAddress, value: CellValue) -> Result<(), StoreError> {
        self.check(address)?;
        self.cells.write().insert(address.clone(), value.clone());
        self.journal.write().push((address.clone(), value));
        Ok(())
    }

    async fn read_column(
        &self,
        sheet: &str,
        column: &str,
    ) -> Result<Vec<(u32, CellValue)>, StoreError> {
        let column = normalize_column(column)?;
        // BTreeMap key order is (sheet, column, row), so rows come out sorted.
        Ok(self
            .cells
            .read()
            .iter()
            .filter(|(address, value)| {
                address.sheet == sheet && address.column == column && !value.is_empty()
            })
            .map(|(address, value)| (address.row, value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(reference: &str) -> CellAddress {
        CellAddress::parse("Trade_Terminal", reference).unwrap()
    }

    #[tokio::test]
    async fn unwritten_cells_read_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.read(&addr("Q5")).await.unwrap(), CellValue::Empty);
    }

    #[tokio::test]
    async fn column_reads_are_row_ordered_and_skip_blanks() {
        let store = MemoryStore::new();
        store.set(&addr("A10"), "NFO:X");
        store.set(&addr("A2"), "NFO:Y");
        store.set(&addr("A3"), "");
        store.set(&addr("B4"), 1.0);

        let column = store.read_column("Trade_Terminal", "a").await.unwrap();
        let rows: Vec<u32> = column.iter().map(|(row, _)| *row).collect();
        assert_eq!(rows, vec![2, 10]);
        assert_eq!(
            store.last_used_row("Trade_Terminal", "A").await.unwrap(),
            Some(10)
        );
        assert_eq!(store.last_used_row("Other", "A").await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_are_journaled_and_failures_injected() {
        let store = MemoryStore::new();
        let cell = addr("T2");
        store.write(&cell, "True_Market".into()).await.unwrap();
        assert_eq!(store.writes_to(&cell), 1);

        store.fail(&cell);
        assert!(matches!(
            store.write(&cell, "True_Market".into()).await,
            Err(StoreError::Unavailable { .. })
        ));
        assert!(store.read(&cell).await.is_err());
        assert_eq!(store.writes_to(&cell), 1);

        store.recover(&cell);
        assert!(store.read(&cell).await.is_ok());
    }

    #[test]
    fn snapshot_round_trips_through_store() {
        let raw = r#"{
            "Option_Chain_Input": { "E3": "NIFTY", "C2": 75 },
            "Trade_Terminal": { "AH2": 20.5 }
        }"#;
        let snapshot: WorkbookSnapshot = serde_json::from_str(raw).unwrap();
        let store = MemoryStore::from_snapshot(snapshot.clone()).unwrap();
        assert_eq!(
            store.get(&CellAddress::parse("Option_Chain_Input", "E3").unwrap()),
            CellValue::Text("NIFTY".into())
        );
        assert_eq!(store.snapshot(), snapshot);
    }
}
