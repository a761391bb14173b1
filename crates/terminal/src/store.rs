//! Cell store abstraction.
//!
//! The trade terminal lives in a spreadsheet that is reachable only through
//! independent cell round trips. [`QuoteStore`] is that seam: every read and
//! write is a separate call that may be slow or fail, with no transactions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a cell store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not serve this address right now.
    #[error("cell {address} unavailable: {reason}")]
    Unavailable { address: String, reason: String },

    /// Malformed sheet/column/row reference.
    #[error("invalid cell reference: {0}")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Logical cell location: sheet, column letters, 1-based row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub sheet: String,
    pub column: String,
    pub row: u32,
}

impl CellAddress {
    /// Builds an address, validating the column letters and row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAddress`] for a non-alphabetic column or row 0.
    pub fn new(sheet: &str, column: &str, row: u32) -> Result<Self, StoreError> {
        let column = normalize_column(column)?;
        if row == 0 {
            return Err(StoreError::InvalidAddress(format!("{sheet}!{column}0")));
        }
        Ok(Self {
            sheet: sheet.to_string(),
            column,
            row,
        })
    }

    /// Parses an A1 reference such as `"AH2"` on `sheet`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAddress`] if `reference` is not `LETTERS DIGITS`.
    pub fn parse(sheet: &str, reference: &str) -> Result<Self, StoreError> {
        let reference = reference.trim();
        let split = reference
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| StoreError::InvalidAddress(reference.to_string()))?;
        let (column, row) = reference.split_at(split);
        let row: u32 = row
            .parse()
            .map_err(|_| StoreError::InvalidAddress(reference.to_string()))?;
        Self::new(sheet, column, row)
    }

    /// The A1 form without the sheet (`"Q12"`).
    #[must_use]
    pub fn a1(&self) -> String {
        format!("{}{}", self.column, self.row)
    }
}

impl std::fmt::Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}{}", self.sheet, self.column, self.row)
    }
}

/// Uppercases and checks a column reference.
///
/// # Errors
///
/// Returns [`StoreError::InvalidAddress`] if `column` is empty or not ASCII letters.
pub fn normalize_column(column: &str) -> Result<String, StoreError> {
    let column = column.trim();
    if column.is_empty() || !column.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(StoreError::InvalidAddress(column.to_string()));
    }
    Ok(column.to_ascii_uppercase())
}

/// A scalar cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Numeric reading of the cell: finite numbers, or text that parses as one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Empty | Self::Bool(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Non-blank text content.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Addressable cell grid backing the trade terminal.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Reads one cell. Never-written cells read as [`CellValue::Empty`].
    async fn read(&self, address: &CellAddress) -> Result<CellValue, StoreError>;

    /// Writes one cell.
    async fn write(&self, address: &CellAddress, value: CellValue) -> Result<(), StoreError>;

    /// All non-empty cells of a column as `(row, value)`, ordered by row.
    async fn read_column(
        &self,
        sheet: &str,
        column: &str,
    ) -> Result<Vec<(u32, CellValue)>, StoreError>;

    /// Last row with a non-empty value in `column`, `None` if the column is blank.
    async fn last_used_row(&self, sheet: &str, column: &str) -> Result<Option<u32>, StoreError> {
        let cells = self.read_column(sheet, column).await?;
        Ok(cells
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(row, _)| *row)
            .max())
    }
}
