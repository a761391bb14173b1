//! Strike locator: nearest-premium search over an option-chain column.

use straddle_terminal::CellValue;

/// Row picked by [`locate`] and the premium found there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    pub row: u32,
    pub value: f64,
}

/// Finds the candidate whose numeric value is closest to `target`.
///
/// Non-numeric and empty cells are skipped. Ties go to the earliest candidate
/// in input order. Returns `None` when nothing numeric remains or `target`
/// itself is not finite.
#[must_use]
pub fn locate(candidates: &[(u32, CellValue)], target: f64) -> Option<Located> {
    if !target.is_finite() {
        return None;
    }

    let mut best: Option<(Located, f64)> = None;
    for (row, cell) in candidates {
        let Some(value) = cell.as_f64() else {
            continue;
        };
        let distance = (value - target).abs();
        // Strict comparison keeps the first of equally distant candidates.
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((Located { row: *row, value }, distance));
        }
    }
    best.map(|(located, _)| located)
}
