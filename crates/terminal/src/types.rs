//! Core types for straddle legs as the terminal sees them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// The other side of the straddle.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Call => Self::Put,
            Self::Put => Self::Call,
        }
    }

    /// Single-letter code used inside instrument ids.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// An options contract specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsContract {
    /// Exchange segment (e.g., "NFO").
    pub exchange: String,
    pub symbol: String,
    pub expiry: NaiveDate,
    pub strike: Decimal,
    pub option_type: OptionType,
}

impl OptionsContract {
    pub fn new(
        exchange: &str,
        symbol: &str,
        expiry: NaiveDate,
        strike: Decimal,
        option_type: OptionType,
    ) -> Self {
        Self {
            exchange: exchange.to_uppercase(),
            symbol: symbol.to_uppercase(),
            expiry,
            strike,
            option_type,
        }
    }

    /// Canonical terminal instrument id (e.g., "NFO:NIFTY28OCT25C25000").
    pub fn instrument_id(&self) -> String {
        format!(
            "{}:{}{}{}{}",
            self.exchange,
            self.symbol,
            format_expiry(self.expiry),
            self.option_type.code(),
            self.strike.trunc().normalize()
        )
    }

    /// Human-readable contract description (e.g., "NIFTY 25000 CALL 2025-10-28").
    pub fn display_name(&self) -> String {
        format!(
            "{} {} {} {}",
            self.symbol,
            self.strike.normalize(),
            self.option_type,
            self.expiry
        )
    }
}

/// Expiry as it appears inside instrument ids: `DDMONYY`, upper case.
pub fn format_expiry(expiry: NaiveDate) -> String {
    expiry.format("%d%b%y").to_string().to_uppercase()
}

/// What gets written to a fresh terminal row to open a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionTicket {
    pub instrument_id: String,
    pub size: u32,
    pub side: Side,
}

/// Session parameters read from the input sheet at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInputs {
    pub symbol: String,
    pub expiry: NaiveDate,
    pub lot_size: u32,
    pub call_search_premium: Option<f64>,
    pub put_search_premium: Option<f64>,
}

impl SessionInputs {
    /// Sum of the search premiums, missing ones counted as 0.
    #[must_use]
    pub fn search_premium_total(&self) -> f64 {
        self.call_search_premium.unwrap_or(0.0) + self.put_search_premium.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn instrument_id_matches_terminal_format() {
        let expiry = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap();
        let contract = OptionsContract::new("nfo", "nifty", expiry, dec!(25000), OptionType::Call);
        assert_eq!(contract.instrument_id(), "NFO:NIFTY28OCT25C25000");
    }

    #[test]
    fn instrument_id_truncates_fractional_strike() {
        let expiry = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let contract = OptionsContract::new("NFO", "BANKNIFTY", expiry, dec!(51200.0), OptionType::Put);
        assert_eq!(contract.instrument_id(), "NFO:BANKNIFTY06JAN26P51200");
    }

    #[test]
    fn opposite_flips_type() {
        assert_eq!(OptionType::Call.opposite(), OptionType::Put);
        assert_eq!(OptionType::Put.opposite(), OptionType::Call);
    }
}
