//! OHLCV bar entity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarInterval {
    OneHour,
    OneDay,
}

impl BarInterval {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            BarInterval::OneHour => "1hour",
            BarInterval::OneDay => "1day",
        }
    }
}

/// Open/high/low/close/volume snapshot of an instrument over a fixed
/// interval, keyed by `(symbol, venue_code, timestamp, interval)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub symbol: String,
    pub venue_code: String,
    pub timestamp: DateTime<Utc>,
    pub interval: BarInterval,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_currency: String,
}

impl OhlcvBar {
    /// Invariant 2 of spec §8: low <= min(open, close) <= max(open, close) <= high.
    pub fn is_sane(&self) -> bool {
        let lo = self.open.min(self.close);
        let hi = self.open.max(self.close);
        self.low <= lo && lo <= hi && hi <= self.high
    }
}
