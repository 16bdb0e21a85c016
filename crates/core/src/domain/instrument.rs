//! Instrument directory entry — a weekly snapshot of listed instruments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Stock,
    Etf,
    Crypto,
}

impl InstrumentKind {
    pub fn as_wire_path(&self) -> &'static str {
        match self {
            InstrumentKind::Stock => "stocks",
            InstrumentKind::Etf => "etfs",
            InstrumentKind::Crypto => "cryptocurrencies",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentDirectoryEntry {
    pub symbol: String,
    pub venue_code: String,
    pub display_venue: String,
    pub name: String,
    pub country: Option<String>,
    pub quote_currency: String,
    pub updated_at: DateTime<Utc>,
}
