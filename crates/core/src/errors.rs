//! Core error kinds, one per policy row in spec §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown FX rate {source_ccy}->{target_ccy}")]
    UnknownRate {
        source_ccy: String,
        target_ccy: String,
    },

    #[error("no price for {symbol}@{venue_code} at or before the requested instant")]
    NoPrice { symbol: String, venue_code: String },

    #[error("bad bond range: target {target} precedes purchase date {purchase}")]
    BadBondRange {
        purchase: chrono::NaiveDate,
        target: chrono::NaiveDate,
    },

    #[error("quote provider error: {0}")]
    Provider(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("asset not found: {0}")]
    AssetNotFound(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
