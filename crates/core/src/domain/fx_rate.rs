//! FX rate row — a direct, non-transitive `(source, target)` conversion rate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRateRow {
    pub source_ccy: String,
    pub target_ccy: String,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

/// The only pairs the FX refresh job is required to maintain (spec §3): the
/// four currencies, every ordered pair excluding the identity pair.
pub const MAINTAINED_CURRENCIES: [&str; 4] = ["USD", "EUR", "GBP", "PLN"];

pub fn maintained_pairs() -> Vec<(&'static str, &'static str)> {
    let mut pairs = Vec::with_capacity(12);
    for src in MAINTAINED_CURRENCIES {
        for tgt in MAINTAINED_CURRENCIES {
            if src != tgt {
                pairs.push((src, tgt));
            }
        }
    }
    pairs
}
