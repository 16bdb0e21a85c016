//! FX Table (C1): in-process lookup of `source -> target` conversion rates.
//!
//! No transitive inversion is performed — EUR->PLN is never derived from
//! EUR->USD and USD->PLN. This is deliberate: chained conversions compound
//! provider error (spec §4.1, §9).

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::FxRateRow;
use crate::errors::{CoreError, Result};

/// Persistence contract for FX rows, implemented by the storage crate.
#[async_trait]
pub trait FxRateStoreTrait: Send + Sync {
    async fn upsert_rates(&self, rates: &[FxRateRow]) -> Result<()>;
    fn load_all(&self) -> Result<Vec<FxRateRow>>;
}

/// In-process lookup table, refreshed from the store and cached for
/// synchronous `convert` calls from the statistic builder's hot path.
pub struct FxTable {
    rates: RwLock<HashMap<(String, String), Decimal>>,
}

impl FxTable {
    pub fn new() -> Self {
        Self {
            rates: RwLock::new(HashMap::new()),
        }
    }

    pub fn load(rows: Vec<FxRateRow>) -> Self {
        let table = Self::new();
        table.replace(rows);
        table
    }

    /// Overwrites in-memory rows by `(src, tgt)`. A refresh that only
    /// produced a subset of pairs leaves the rest of the pre-existing table
    /// intact — callers should pass the full set they intend to keep.
    pub fn replace(&self, rows: Vec<FxRateRow>) {
        let mut map = self.rates.write().unwrap();
        for row in rows {
            map.insert((row.source_ccy, row.target_ccy), row.rate);
        }
    }

    pub fn upsert_one(&self, src: &str, tgt: &str, rate: Decimal) {
        self.rates
            .write()
            .unwrap()
            .insert((src.to_string(), tgt.to_string()), rate);
    }

    /// `convert(src, tgt, amount) -> amount'` (spec §4.1).
    pub fn convert(&self, src: &str, tgt: &str, amount: Decimal) -> Result<Decimal> {
        if src == tgt {
            return Ok(amount);
        }
        let map = self.rates.read().unwrap();
        map.get(&(src.to_string(), tgt.to_string()))
            .map(|rate| amount * rate)
            .ok_or_else(|| CoreError::UnknownRate {
                source_ccy: src.to_string(),
                target_ccy: tgt.to_string(),
            })
    }
}

impl Default for FxTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn same_currency_is_identity() {
        let table = FxTable::new();
        assert_eq!(table.convert("USD", "USD", dec!(42)).unwrap(), dec!(42));
    }

    #[test]
    fn missing_pair_errors() {
        let table = FxTable::new();
        assert!(matches!(
            table.convert("EUR", "PLN", dec!(1)),
            Err(CoreError::UnknownRate { .. })
        ));
    }

    #[test]
    fn no_transitive_inversion() {
        let table = FxTable::new();
        table.upsert_one("EUR", "USD", dec!(1.1));
        table.upsert_one("USD", "PLN", dec!(4.0));
        // EUR->PLN was never stored directly, so it must still fail.
        assert!(table.convert("EUR", "PLN", dec!(1)).is_err());
    }

    #[test]
    fn direct_pair_converts() {
        let table = FxTable::new();
        table.upsert_one("PLN", "USD", dec!(0.25));
        assert_eq!(table.convert("PLN", "USD", dec!(400)).unwrap(), dec!(100));
    }

    #[test]
    fn partial_refresh_preserves_existing_rows() {
        let table = FxTable::new();
        table.upsert_one("GBP", "USD", dec!(1.25));
        table.replace(vec![FxRateRow {
            source_ccy: "EUR".into(),
            target_ccy: "USD".into(),
            rate: dec!(1.1),
            fetched_at: chrono::Utc::now(),
        }]);
        assert!(table.convert("GBP", "USD", dec!(1)).is_ok());
    }
}
