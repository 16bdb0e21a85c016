//! Per-user, per-day portfolio valuation statistic.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::asset::AssetClass;

pub type DistributionByClass = HashMap<AssetClass, Decimal>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub total_portfolio_value_usd: Decimal,
    pub distribution_by_class_usd: DistributionByClass,
}

impl Statistic {
    pub fn date_key(&self) -> NaiveDate {
        self.date.date_naive()
    }

    /// Invariant 1 of spec §3: total equals the sum of the distribution,
    /// within floating tolerance.
    pub fn is_internally_consistent(&self) -> bool {
        let sum: Decimal = self.distribution_by_class_usd.values().sum();
        let diff = (self.total_portfolio_value_usd - sum).abs();
        diff < Decimal::new(1, 6) || {
            let rel_tol = Decimal::new(1, 9) * self.total_portfolio_value_usd.abs();
            diff < rel_tol.max(Decimal::new(1, 9))
        }
    }

    /// Invariant 5 of spec §3: two rows collapse when both fields match.
    pub fn same_value_as(&self, other: &Statistic) -> bool {
        self.total_portfolio_value_usd == other.total_portfolio_value_usd
            && self.distribution_by_class_usd == other.distribution_by_class_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn stat(total: Decimal, dist: DistributionByClass) -> Statistic {
        Statistic {
            user_id: "u1".into(),
            date: Utc::now(),
            total_portfolio_value_usd: total,
            distribution_by_class_usd: dist,
        }
    }

    #[test]
    fn consistent_when_sum_matches() {
        let mut dist = HashMap::new();
        dist.insert(AssetClass::EquityEtf, dec!(500));
        dist.insert(AssetClass::Crypto, dec!(500));
        assert!(stat(dec!(1000), dist).is_internally_consistent());
    }

    #[test]
    fn inconsistent_when_sum_diverges() {
        let mut dist = HashMap::new();
        dist.insert(AssetClass::EquityEtf, dec!(500));
        assert!(!stat(dec!(1000), dist).is_internally_consistent());
    }
}
