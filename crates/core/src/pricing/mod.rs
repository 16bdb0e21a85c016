//! Point-in-time Price Resolver (C3): dispatches by asset classification to
//! produce the price of any asset at any target instant.
//!
//! Pure with respect to the store — no cache writes happen here (spec §4.3).
//! `current_price` refresh is an explicit pre-phase owned by the statistic
//! builder (C8), never an implicit side effect of resolving a price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::bonds::bond_value;
use crate::domain::{Asset, AssetClass};
use crate::errors::{CoreError, Result};
use crate::market_data::MarketDataStoreTrait;

pub struct PriceResolver {
    market_data_store: Arc<dyn MarketDataStoreTrait>,
}

impl PriceResolver {
    pub fn new(market_data_store: Arc<dyn MarketDataStoreTrait>) -> Self {
        Self { market_data_store }
    }

    /// `price_at(asset, t) -> price_in_asset_currency` (spec §4.3).
    pub fn price_at(&self, asset: &Asset, t: DateTime<Utc>) -> Result<Decimal> {
        match asset.classification {
            AssetClass::EquityEtf | AssetClass::Crypto => self.price_market(asset, t),
            AssetClass::Bond => self.price_bond(asset, t),
            AssetClass::Savings | AssetClass::RealEstate | AssetClass::Other => {
                Ok(asset.purchase_price)
            }
        }
    }

    fn price_market(&self, asset: &Asset, t: DateTime<Utc>) -> Result<Decimal> {
        let identity = asset.market_identity.as_ref().ok_or_else(|| CoreError::NoPrice {
            symbol: asset.id.clone(),
            venue_code: String::new(),
        })?;
        let bar = self
            .market_data_store
            .latest_bar_at_or_before(&identity.symbol, &identity.venue_code, t)?;
        bar.map(|b| b.close).ok_or_else(|| CoreError::NoPrice {
            symbol: identity.symbol.clone(),
            venue_code: identity.venue_code.clone(),
        })
    }

    fn price_bond(&self, asset: &Asset, t: DateTime<Utc>) -> Result<Decimal> {
        let settings = asset
            .bond_settings
            .as_ref()
            .ok_or_else(|| CoreError::AssetNotFound(asset.id.clone()))?;
        bond_value(asset.purchase_price, settings, asset.purchase_date, t.date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetStatus, BarInterval, MarketIdentity, OhlcvBar, QuoteMode};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct FakeStore {
        bars: Mutex<Vec<OhlcvBar>>,
    }

    #[async_trait::async_trait]
    impl MarketDataStoreTrait for FakeStore {
        async fn upsert_bars(&self, bars: &[OhlcvBar]) -> Result<usize> {
            self.bars.lock().unwrap().extend_from_slice(bars);
            Ok(bars.len())
        }
        fn query_bars(
            &self,
            _s: &str,
            _v: &str,
            _i: BarInterval,
            _a: Option<DateTime<Utc>>,
            _b: Option<DateTime<Utc>>,
        ) -> Result<Vec<OhlcvBar>> {
            Ok(vec![])
        }
        fn latest_bar_at_or_before(
            &self,
            symbol: &str,
            venue_code: &str,
            t: DateTime<Utc>,
        ) -> Result<Option<OhlcvBar>> {
            let bars = self.bars.lock().unwrap();
            Ok(bars
                .iter()
                .filter(|b| b.symbol == symbol && b.venue_code == venue_code && b.timestamp <= t)
                .max_by_key(|b| b.timestamp)
                .cloned())
        }
        fn has_bar_at_or_before(&self, _s: &str, _v: &str, _at: DateTime<Utc>) -> Result<bool> {
            Ok(false)
        }
        async fn purge_retention(&self, _now: DateTime<Utc>) -> Result<usize> {
            Ok(0)
        }
        fn distinct_tracked_identities(&self) -> Result<Vec<(String, String)>> {
            Ok(vec![])
        }
    }

    fn base_asset() -> Asset {
        Asset {
            id: "a1".into(),
            user_id: "u1".into(),
            name: "AAPL".into(),
            classification: AssetClass::EquityEtf,
            status: AssetStatus::Active,
            market_identity: Some(MarketIdentity {
                symbol: "AAPL".into(),
                venue_code: "XNAS".into(),
            }),
            purchase_price: dec!(100),
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            quantity: dec!(10),
            currency: Some("USD".into()),
            current_price: None,
            bond_settings: None,
            quote_mode: QuoteMode::Auto,
            closed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn market_asset_uses_latest_bar_at_or_before() {
        let store = Arc::new(FakeStore {
            bars: Mutex::new(vec![OhlcvBar {
                symbol: "AAPL".into(),
                venue_code: "XNAS".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
                interval: BarInterval::OneDay,
                open: dec!(150),
                high: dec!(150),
                low: dec!(150),
                close: dec!(150),
                volume: dec!(0),
                quote_currency: "USD".into(),
            }]),
        });
        let resolver = PriceResolver::new(store);
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(resolver.price_at(&base_asset(), t).unwrap(), dec!(150));
    }

    #[test]
    fn market_asset_with_no_bars_errors_with_no_price() {
        let store = Arc::new(FakeStore {
            bars: Mutex::new(vec![]),
        });
        let resolver = PriceResolver::new(store);
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            resolver.price_at(&base_asset(), t),
            Err(CoreError::NoPrice { .. })
        ));
    }

    #[test]
    fn book_value_classes_return_purchase_price() {
        let store = Arc::new(FakeStore {
            bars: Mutex::new(vec![]),
        });
        let resolver = PriceResolver::new(store);
        let mut asset = base_asset();
        asset.classification = AssetClass::Savings;
        asset.market_identity = None;
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(resolver.price_at(&asset, t).unwrap(), dec!(100));
    }
}
