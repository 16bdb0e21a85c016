//! Portfolio Statistic Builder (C8) — the hardest piece of the pipeline.
//!
//! Grounded on `valuation_service.rs`'s `calculate_valuation_history`
//! (incremental-vs-full recompute split, per-account/per-user serialization
//! expectation) for the overall shape, generalized from the teacher's daily
//! valuation history to this system's three-phase rebuild (spec §4.8). The
//! closed-asset existence check (`Asset::existed_at`) applies uniformly to
//! Phases A and B per the REDESIGN decision recorded in `SPEC_FULL.md` §3.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::bonds::bond_value;
use crate::domain::{Asset, AssetClass, DistributionByClass, Statistic};
use crate::errors::{CoreError, Result};
use crate::fx::FxTable;
use crate::market_data::MarketDataStoreTrait;
use crate::pricing::PriceResolver;

/// Asset persistence contract consumed by the statistic builder.
#[async_trait]
pub trait AssetStoreTrait: Send + Sync {
    async fn assets_for_user(&self, user_id: &str) -> Result<Vec<Asset>>;
    async fn update_current_price(&self, asset_id: &str, price: Decimal) -> Result<()>;
    fn distinct_user_ids(&self) -> Result<Vec<String>>;
}

/// Statistic persistence contract. `upsert` is keyed by `(user_id, date)`
/// with last-write-wins semantics (spec §4.8 per-day uniqueness tie-break).
#[async_trait]
pub trait StatisticStoreTrait: Send + Sync {
    /// Rows with `date >= from_date`, ordered ascending by date.
    async fn load_from(&self, user_id: &str, from_date: NaiveDate) -> Result<Vec<Statistic>>;
    async fn latest(&self, user_id: &str) -> Result<Option<Statistic>>;
    async fn upsert(&self, stat: Statistic) -> Result<()>;
}

pub struct StatisticBuilder {
    asset_store: Arc<dyn AssetStoreTrait>,
    statistic_store: Arc<dyn StatisticStoreTrait>,
    market_data_store: Arc<dyn MarketDataStoreTrait>,
    price_resolver: PriceResolver,
    fx_table: Arc<FxTable>,
}

impl StatisticBuilder {
    pub fn new(
        asset_store: Arc<dyn AssetStoreTrait>,
        statistic_store: Arc<dyn StatisticStoreTrait>,
        market_data_store: Arc<dyn MarketDataStoreTrait>,
        fx_table: Arc<FxTable>,
    ) -> Self {
        let price_resolver = PriceResolver::new(market_data_store.clone());
        Self {
            asset_store,
            statistic_store,
            market_data_store,
            price_resolver,
            fx_table,
        }
    }

    pub async fn rebuild_for_user(&self, user_id: &str, backwards: bool) -> Result<()> {
        let mut assets = self.asset_store.assets_for_user(user_id).await?;
        if assets.is_empty() {
            return Ok(());
        }

        let triggering = assets
            .iter()
            .filter(|a| a.is_active())
            .max_by_key(|a| a.updated_at)
            .cloned();
        let Some(triggering) = triggering else {
            return Ok(());
        };

        if backwards {
            let d0 = midnight_utc(triggering.purchase_date);
            let existing = self.statistic_store.load_from(user_id, d0.date_naive()).await?;
            let existing_first_date = existing.first().map(|s| s.date_key());
            self.phase_a(user_id, &assets, &triggering, d0, existing_first_date)
                .await?;
            self.phase_b(user_id, &assets, &existing).await?;
        }

        self.phase_c(user_id, &mut assets, Utc::now()).await?;
        Ok(())
    }

    /// Exposes the user set driving `rebuild_all`, for runtimes that need
    /// to serialize each user's rebuild through an external lock.
    pub fn user_ids(&self) -> Result<Vec<String>> {
        self.asset_store.distinct_user_ids()
    }

    /// The read path upstream callers use to render a series (spec §6
    /// "outputs"). `target_currency` applies C1 on read; `None` returns the
    /// rows as stored (USD).
    pub async fn get_user_statistics(
        &self,
        user_id: &str,
        target_currency: Option<&str>,
    ) -> Result<Vec<Statistic>> {
        let mut rows = self.statistic_store.load_from(user_id, NaiveDate::MIN).await?;
        if let Some(ccy) = target_currency {
            if ccy != "USD" {
                for row in rows.iter_mut() {
                    row.total_portfolio_value_usd = self.fx_table.convert("USD", ccy, row.total_portfolio_value_usd)?;
                    for value in row.distribution_by_class_usd.values_mut() {
                        *value = self.fx_table.convert("USD", ccy, *value)?;
                    }
                }
            }
        }
        Ok(rows)
    }

    pub async fn rebuild_all(&self) -> Result<()> {
        let user_ids = self.asset_store.distinct_user_ids()?;
        let results =
            futures::future::join_all(user_ids.iter().map(|uid| self.rebuild_for_user(uid, false)))
                .await;
        for (user_id, result) in user_ids.iter().zip(results) {
            if let Err(err) = result {
                log::error!("rebuild_all: failed for user {user_id}: {err}");
            }
        }
        Ok(())
    }

    async fn phase_a(
        &self,
        user_id: &str,
        assets: &[Asset],
        triggering: &Asset,
        d0: DateTime<Utc>,
        existing_first_date: Option<NaiveDate>,
    ) -> Result<()> {
        if existing_first_date.is_some_and(|fd| fd <= d0.date_naive()) {
            return Ok(());
        }

        let mut total = Decimal::ZERO;
        let mut distribution = DistributionByClass::new();
        for asset in assets {
            if asset.purchase_date > d0.date_naive() || !asset.existed_at(d0) {
                continue;
            }
            let unit_price = if asset.id == triggering.id {
                asset.purchase_price
            } else {
                match self.price_with_fallback(asset, d0) {
                    Ok(price) => price,
                    Err(err) if Self::excludes_asset_only(&err) => {
                        log::warn!("phase_a: excluding asset {} from {d0}: {err}", asset.id);
                        continue;
                    }
                    Err(other) => return Err(other),
                }
            };
            if let Err(err) = self.contribute(&mut total, &mut distribution, asset, unit_price) {
                if Self::excludes_asset_only(&err) {
                    log::warn!("phase_a: excluding asset {} from {d0}: {err}", asset.id);
                    continue;
                }
                return Err(err);
            }
        }

        self.finalize_and_upsert(Statistic {
            user_id: user_id.to_string(),
            date: d0,
            total_portfolio_value_usd: total,
            distribution_by_class_usd: distribution,
        })
        .await
    }

    async fn phase_b(&self, user_id: &str, assets: &[Asset], existing: &[Statistic]) -> Result<()> {
        for row in existing {
            let mut total = Decimal::ZERO;
            let mut distribution = DistributionByClass::new();
            for asset in assets {
                if !asset.existed_at(row.date) {
                    continue;
                }
                let unit_price = match self.price_with_fallback(asset, row.date) {
                    Ok(price) => price,
                    Err(err) if Self::excludes_asset_only(&err) => {
                        log::warn!("phase_b: excluding asset {} from {}: {err}", asset.id, row.date);
                        continue;
                    }
                    Err(other) => return Err(other),
                };
                if let Err(err) = self.contribute(&mut total, &mut distribution, asset, unit_price) {
                    if Self::excludes_asset_only(&err) {
                        log::warn!("phase_b: excluding asset {} from {}: {err}", asset.id, row.date);
                        continue;
                    }
                    return Err(err);
                }
            }
            self.finalize_and_upsert(Statistic {
                user_id: user_id.to_string(),
                date: row.date,
                total_portfolio_value_usd: total,
                distribution_by_class_usd: distribution,
            })
            .await?;
        }
        Ok(())
    }

    async fn phase_c(&self, user_id: &str, assets: &mut [Asset], now: DateTime<Utc>) -> Result<()> {
        self.refresh_current_prices(assets, now).await?;

        let mut total = Decimal::ZERO;
        let mut distribution = DistributionByClass::new();
        for asset in assets.iter() {
            if !asset.is_active() {
                continue;
            }
            let unit_price = asset.current_price.unwrap_or(asset.purchase_price);
            if let Err(err) = self.contribute(&mut total, &mut distribution, asset, unit_price) {
                if Self::excludes_asset_only(&err) {
                    log::warn!("phase_c: excluding asset {} from {now}: {err}", asset.id);
                    continue;
                }
                return Err(err);
            }
        }

        let candidate = Statistic {
            user_id: user_id.to_string(),
            date: now,
            total_portfolio_value_usd: total,
            distribution_by_class_usd: distribution,
        };

        if let Some(latest) = self.statistic_store.latest(user_id).await? {
            if latest.same_value_as(&candidate) {
                return Ok(());
            }
        }

        self.finalize_and_upsert(candidate).await
    }

    /// Logs (never fails the rebuild on) a violation of spec §3 invariant 1
    /// before persisting — the phases above should never produce one.
    async fn finalize_and_upsert(&self, stat: Statistic) -> Result<()> {
        if !stat.is_internally_consistent() {
            log::error!(
                "statistic for user {} at {} fails internal-consistency invariant: total={} distribution={:?}",
                stat.user_id,
                stat.date,
                stat.total_portfolio_value_usd,
                stat.distribution_by_class_usd
            );
        }
        self.statistic_store.upsert(stat).await
    }

    /// Refreshes the `current_price` cache prior to Phase C: market assets
    /// from the latest bar, bonds via C2 at `now`. Other classes are
    /// unchanged (spec §4.8).
    async fn refresh_current_prices(&self, assets: &mut [Asset], now: DateTime<Utc>) -> Result<()> {
        for asset in assets.iter_mut() {
            if !asset.is_active() {
                continue;
            }
            match asset.classification {
                AssetClass::EquityEtf | AssetClass::Crypto => {
                    if !asset.tracked_by_ingestion() {
                        continue;
                    }
                    if let Some(identity) = asset.market_identity.clone() {
                        if let Some(bar) = self.market_data_store.latest_bar_at_or_before(
                            &identity.symbol,
                            &identity.venue_code,
                            now,
                        )? {
                            asset.current_price = Some(bar.close);
                            self.asset_store.update_current_price(&asset.id, bar.close).await?;
                        }
                    }
                }
                AssetClass::Bond => {
                    if let Some(settings) = asset.bond_settings.clone() {
                        match bond_value(asset.purchase_price, &settings, asset.purchase_date, now.date_naive()) {
                            Ok(value) => {
                                asset.current_price = Some(value);
                                self.asset_store.update_current_price(&asset.id, value).await?;
                            }
                            Err(err @ CoreError::BadBondRange { .. }) => {
                                log::warn!("refresh_current_prices: excluding asset {}: {err}", asset.id);
                            }
                            Err(other) => return Err(other),
                        }
                    }
                }
                AssetClass::Savings | AssetClass::RealEstate | AssetClass::Other => {}
            }
        }
        Ok(())
    }

    /// C3 with fallback to `purchase_price` on `ErrNoPrice` (spec §4.8 inner
    /// loop, step 1).
    fn price_with_fallback(&self, asset: &Asset, t: DateTime<Utc>) -> Result<Decimal> {
        match self.price_resolver.price_at(asset, t) {
            Ok(price) => Ok(price),
            Err(CoreError::NoPrice { .. }) => Ok(asset.purchase_price),
            Err(other) => Err(other),
        }
    }

    /// `ErrUnknownRate`/`ErrBadBondRange` are per-asset failures (spec §7:
    /// "surfaced to C8, excludes only that asset"), never whole-rebuild
    /// aborts the way `ErrNoPrice` already isn't via `price_with_fallback`.
    fn excludes_asset_only(err: &CoreError) -> bool {
        matches!(err, CoreError::UnknownRate { .. } | CoreError::BadBondRange { .. })
    }

    /// Inner loop steps 2–4: contribution in asset currency, FX conversion
    /// to USD, accumulation into the total and per-class distribution.
    fn contribute(
        &self,
        total: &mut Decimal,
        distribution: &mut DistributionByClass,
        asset: &Asset,
        unit_price: Decimal,
    ) -> Result<()> {
        let contribution_ccy = unit_price * asset.quantity;
        let contribution_usd = match asset.currency.as_deref() {
            Some(ccy) if ccy != "USD" => self.fx_table.convert(ccy, "USD", contribution_ccy)?,
            _ => contribution_ccy,
        };
        *total += contribution_usd;
        *distribution.entry(asset.classification).or_insert(Decimal::ZERO) += contribution_usd;
        Ok(())
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .expect("midnight always exists")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetStatus, BarInterval, FxRateRow, MarketIdentity, OhlcvBar, QuoteMode};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeAssetStore {
        assets: Mutex<HashMap<String, Asset>>,
    }

    #[async_trait]
    impl AssetStoreTrait for FakeAssetStore {
        async fn assets_for_user(&self, user_id: &str) -> Result<Vec<Asset>> {
            Ok(self
                .assets
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect())
        }
        async fn update_current_price(&self, asset_id: &str, price: Decimal) -> Result<()> {
            if let Some(asset) = self.assets.lock().unwrap().get_mut(asset_id) {
                asset.current_price = Some(price);
            }
            Ok(())
        }
        fn distinct_user_ids(&self) -> Result<Vec<String>> {
            let mut ids: Vec<String> = self
                .assets
                .lock()
                .unwrap()
                .values()
                .map(|a| a.user_id.clone())
                .collect();
            ids.sort();
            ids.dedup();
            Ok(ids)
        }
    }

    struct FakeStatisticStore {
        rows: Mutex<Vec<Statistic>>,
    }

    #[async_trait]
    impl StatisticStoreTrait for FakeStatisticStore {
        async fn load_from(&self, user_id: &str, from_date: NaiveDate) -> Result<Vec<Statistic>> {
            let mut rows: Vec<Statistic> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.user_id == user_id && s.date_key() >= from_date)
                .cloned()
                .collect();
            rows.sort_by_key(|s| s.date);
            Ok(rows)
        }
        async fn latest(&self, user_id: &str) -> Result<Option<Statistic>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.user_id == user_id)
                .max_by_key(|s| s.date)
                .cloned())
        }
        async fn upsert(&self, stat: Statistic) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows
                .iter_mut()
                .find(|s| s.user_id == stat.user_id && s.date_key() == stat.date_key())
            {
                *existing = stat;
            } else {
                rows.push(stat);
            }
            Ok(())
        }
    }

    struct FakeMarketDataStore {
        bars: Mutex<Vec<OhlcvBar>>,
    }

    #[async_trait]
    impl MarketDataStoreTrait for FakeMarketDataStore {
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

    fn stock_asset(id: &str, user_id: &str, currency: &str, price: Decimal, quantity: Decimal) -> Asset {
        Asset {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: id.to_string(),
            classification: AssetClass::EquityEtf,
            status: AssetStatus::Active,
            market_identity: Some(MarketIdentity {
                symbol: id.to_string(),
                venue_code: "XNAS".into(),
            }),
            purchase_price: price,
            purchase_date: Utc::now().date_naive() - Duration::days(10),
            quantity,
            currency: Some(currency.to_string()),
            current_price: Some(price),
            bond_settings: None,
            quote_mode: QuoteMode::Auto,
            closed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn builder(
        assets: Vec<Asset>,
        bars: Vec<OhlcvBar>,
        fx_rows: Vec<FxRateRow>,
    ) -> StatisticBuilder {
        let asset_map = assets.into_iter().map(|a| (a.id.clone(), a)).collect();
        StatisticBuilder::new(
            Arc::new(FakeAssetStore {
                assets: Mutex::new(asset_map),
            }),
            Arc::new(FakeStatisticStore {
                rows: Mutex::new(vec![]),
            }),
            Arc::new(FakeMarketDataStore {
                bars: Mutex::new(bars),
            }),
            Arc::new(FxTable::load(fx_rows)),
        )
    }

    #[tokio::test]
    async fn no_assets_returns_silently() {
        let builder = builder(vec![], vec![], vec![]);
        builder.rebuild_for_user("nobody", true).await.unwrap();
    }

    #[tokio::test]
    async fn single_currency_stock_contributes_directly_to_usd_total() {
        let asset = stock_asset("a1", "u1", "USD", dec!(150), dec!(10));
        let builder = builder(vec![asset], vec![], vec![]);
        builder.rebuild_for_user("u1", false).await.unwrap();
        let latest = builder.statistic_store.latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.total_portfolio_value_usd, dec!(1500));
    }

    #[tokio::test]
    async fn fx_conversion_applies_for_non_usd_assets() {
        let asset = stock_asset("a1", "u1", "EUR", dec!(100), dec!(2));
        let fx_rows = vec![FxRateRow {
            source_ccy: "EUR".into(),
            target_ccy: "USD".into(),
            rate: dec!(1.1),
            fetched_at: Utc::now(),
        }];
        let builder = builder(vec![asset], vec![], fx_rows);
        builder.rebuild_for_user("u1", false).await.unwrap();
        let latest = builder.statistic_store.latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.total_portfolio_value_usd, dec!(220.0));
    }

    #[tokio::test]
    async fn missing_price_falls_back_to_purchase_price() {
        // No bars in the store at all -> C3 returns ErrNoPrice -> fallback.
        let mut asset = stock_asset("a1", "u1", "USD", dec!(42), dec!(1));
        asset.current_price = None;
        let builder = builder(vec![asset], vec![], vec![]);
        builder.rebuild_for_user("u1", false).await.unwrap();
        let latest = builder.statistic_store.latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.total_portfolio_value_usd, dec!(42));
    }

    #[tokio::test]
    async fn phase_c_is_a_no_op_when_total_is_unchanged() {
        let asset = stock_asset("a1", "u1", "USD", dec!(100), dec!(1));
        let builder = builder(vec![asset], vec![], vec![]);
        builder.rebuild_for_user("u1", false).await.unwrap();
        let first_count = builder.statistic_store.rows.lock().unwrap().len();
        builder.rebuild_for_user("u1", false).await.unwrap();
        let second_count = builder.statistic_store.rows.lock().unwrap().len();
        assert_eq!(first_count, second_count);
    }

    #[tokio::test]
    async fn backwards_rebuild_inserts_phase_a_row_at_purchase_date() {
        let mut asset = stock_asset("a1", "u1", "USD", dec!(100), dec!(1));
        asset.purchase_date = Utc::now().date_naive() - Duration::days(30);
        let builder = builder(vec![asset], vec![], vec![]);
        builder.rebuild_for_user("u1", true).await.unwrap();
        let rows = builder.statistic_store.rows.lock().unwrap();
        assert!(rows.len() >= 2);
    }

    #[tokio::test]
    async fn closed_asset_is_excluded_from_phase_c() {
        let active = stock_asset("a1", "u1", "USD", dec!(100), dec!(1));
        let mut closed = stock_asset("a2", "u1", "USD", dec!(500), dec!(1));
        closed.status = AssetStatus::Closed;
        closed.closed_at = Some(Utc::now() - Duration::days(1));
        let builder = builder(vec![active, closed], vec![], vec![]);
        builder.rebuild_for_user("u1", false).await.unwrap();
        let latest = builder.statistic_store.latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.total_portfolio_value_usd, dec!(100));
    }

    #[tokio::test]
    async fn bond_value_is_used_for_current_price_refresh() {
        let maturity = Utc::now().date_naive() + Duration::days(3650);
        let purchase_date = Utc::now().date_naive() - Duration::days(365);
        let mut rates = HashMap::new();
        rates.insert(
            "1".to_string(),
            crate::domain::asset::BondRateEntry { rate_percent: dec!(5.0) },
        );
        let mut asset = stock_asset("b1", "u1", "USD", dec!(1000), dec!(1));
        asset.classification = AssetClass::Bond;
        asset.market_identity = None;
        asset.purchase_date = purchase_date;
        asset.bond_settings = Some(crate::domain::BondSettings {
            capitalization_of_interest: false,
            capitalization_frequency_months: None,
            rate_reset_frequency_months: 12,
            interest_rates: rates,
            maturity_date: maturity,
        });
        let builder = builder(vec![asset], vec![], vec![]);
        builder.rebuild_for_user("u1", false).await.unwrap();
        let latest = builder.statistic_store.latest("u1").await.unwrap().unwrap();
        assert!(latest.total_portfolio_value_usd > dec!(1000));
    }

    #[tokio::test]
    async fn latest_bar_close_feeds_phase_c_valuation() {
        let asset = stock_asset("a1", "u1", "USD", dec!(100), dec!(3));
        let bars = vec![OhlcvBar {
            symbol: "a1".into(),
            venue_code: "XNAS".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            interval: BarInterval::OneDay,
            open: dec!(200),
            high: dec!(200),
            low: dec!(200),
            close: dec!(200),
            volume: dec!(0),
            quote_currency: "USD".into(),
        }];
        let builder = builder(vec![asset], bars, vec![]);
        builder.rebuild_for_user("u1", false).await.unwrap();
        let latest = builder.statistic_store.latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.total_portfolio_value_usd, dec!(600));
    }
}
