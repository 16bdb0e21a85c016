//! Ingestion Jobs (C6) and per-asset backfill (C7).
//!
//! Grounded on `original_source/backend/assets/price_manager.py`
//! (`backfill_stock_prices`, `fetch_latest_prices_for_tracked_stocks`,
//! `fetch_daily_prices_for_tracked_stocks`, `cleanup_old_price_data`) for the
//! job shapes, and on the teacher's provider modules for the Rust surface
//! (async trait methods returning a crate `Result`, per-symbol failures
//! logged and skipped rather than aborting the batch).

pub mod backfill;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::domain::{BarInterval, FxRateRow, InstrumentKind};
use crate::errors::Result;
use crate::fx::FxRateStoreTrait;
use crate::market_data::{InstrumentDirectoryStoreTrait, MarketDataStoreTrait, QuoteProviderTrait};

pub struct IngestionJobs {
    market_data_store: Arc<dyn MarketDataStoreTrait>,
    directory_store: Arc<dyn InstrumentDirectoryStoreTrait>,
    fx_store: Arc<dyn FxRateStoreTrait>,
    provider: Arc<dyn QuoteProviderTrait>,
}

impl IngestionJobs {
    pub fn new(
        market_data_store: Arc<dyn MarketDataStoreTrait>,
        directory_store: Arc<dyn InstrumentDirectoryStoreTrait>,
        fx_store: Arc<dyn FxRateStoreTrait>,
        provider: Arc<dyn QuoteProviderTrait>,
    ) -> Self {
        Self {
            market_data_store,
            directory_store,
            fx_store,
            provider,
        }
    }

    /// Weekly instrument directory refresh: replace the snapshot via UPSERT
    /// on `(symbol, venue_code)` (spec §4.6).
    pub async fn directory_refresh(&self) -> Result<usize> {
        let kinds = [
            InstrumentKind::Stock,
            InstrumentKind::Etf,
            InstrumentKind::Crypto,
        ];
        let mut total = 0;
        let mut entries = Vec::new();
        for kind in kinds {
            match self.provider.list_instruments(kind).await {
                Ok(mut batch) => entries.append(&mut batch),
                Err(err) => {
                    log::warn!("directory_refresh: failed to list {kind:?}: {err}");
                }
            }
        }
        if !entries.is_empty() {
            total = self.directory_store.replace_snapshot(&entries).await?;
        }
        Ok(total)
    }

    /// Daily FX refresh: one `exchange_rate` call per maintained pair,
    /// UPSERTed into the FX store (spec §4.1 supplement).
    pub async fn fx_refresh(&self) -> Result<usize> {
        let mut rows = Vec::new();
        for (src, tgt) in crate::domain::fx_rate::maintained_pairs() {
            match self.provider.exchange_rate(src, tgt).await {
                Ok((rate, observed_at)) => rows.push(FxRateRow {
                    source_ccy: src.to_string(),
                    target_ccy: tgt.to_string(),
                    rate,
                    fetched_at: observed_at,
                }),
                Err(err) => {
                    log::warn!("fx_refresh: failed to fetch {src}->{tgt}: {err}");
                }
            }
        }
        let count = rows.len();
        if count > 0 {
            self.fx_store.upsert_rates(&rows).await?;
        }
        Ok(count)
    }

    /// Hourly latest-bar fetch: `[now-1h, now]` at `1hour` for every
    /// distinct tracked identity (spec §4.6).
    pub async fn latest_hourly(&self, now: DateTime<Utc>) -> Result<usize> {
        self.fetch_window_for_tracked(now - Duration::hours(1), now, BarInterval::OneHour)
            .await
    }

    /// Daily close fetch: `[yesterday, today]` at `1day` (spec §4.6).
    pub async fn daily_close(&self, now: DateTime<Utc>) -> Result<usize> {
        self.fetch_window_for_tracked(now - Duration::days(1), now, BarInterval::OneDay)
            .await
    }

    async fn fetch_window_for_tracked(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: BarInterval,
    ) -> Result<usize> {
        let identities = self.market_data_store.distinct_tracked_identities()?;
        let mut total = 0;
        for (symbol, venue_code) in identities {
            match self
                .provider
                .time_series(&symbol, &venue_code, interval, start, end)
                .await
            {
                Ok(bars) if !bars.is_empty() => {
                    let sane: Vec<_> = bars
                        .into_iter()
                        .filter(|bar| {
                            let ok = bar.is_sane();
                            if !ok {
                                log::warn!("ingestion: dropping insane bar for {symbol}@{venue_code} at {}", bar.timestamp);
                            }
                            ok
                        })
                        .collect();
                    if !sane.is_empty() {
                        total += self.market_data_store.upsert_bars(&sane).await?;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!("ingestion: failed to fetch {symbol}@{venue_code}: {err}");
                }
            }
        }
        Ok(total)
    }

    /// Daily retention purge: delete hourly bars older than 30 days
    /// (spec §4.4, §4.6). Idempotent — safe to re-run after interruption.
    pub async fn retention_purge(&self, now: DateTime<Utc>) -> Result<usize> {
        self.market_data_store.purge_retention(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InstrumentDirectoryEntry, OhlcvBar};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct FakeMarketDataStore {
        identities: Vec<(String, String)>,
        upserted: Mutex<Vec<OhlcvBar>>,
        purged: Mutex<usize>,
    }

    #[async_trait]
    impl MarketDataStoreTrait for FakeMarketDataStore {
        async fn upsert_bars(&self, bars: &[OhlcvBar]) -> Result<usize> {
            self.upserted.lock().unwrap().extend_from_slice(bars);
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
            _s: &str,
            _v: &str,
            _t: DateTime<Utc>,
        ) -> Result<Option<OhlcvBar>> {
            Ok(None)
        }
        fn has_bar_at_or_before(&self, _s: &str, _v: &str, _at: DateTime<Utc>) -> Result<bool> {
            Ok(false)
        }
        async fn purge_retention(&self, _now: DateTime<Utc>) -> Result<usize> {
            *self.purged.lock().unwrap() += 1;
            Ok(7)
        }
        fn distinct_tracked_identities(&self) -> Result<Vec<(String, String)>> {
            Ok(self.identities.clone())
        }
    }

    struct FakeDirectoryStore {
        snapshots: Mutex<Vec<Vec<InstrumentDirectoryEntry>>>,
    }

    #[async_trait]
    impl InstrumentDirectoryStoreTrait for FakeDirectoryStore {
        async fn replace_snapshot(&self, entries: &[InstrumentDirectoryEntry]) -> Result<usize> {
            self.snapshots.lock().unwrap().push(entries.to_vec());
            Ok(entries.len())
        }
    }

    struct FakeFxStore {
        upserted: Mutex<Vec<FxRateRow>>,
    }

    #[async_trait]
    impl FxRateStoreTrait for FakeFxStore {
        async fn upsert_rates(&self, rates: &[FxRateRow]) -> Result<()> {
            self.upserted.lock().unwrap().extend_from_slice(rates);
            Ok(())
        }
        fn load_all(&self) -> Result<Vec<FxRateRow>> {
            Ok(self.upserted.lock().unwrap().clone())
        }
    }

    struct FakeProvider {
        fail_symbol: Option<String>,
    }

    #[async_trait]
    impl QuoteProviderTrait for FakeProvider {
        async fn list_instruments(&self, kind: InstrumentKind) -> Result<Vec<InstrumentDirectoryEntry>> {
            Ok(vec![InstrumentDirectoryEntry {
                symbol: format!("SYM-{}", kind.as_wire_path()),
                venue_code: "XNAS".into(),
                display_venue: "NASDAQ".into(),
                name: "Test".into(),
                country: Some("US".into()),
                quote_currency: "USD".into(),
                updated_at: Utc::now(),
            }])
        }

        async fn time_series(
            &self,
            symbol: &str,
            venue_code: &str,
            interval: BarInterval,
            start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<OhlcvBar>> {
            if self.fail_symbol.as_deref() == Some(symbol) {
                return Err(crate::errors::CoreError::Provider("boom".into()));
            }
            Ok(vec![OhlcvBar {
                symbol: symbol.to_string(),
                venue_code: venue_code.to_string(),
                timestamp: start,
                interval,
                open: dec!(10),
                high: dec!(10),
                low: dec!(10),
                close: dec!(10),
                volume: dec!(1),
                quote_currency: "USD".into(),
            }])
        }

        async fn exchange_rate(&self, _source_ccy: &str, _target_ccy: &str) -> Result<(Decimal, DateTime<Utc>)> {
            Ok((dec!(1.1), Utc::now()))
        }
    }

    fn jobs(identities: Vec<(String, String)>, fail_symbol: Option<String>) -> IngestionJobs {
        IngestionJobs::new(
            Arc::new(FakeMarketDataStore {
                identities,
                upserted: Mutex::new(vec![]),
                purged: Mutex::new(0),
            }),
            Arc::new(FakeDirectoryStore {
                snapshots: Mutex::new(vec![]),
            }),
            Arc::new(FakeFxStore {
                upserted: Mutex::new(vec![]),
            }),
            Arc::new(FakeProvider { fail_symbol }),
        )
    }

    #[tokio::test]
    async fn directory_refresh_replaces_snapshot_across_kinds() {
        let job = jobs(vec![], None);
        let count = job.directory_refresh().await.unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn fx_refresh_covers_all_twelve_pairs() {
        let job = jobs(vec![], None);
        let count = job.fx_refresh().await.unwrap();
        assert_eq!(count, 12);
    }

    #[tokio::test]
    async fn latest_hourly_fetches_every_tracked_identity() {
        let job = jobs(
            vec![("AAPL".into(), "XNAS".into()), ("MSFT".into(), "XNAS".into())],
            None,
        );
        let count = job.latest_hourly(Utc::now()).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn one_symbol_failure_does_not_abort_the_batch() {
        let job = jobs(
            vec![("AAPL".into(), "XNAS".into()), ("MSFT".into(), "XNAS".into())],
            Some("AAPL".into()),
        );
        let count = job.daily_close(Utc::now()).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn retention_purge_delegates_to_store() {
        let job = jobs(vec![], None);
        let purged = job.retention_purge(Utc::now()).await.unwrap();
        assert_eq!(purged, 7);
    }
}
