//! Per-asset Price Backfill (C7): fills history for one position, invoked
//! synchronously after creation or a mutation that changes
//! `(symbol, venue_code, purchase_date)`.
//!
//! Grounded on `original_source/backend/assets/price_manager.py::backfill_stock_prices`
//! (same 30-day hourly/daily split, same pre-check via a pre-existing-bar
//! lookup, same "both fetches independent" commit behavior).

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::domain::{Asset, BarInterval};
use crate::errors::Result;
use crate::market_data::{MarketDataStoreTrait, QuoteProviderTrait};

const BACKFILL_SPLIT: Duration = Duration::days(30);

pub struct PriceBackfill {
    market_data_store: Arc<dyn MarketDataStoreTrait>,
    provider: Arc<dyn QuoteProviderTrait>,
}

impl PriceBackfill {
    pub fn new(
        market_data_store: Arc<dyn MarketDataStoreTrait>,
        provider: Arc<dyn QuoteProviderTrait>,
    ) -> Self {
        Self {
            market_data_store,
            provider,
        }
    }

    /// Backfills one asset's market history. No-op for non-market-traded
    /// assets, manually-priced assets, and assets without a market identity.
    /// Returns the number of bars committed (0 on precheck hit or skip).
    pub async fn backfill_asset(&self, asset: &Asset, now: DateTime<Utc>) -> Result<usize> {
        if !asset.classification.is_market_traded() || !asset.tracked_by_ingestion() {
            return Ok(0);
        }
        let Some(identity) = asset.market_identity.as_ref() else {
            return Ok(0);
        };

        let purchase_dt = asset
            .purchase_date
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
            .unwrap_or(now);

        let already_covered = self
            .market_data_store
            .has_bar_at_or_before(&identity.symbol, &identity.venue_code, purchase_dt)?;
        if already_covered {
            return Ok(0);
        }

        let split_point = now - BACKFILL_SPLIT;
        let mut total = 0;

        if purchase_dt < split_point {
            total += self
                .fetch_and_commit(&identity.symbol, &identity.venue_code, BarInterval::OneHour, split_point, now)
                .await;
            total += self
                .fetch_and_commit(
                    &identity.symbol,
                    &identity.venue_code,
                    BarInterval::OneDay,
                    purchase_dt,
                    split_point,
                )
                .await;
        } else {
            total += self
                .fetch_and_commit(&identity.symbol, &identity.venue_code, BarInterval::OneHour, purchase_dt, now)
                .await;
        }

        Ok(total)
    }

    async fn fetch_and_commit(
        &self,
        symbol: &str,
        venue_code: &str,
        interval: BarInterval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> usize {
        match self.provider.time_series(symbol, venue_code, interval, start, end).await {
            Ok(bars) if !bars.is_empty() => {
                let sane: Vec<_> = bars
                    .into_iter()
                    .filter(|bar| {
                        let ok = bar.is_sane();
                        if !ok {
                            log::warn!("backfill: dropping insane bar for {symbol}@{venue_code} at {}", bar.timestamp);
                        }
                        ok
                    })
                    .collect();
                if sane.is_empty() {
                    return 0;
                }
                self.market_data_store.upsert_bars(&sane).await.unwrap_or_else(|err| {
                    log::warn!("backfill: failed to commit bars for {symbol}@{venue_code}: {err}");
                    0
                })
            }
            Ok(_) => 0,
            Err(err) => {
                log::warn!("backfill: failed to fetch {symbol}@{venue_code} at {interval:?}: {err}");
                0
            }
        }
    }
}
