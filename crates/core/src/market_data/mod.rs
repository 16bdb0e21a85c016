//! Storage and provider contracts consumed by the ingestion jobs (C6/C7) and
//! the price resolver (C3). Concrete implementations live in the
//! `wealthfolio-storage-sqlite` and `wealthfolio-market-data` crates; `core`
//! only depends on these traits, keeping the cyclic coupling noted in spec
//! §9 broken at the trait boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{BarInterval, InstrumentDirectoryEntry, InstrumentKind, OhlcvBar};
use crate::errors::Result;

/// Market Data Store (C4): OHLCV storage with conflict-do-nothing upsert and
/// a 30-day hourly retention policy.
#[async_trait]
pub trait MarketDataStoreTrait: Send + Sync {
    /// Upsert many bars keyed by `(symbol, venue_code, timestamp, interval)`;
    /// on conflict, do nothing (first write wins).
    async fn upsert_bars(&self, bars: &[OhlcvBar]) -> Result<usize>;

    /// Ordered ascending by timestamp, filtered to `[t_start, t_end]` when
    /// given.
    fn query_bars(
        &self,
        symbol: &str,
        venue_code: &str,
        interval: BarInterval,
        t_start: Option<DateTime<Utc>>,
        t_end: Option<DateTime<Utc>>,
    ) -> Result<Vec<OhlcvBar>>;

    /// Latest bar at or before `t`, across both intervals (the resolver does
    /// not filter by interval — spec §4.3).
    fn latest_bar_at_or_before(
        &self,
        symbol: &str,
        venue_code: &str,
        t: DateTime<Utc>,
    ) -> Result<Option<OhlcvBar>>;

    /// True if any bar at or before `at` exists for the pair — the C7
    /// pre-check.
    fn has_bar_at_or_before(&self, symbol: &str, venue_code: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Delete `interval == 1hour AND timestamp < now - 30 days`.
    async fn purge_retention(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Distinct active market identities currently tracked by any user's
    /// assets (used by the latest/daily ingestion jobs).
    fn distinct_tracked_identities(&self) -> Result<Vec<(String, String)>>;
}

/// Quote Provider Client (C5): the three provider operations this system
/// consumes. The rate-limit gate and HTTP concerns live in the
/// `wealthfolio-market-data` crate's implementation.
#[async_trait]
pub trait QuoteProviderTrait: Send + Sync {
    async fn list_instruments(&self, kind: InstrumentKind) -> Result<Vec<InstrumentDirectoryEntry>>;

    async fn time_series(
        &self,
        symbol: &str,
        venue_code: &str,
        interval: BarInterval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OhlcvBar>>;

    async fn exchange_rate(&self, source_ccy: &str, target_ccy: &str) -> Result<(rust_decimal::Decimal, DateTime<Utc>)>;
}

/// Instrument Directory persistence (weekly snapshot).
#[async_trait]
pub trait InstrumentDirectoryStoreTrait: Send + Sync {
    async fn replace_snapshot(&self, entries: &[InstrumentDirectoryEntry]) -> Result<usize>;
}
