//! Market Data Store (C4): OHLCV bar persistence with conflict-do-nothing
//! upsert and 30-day hourly retention.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;

use wealthfolio_core::domain::{BarInterval, OhlcvBar};
use wealthfolio_core::errors::Result as CoreResult;
use wealthfolio_core::market_data::MarketDataStoreTrait;

use crate::db::{get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::models::{to_naive, NewOhlcvBarRow, OhlcvBarRow};
use crate::schema::ohlcv_bars;
use crate::schema::ohlcv_bars::dsl;

pub struct BarRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl BarRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl MarketDataStoreTrait for BarRepository {
    async fn upsert_bars(&self, bars: &[OhlcvBar]) -> CoreResult<usize> {
        let rows: Vec<NewOhlcvBarRow> = bars.iter().map(NewOhlcvBarRow::from_domain).collect();
        self.writer
            .exec(move |conn| -> crate::errors::Result<usize> {
                let mut inserted = 0;
                for row in rows {
                    inserted += diesel::insert_into(ohlcv_bars::table)
                        .values(&row)
                        .on_conflict((dsl::symbol, dsl::venue_code, dsl::timestamp, dsl::interval))
                        .do_nothing()
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(inserted)
            })
            .await
            .map_err(Into::into)
    }

    fn query_bars(
        &self,
        symbol: &str,
        venue_code: &str,
        interval: BarInterval,
        t_start: Option<DateTime<Utc>>,
        t_end: Option<DateTime<Utc>>,
    ) -> CoreResult<Vec<OhlcvBar>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let mut query = dsl::ohlcv_bars
            .filter(dsl::symbol.eq(symbol))
            .filter(dsl::venue_code.eq(venue_code))
            .filter(dsl::interval.eq(interval.as_wire_str()))
            .into_boxed();
        if let Some(start) = t_start {
            query = query.filter(dsl::timestamp.ge(to_naive(start)));
        }
        if let Some(end) = t_end {
            query = query.filter(dsl::timestamp.le(to_naive(end)));
        }
        let rows: Vec<OhlcvBarRow> = query
            .order(dsl::timestamp.asc())
            .select(OhlcvBarRow::as_select())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| row.into_domain().map_err(Into::into))
            .collect()
    }

    fn latest_bar_at_or_before(
        &self,
        symbol: &str,
        venue_code: &str,
        t: DateTime<Utc>,
    ) -> CoreResult<Option<OhlcvBar>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let row: Option<OhlcvBarRow> = dsl::ohlcv_bars
            .filter(dsl::symbol.eq(symbol))
            .filter(dsl::venue_code.eq(venue_code))
            .filter(dsl::timestamp.le(to_naive(t)))
            .order(dsl::timestamp.desc())
            .select(OhlcvBarRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(|r| r.into_domain().map_err(Into::into)).transpose()
    }

    fn has_bar_at_or_before(&self, symbol: &str, venue_code: &str, at: DateTime<Utc>) -> CoreResult<bool> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let count: i64 = dsl::ohlcv_bars
            .filter(dsl::symbol.eq(symbol))
            .filter(dsl::venue_code.eq(venue_code))
            .filter(dsl::timestamp.le(to_naive(at)))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    async fn purge_retention(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let cutoff = to_naive(now - chrono::Duration::days(30));
        self.writer
            .exec(move |conn| -> crate::errors::Result<usize> {
                diesel::delete(
                    dsl::ohlcv_bars
                        .filter(dsl::interval.eq(BarInterval::OneHour.as_wire_str()))
                        .filter(dsl::timestamp.lt(cutoff)),
                )
                .execute(conn)
                .map_err(|err| StorageError::from(err))
            })
            .await
            .map_err(Into::into)
    }

    fn distinct_tracked_identities(&self) -> CoreResult<Vec<(String, String)>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        use crate::schema::assets::dsl as assets_dsl;
        let rows: Vec<(String, String)> = assets_dsl::assets
            .filter(assets_dsl::symbol.is_not_null())
            .filter(assets_dsl::venue_code.is_not_null())
            .filter(assets_dsl::status.eq("active"))
            .filter(assets_dsl::quote_mode.eq("auto"))
            .select((assets_dsl::symbol.assume_not_null(), assets_dsl::venue_code.assume_not_null()))
            .distinct()
            .load(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows)
    }
}
