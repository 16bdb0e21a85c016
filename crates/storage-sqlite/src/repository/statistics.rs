//! Portfolio Statistic persistence (C8): one row per user per calendar day,
//! enforced by `idx_statistics_user_day` (an expression index on
//! `date(date)`) rather than a literal composite key, since Phase A and
//! Phase C can each resolve to "today" at different exact timestamps.

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use std::sync::Arc;

use wealthfolio_core::domain::Statistic;
use wealthfolio_core::errors::Result as CoreResult;
use wealthfolio_core::portfolio::StatisticStoreTrait;

use crate::db::{get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::models::{to_naive, NewStatisticRow, StatisticRow};
use crate::schema::statistics;
use crate::schema::statistics::dsl;

pub struct StatisticRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl StatisticRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl StatisticStoreTrait for StatisticRepository {
    async fn load_from(&self, user_id: &str, from_date: NaiveDate) -> CoreResult<Vec<Statistic>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let user_id = user_id.to_string();
        let from = to_naive(from_date.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc());
        let rows: Vec<StatisticRow> = dsl::statistics
            .filter(dsl::user_id.eq(user_id))
            .filter(dsl::date.ge(from))
            .order(dsl::date.asc())
            .select(StatisticRow::as_select())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| row.into_domain().map_err(Into::into))
            .collect()
    }

    async fn latest(&self, user_id: &str) -> CoreResult<Option<Statistic>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let user_id = user_id.to_string();
        let row: Option<StatisticRow> = dsl::statistics
            .filter(dsl::user_id.eq(user_id))
            .order(dsl::date.desc())
            .select(StatisticRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(|r| r.into_domain().map_err(Into::into)).transpose()
    }

    /// Replaces any existing row for the same `(user_id, calendar day)`:
    /// deletes it first, then inserts, since Diesel's `on_conflict` targets
    /// a literal column/constraint and cannot target an expression index.
    async fn upsert(&self, stat: Statistic) -> CoreResult<()> {
        let row = NewStatisticRow::from_domain(&stat)?;
        let user_id = stat.user_id.clone();
        let day = stat.date.date_naive();
        self.writer
            .exec(move |conn| -> crate::errors::Result<()> {
                conn.transaction(|conn| -> crate::errors::Result<()> {
                    diesel::delete(
                        dsl::statistics
                            .filter(dsl::user_id.eq(&user_id))
                            .filter(diesel::dsl::sql::<diesel::sql_types::Date>("date(date)").eq(day)),
                    )
                    .execute(conn)
                    .map_err(StorageError::from)?;
                    diesel::insert_into(statistics::table)
                        .values(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                    Ok(())
                })
            })
            .await
            .map_err(Into::into)
    }
}
