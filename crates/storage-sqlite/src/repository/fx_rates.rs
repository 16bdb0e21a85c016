//! FX Table (C1) persistence: direct, non-transitive `(source, target)` rows.

use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;

use wealthfolio_core::domain::FxRateRow;
use wealthfolio_core::errors::Result as CoreResult;
use wealthfolio_core::fx::FxRateStoreTrait;

use crate::db::{get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::models::FxRateDbRow;
use crate::schema::fx_rates;
use crate::schema::fx_rates::dsl;

pub struct FxRateRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl FxRateRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl FxRateStoreTrait for FxRateRepository {
    async fn upsert_rates(&self, rates: &[FxRateRow]) -> CoreResult<()> {
        let rows: Vec<FxRateDbRow> = rates.iter().map(FxRateDbRow::from_domain).collect();
        self.writer
            .exec(move |conn| -> crate::errors::Result<()> {
                for row in rows {
                    diesel::insert_into(fx_rates::table)
                        .values(&row)
                        .on_conflict((dsl::source_ccy, dsl::target_ccy))
                        .do_update()
                        .set(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    fn load_all(&self) -> CoreResult<Vec<FxRateRow>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let rows: Vec<FxRateDbRow> = dsl::fx_rates
            .select(FxRateDbRow::as_select())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| row.into_domain().map_err(Into::into))
            .collect()
    }
}
