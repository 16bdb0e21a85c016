//! Instrument Directory persistence (weekly snapshot, spec §4.6).

use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;

use wealthfolio_core::domain::InstrumentDirectoryEntry;
use wealthfolio_core::errors::Result as CoreResult;
use wealthfolio_core::market_data::InstrumentDirectoryStoreTrait;

use crate::db::{get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::models::InstrumentDirectoryRow;
use crate::schema::instrument_directory;
use crate::schema::instrument_directory::dsl;

pub struct InstrumentDirectoryRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl InstrumentDirectoryRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    pub fn load_all(&self) -> CoreResult<Vec<InstrumentDirectoryEntry>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let rows: Vec<InstrumentDirectoryRow> = dsl::instrument_directory
            .select(InstrumentDirectoryRow::as_select())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(InstrumentDirectoryRow::into_domain).collect())
    }
}

#[async_trait]
impl InstrumentDirectoryStoreTrait for InstrumentDirectoryRepository {
    /// Replaces the snapshot via UPSERT on `(symbol, venue_code)` (spec
    /// §4.6) — existing rows not present in `entries` are left untouched;
    /// the provider's listing is itself the full universe each refresh.
    async fn replace_snapshot(&self, entries: &[InstrumentDirectoryEntry]) -> CoreResult<usize> {
        let rows: Vec<InstrumentDirectoryRow> = entries.iter().map(InstrumentDirectoryRow::from_domain).collect();
        self.writer
            .exec(move |conn| -> crate::errors::Result<usize> {
                let mut affected = 0;
                for row in rows {
                    affected += diesel::insert_into(instrument_directory::table)
                        .values(&row)
                        .on_conflict((dsl::symbol, dsl::venue_code))
                        .do_update()
                        .set(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(affected)
            })
            .await
            .map_err(Into::into)
    }
}
