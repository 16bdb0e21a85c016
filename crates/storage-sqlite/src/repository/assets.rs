//! Asset persistence: implements the statistic builder's `AssetStoreTrait`
//! plus the plain CRUD the upstream API boundary needs
//! (`on_asset_created`/`on_asset_mutated`/`on_asset_closed`, spec §4.7).

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

use wealthfolio_core::domain::Asset;
use wealthfolio_core::errors::Result as CoreResult;
use wealthfolio_core::portfolio::AssetStoreTrait;

use crate::db::{get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::models::{decimal_to_text, to_naive, AssetRow, NewAssetRow};
use crate::schema::assets;
use crate::schema::assets::dsl;

pub struct AssetRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl AssetRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    pub async fn upsert_asset(&self, asset: Asset) -> CoreResult<()> {
        let row = NewAssetRow::from_domain(&asset).map_err(StorageError::from)?;
        self.writer
            .exec(move |conn| -> crate::errors::Result<()> {
                diesel::insert_into(assets::table)
                    .values(&row)
                    .on_conflict(dsl::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    pub async fn close_asset(&self, asset_id: &str, closed_at: chrono::DateTime<Utc>) -> CoreResult<()> {
        let asset_id = asset_id.to_string();
        self.writer
            .exec(move |conn| -> crate::errors::Result<()> {
                diesel::update(dsl::assets.find(asset_id))
                    .set((
                        dsl::status.eq("closed"),
                        dsl::closed_at.eq(Some(to_naive(closed_at))),
                        dsl::updated_at.eq(to_naive(Utc::now())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    pub fn get_asset(&self, asset_id: &str) -> CoreResult<Option<Asset>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let row: Option<AssetRow> = dsl::assets
            .find(asset_id)
            .select(AssetRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(|r| r.into_domain().map_err(Into::into)).transpose()
    }
}

#[async_trait]
impl AssetStoreTrait for AssetRepository {
    async fn assets_for_user(&self, user_id: &str) -> CoreResult<Vec<Asset>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let user_id = user_id.to_string();
        let rows: Vec<AssetRow> = dsl::assets
            .filter(dsl::user_id.eq(user_id))
            .select(AssetRow::as_select())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| row.into_domain().map_err(Into::into))
            .collect()
    }

    async fn update_current_price(&self, asset_id: &str, price: Decimal) -> CoreResult<()> {
        let asset_id = asset_id.to_string();
        let price_text = decimal_to_text(price);
        self.writer
            .exec(move |conn| -> crate::errors::Result<()> {
                diesel::update(dsl::assets.find(asset_id))
                    .set(dsl::current_price.eq(Some(price_text)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    fn distinct_user_ids(&self) -> CoreResult<Vec<String>> {
        let mut conn = get_connection(&self.pool).map_err(StorageError::from)?;
        let ids = dsl::assets
            .select(dsl::user_id)
            .distinct()
            .load(&mut conn)
            .map_err(StorageError::from)?;
        Ok(ids)
    }
}
