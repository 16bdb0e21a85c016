//! Asset-mutation entry points (spec §6, "inputs to the core from
//! upstream"): whatever owns asset CRUD calls these three after a create,
//! a mutation, or a close. Each triggers C7 for the affected asset (a
//! no-op for non-market assets) and then a backwards rebuild of the
//! owning user's statistic series (spec §4.7: "after C7 completes, C8
//! must be invoked for the owning user").

use std::sync::Arc;

use chrono::Utc;

use crate::domain::Asset;
use crate::errors::Result;
use crate::ingestion::backfill::PriceBackfill;

use super::StatisticBuilder;

pub struct AssetLifecycle {
    backfill: Arc<PriceBackfill>,
    statistic_builder: Arc<StatisticBuilder>,
}

impl AssetLifecycle {
    pub fn new(backfill: Arc<PriceBackfill>, statistic_builder: Arc<StatisticBuilder>) -> Self {
        Self {
            backfill,
            statistic_builder,
        }
    }

    pub async fn on_asset_created(&self, asset: &Asset) -> Result<()> {
        self.backfill_then_rebuild(asset).await
    }

    pub async fn on_asset_mutated(&self, asset: &Asset) -> Result<()> {
        self.backfill_then_rebuild(asset).await
    }

    pub async fn on_asset_closed(&self, asset: &Asset) -> Result<()> {
        self.backfill_then_rebuild(asset).await
    }

    async fn backfill_then_rebuild(&self, asset: &Asset) -> Result<()> {
        self.backfill.backfill_asset(asset, Utc::now()).await?;
        self.statistic_builder.rebuild_for_user(&asset.user_id, true).await
    }
}
