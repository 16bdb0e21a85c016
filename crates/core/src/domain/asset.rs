//! Asset entity and its classification.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Asset classification, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    EquityEtf,
    Crypto,
    Bond,
    Savings,
    RealEstate,
    Other,
}

impl AssetClass {
    /// Assets priced from OHLCV bars (C3 market-asset path).
    pub fn is_market_traded(&self) -> bool {
        matches!(self, AssetClass::EquityEtf | AssetClass::Crypto)
    }

    pub fn is_bond(&self) -> bool {
        matches!(self, AssetClass::Bond)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Active,
    Closed,
}

/// Controls whether ingestion (C6) and backfill (C7) track an asset at all.
///
/// Adopted from the original `auto_update` flag; `Manual` assets are priced
/// only from their own `current_price`/`purchase_price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteMode {
    Auto,
    Manual,
}

impl Default for QuoteMode {
    fn default() -> Self {
        QuoteMode::Auto
    }
}

/// Bond settings, as documented in spec §4.2. Stored as an opaque map at the
/// storage boundary but strongly typed once loaded by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondRateEntry {
    pub rate_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondSettings {
    pub capitalization_of_interest: bool,
    pub capitalization_frequency_months: Option<u32>,
    #[serde(default = "default_reset_frequency")]
    pub rate_reset_frequency_months: u32,
    /// Keyed by period index starting at 1 (serialized as a string key to
    /// match the wire/storage representation of `interest_rates`).
    pub interest_rates: HashMap<String, BondRateEntry>,
    pub maturity_date: NaiveDate,
}

fn default_reset_frequency() -> u32 {
    12
}

/// A market identity: a symbol listed on a specific venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketIdentity {
    pub symbol: String,
    pub venue_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub classification: AssetClass,
    pub status: AssetStatus,
    pub market_identity: Option<MarketIdentity>,
    pub purchase_price: Decimal,
    pub purchase_date: NaiveDate,
    pub quantity: Decimal,
    pub currency: Option<String>,
    pub current_price: Option<Decimal>,
    pub bond_settings: Option<BondSettings>,
    pub quote_mode: QuoteMode,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    /// Currency the asset's price is denominated in; defaults to the asset's
    /// own currency, falling back to USD when unset (cash-like assets).
    pub fn effective_currency(&self) -> &str {
        self.currency.as_deref().unwrap_or("USD")
    }

    /// True when the asset existed and was active at `t` under the
    /// closed-asset REDESIGN (§3 of SPEC_FULL.md): purchase_date <= t and,
    /// if closed, t is strictly before the close instant.
    pub fn existed_at(&self, t: DateTime<Utc>) -> bool {
        let purchase_dt = self
            .purchase_date
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
            .unwrap_or(t);
        if t < purchase_dt {
            return false;
        }
        match self.closed_at {
            Some(closed) => t < closed,
            None => true,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, AssetStatus::Active)
    }

    pub fn tracked_by_ingestion(&self) -> bool {
        matches!(self.quote_mode, QuoteMode::Auto) && self.market_identity.is_some()
    }
}
