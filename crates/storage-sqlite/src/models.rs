//! Row structs bridging Diesel's `Text`-backed storage and the core domain
//! types. Decimal and classification enums are stored as strings and parsed
//! here; `bond_settings`/`distribution_by_class` round-trip through
//! `serde_json` in a single TEXT column rather than a normalized table,
//! matching the size of this data (a handful of entries per asset/day).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use wealthfolio_core::domain::{
    Asset, AssetClass, AssetStatus, BondSettings, DistributionByClass, FxRateRow, InstrumentDirectoryEntry,
    MarketIdentity, OhlcvBar, QuoteMode, Statistic,
};

use crate::errors::{Result, StorageError};
use crate::schema::{assets, fx_rates, instrument_directory, ohlcv_bars, statistics};

pub fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
    dt.naive_utc()
}

pub fn from_naive(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

pub fn decimal_to_text(value: Decimal) -> String {
    value.to_string()
}

pub fn decimal_from_text(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|err| StorageError::Malformed(format!("bad decimal '{raw}': {err}")))
}

fn class_to_text(class: AssetClass) -> &'static str {
    match class {
        AssetClass::EquityEtf => "equity_etf",
        AssetClass::Crypto => "crypto",
        AssetClass::Bond => "bond",
        AssetClass::Savings => "savings",
        AssetClass::RealEstate => "real_estate",
        AssetClass::Other => "other",
    }
}

fn class_from_text(raw: &str) -> Result<AssetClass> {
    Ok(match raw {
        "equity_etf" => AssetClass::EquityEtf,
        "crypto" => AssetClass::Crypto,
        "bond" => AssetClass::Bond,
        "savings" => AssetClass::Savings,
        "real_estate" => AssetClass::RealEstate,
        "other" => AssetClass::Other,
        other => return Err(StorageError::Malformed(format!("unknown asset classification '{other}'"))),
    })
}

fn status_to_text(status: AssetStatus) -> &'static str {
    match status {
        AssetStatus::Active => "active",
        AssetStatus::Closed => "closed",
    }
}

fn status_from_text(raw: &str) -> Result<AssetStatus> {
    Ok(match raw {
        "active" => AssetStatus::Active,
        "closed" => AssetStatus::Closed,
        other => return Err(StorageError::Malformed(format!("unknown asset status '{other}'"))),
    })
}

fn quote_mode_to_text(mode: QuoteMode) -> &'static str {
    match mode {
        QuoteMode::Auto => "auto",
        QuoteMode::Manual => "manual",
    }
}

fn quote_mode_from_text(raw: &str) -> Result<QuoteMode> {
    Ok(match raw {
        "auto" => QuoteMode::Auto,
        "manual" => QuoteMode::Manual,
        other => return Err(StorageError::Malformed(format!("unknown quote mode '{other}'"))),
    })
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = assets)]
pub struct AssetRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub classification: String,
    pub status: String,
    pub symbol: Option<String>,
    pub venue_code: Option<String>,
    pub purchase_price: String,
    pub purchase_date: NaiveDate,
    pub quantity: String,
    pub currency: Option<String>,
    pub current_price: Option<String>,
    pub bond_settings_json: Option<String>,
    pub quote_mode: String,
    pub closed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = assets)]
pub struct NewAssetRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub classification: String,
    pub status: String,
    pub symbol: Option<String>,
    pub venue_code: Option<String>,
    pub purchase_price: String,
    pub purchase_date: NaiveDate,
    pub quantity: String,
    pub currency: Option<String>,
    pub current_price: Option<String>,
    pub bond_settings_json: Option<String>,
    pub quote_mode: String,
    pub closed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AssetRow {
    pub fn into_domain(self) -> Result<Asset> {
        let bond_settings = match self.bond_settings_json {
            Some(json) => Some(
                serde_json::from_str::<BondSettings>(&json)
                    .map_err(|err| StorageError::Malformed(format!("bad bond_settings_json: {err}")))?,
            ),
            None => None,
        };
        let market_identity = match (self.symbol, self.venue_code) {
            (Some(symbol), Some(venue_code)) => Some(MarketIdentity { symbol, venue_code }),
            _ => None,
        };
        Ok(Asset {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            classification: class_from_text(&self.classification)?,
            status: status_from_text(&self.status)?,
            market_identity,
            purchase_price: decimal_from_text(&self.purchase_price)?,
            purchase_date: self.purchase_date,
            quantity: decimal_from_text(&self.quantity)?,
            currency: self.currency,
            current_price: self.current_price.as_deref().map(decimal_from_text).transpose()?,
            bond_settings,
            quote_mode: quote_mode_from_text(&self.quote_mode)?,
            closed_at: self.closed_at.map(from_naive),
            created_at: from_naive(self.created_at),
            updated_at: from_naive(self.updated_at),
        })
    }
}

impl NewAssetRow {
    pub fn from_domain(asset: &Asset) -> Result<Self> {
        let bond_settings_json = asset
            .bond_settings
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| StorageError::Malformed(format!("bad bond_settings: {err}")))?;
        Ok(Self {
            id: asset.id.clone(),
            user_id: asset.user_id.clone(),
            name: asset.name.clone(),
            classification: class_to_text(asset.classification).to_string(),
            status: status_to_text(asset.status).to_string(),
            symbol: asset.market_identity.as_ref().map(|m| m.symbol.clone()),
            venue_code: asset.market_identity.as_ref().map(|m| m.venue_code.clone()),
            purchase_price: decimal_to_text(asset.purchase_price),
            purchase_date: asset.purchase_date,
            quantity: decimal_to_text(asset.quantity),
            currency: asset.currency.clone(),
            current_price: asset.current_price.map(decimal_to_text),
            bond_settings_json,
            quote_mode: quote_mode_to_text(asset.quote_mode).to_string(),
            closed_at: asset.closed_at.map(to_naive),
            created_at: to_naive(asset.created_at),
            updated_at: to_naive(asset.updated_at),
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ohlcv_bars)]
pub struct OhlcvBarRow {
    pub id: i32,
    pub symbol: String,
    pub venue_code: String,
    pub timestamp: NaiveDateTime,
    pub interval: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub quote_currency: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ohlcv_bars)]
pub struct NewOhlcvBarRow {
    pub symbol: String,
    pub venue_code: String,
    pub timestamp: NaiveDateTime,
    pub interval: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub quote_currency: String,
}

fn interval_to_text(interval: wealthfolio_core::domain::BarInterval) -> &'static str {
    interval.as_wire_str()
}

fn interval_from_text(raw: &str) -> Result<wealthfolio_core::domain::BarInterval> {
    use wealthfolio_core::domain::BarInterval;
    Ok(match raw {
        "1hour" => BarInterval::OneHour,
        "1day" => BarInterval::OneDay,
        other => return Err(StorageError::Malformed(format!("unknown bar interval '{other}'"))),
    })
}

impl OhlcvBarRow {
    pub fn into_domain(self) -> Result<OhlcvBar> {
        Ok(OhlcvBar {
            symbol: self.symbol,
            venue_code: self.venue_code,
            timestamp: from_naive(self.timestamp),
            interval: interval_from_text(&self.interval)?,
            open: decimal_from_text(&self.open)?,
            high: decimal_from_text(&self.high)?,
            low: decimal_from_text(&self.low)?,
            close: decimal_from_text(&self.close)?,
            volume: decimal_from_text(&self.volume)?,
            quote_currency: self.quote_currency,
        })
    }
}

impl NewOhlcvBarRow {
    pub fn from_domain(bar: &OhlcvBar) -> Self {
        Self {
            symbol: bar.symbol.clone(),
            venue_code: bar.venue_code.clone(),
            timestamp: to_naive(bar.timestamp),
            interval: interval_to_text(bar.interval).to_string(),
            open: decimal_to_text(bar.open),
            high: decimal_to_text(bar.high),
            low: decimal_to_text(bar.low),
            close: decimal_to_text(bar.close),
            volume: decimal_to_text(bar.volume),
            quote_currency: bar.quote_currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = instrument_directory)]
pub struct InstrumentDirectoryRow {
    pub symbol: String,
    pub venue_code: String,
    pub display_venue: String,
    pub name: String,
    pub country: Option<String>,
    pub quote_currency: String,
    pub updated_at: NaiveDateTime,
}

impl InstrumentDirectoryRow {
    pub fn into_domain(self) -> InstrumentDirectoryEntry {
        InstrumentDirectoryEntry {
            symbol: self.symbol,
            venue_code: self.venue_code,
            display_venue: self.display_venue,
            name: self.name,
            country: self.country,
            quote_currency: self.quote_currency,
            updated_at: from_naive(self.updated_at),
        }
    }

    pub fn from_domain(entry: &InstrumentDirectoryEntry) -> Self {
        Self {
            symbol: entry.symbol.clone(),
            venue_code: entry.venue_code.clone(),
            display_venue: entry.display_venue.clone(),
            name: entry.name.clone(),
            country: entry.country.clone(),
            quote_currency: entry.quote_currency.clone(),
            updated_at: to_naive(entry.updated_at),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = fx_rates)]
pub struct FxRateDbRow {
    pub source_ccy: String,
    pub target_ccy: String,
    pub rate: String,
    pub fetched_at: NaiveDateTime,
}

impl FxRateDbRow {
    pub fn into_domain(self) -> Result<FxRateRow> {
        Ok(FxRateRow {
            source_ccy: self.source_ccy,
            target_ccy: self.target_ccy,
            rate: decimal_from_text(&self.rate)?,
            fetched_at: from_naive(self.fetched_at),
        })
    }

    pub fn from_domain(row: &FxRateRow) -> Self {
        Self {
            source_ccy: row.source_ccy.clone(),
            target_ccy: row.target_ccy.clone(),
            rate: decimal_to_text(row.rate),
            fetched_at: to_naive(row.fetched_at),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = statistics)]
pub struct StatisticRow {
    pub id: i32,
    pub user_id: String,
    pub date: NaiveDateTime,
    pub total_portfolio_value_usd: String,
    pub distribution_by_class_json: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = statistics)]
pub struct NewStatisticRow {
    pub user_id: String,
    pub date: NaiveDateTime,
    pub total_portfolio_value_usd: String,
    pub distribution_by_class_json: String,
}

impl StatisticRow {
    pub fn into_domain(self) -> Result<Statistic> {
        let distribution: HashMap<String, Decimal> = serde_json::from_str(&self.distribution_by_class_json)
            .map_err(|err| StorageError::Malformed(format!("bad distribution_by_class_json: {err}")))?;
        let mut distribution_by_class_usd = DistributionByClass::new();
        for (class_key, value) in distribution {
            distribution_by_class_usd.insert(class_from_text(&class_key)?, value);
        }
        Ok(Statistic {
            user_id: self.user_id,
            date: from_naive(self.date),
            total_portfolio_value_usd: decimal_from_text(&self.total_portfolio_value_usd)?,
            distribution_by_class_usd,
        })
    }
}

impl NewStatisticRow {
    pub fn from_domain(stat: &Statistic) -> Result<Self> {
        let distribution: HashMap<&'static str, Decimal> = stat
            .distribution_by_class_usd
            .iter()
            .map(|(class, value)| (class_to_text(*class), *value))
            .collect();
        let distribution_by_class_json = serde_json::to_string(&distribution)
            .map_err(|err| StorageError::Malformed(format!("bad distribution: {err}")))?;
        Ok(Self {
            user_id: stat.user_id.clone(),
            date: to_naive(stat.date),
            total_portfolio_value_usd: decimal_to_text(stat.total_portfolio_value_usd),
            distribution_by_class_json,
        })
    }
}
