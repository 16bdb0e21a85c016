//! Quote Provider Client (C5): a TwelveData-shaped REST provider implementing
//! `wealthfolio_core`'s `QuoteProviderTrait`.
//!
//! Grounded on `original_source`'s `TwelveDataProvider` for the wire shape
//! (`/stocks`, `/etfs`, `/cryptocurrencies`, `/time_series`,
//! `/exchange_rate`, the `meta.currency` propagation into every bar) and on
//! the teacher's `openfigi`/`us_treasury_calc` providers for the Rust
//! surface: a typed `reqwest::Client` with a bounded timeout, envelope
//! errors boxed into one `MarketDataError`, and the rate-limit gate wired
//! in front of every outbound call.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use wealthfolio_core::domain::{BarInterval, InstrumentDirectoryEntry, InstrumentKind, OhlcvBar};
use wealthfolio_core::market_data::QuoteProviderTrait;
use wealthfolio_core::{CoreError, Result as CoreResult};

use crate::errors::MarketDataError;
use crate::rate_limit::RateLimitGate;

const PROVIDER_ID: &str = "TWELVE_DATA";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct InstrumentRow {
    symbol: String,
    exchange: String,
    #[serde(default)]
    mic_code: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstrumentListResponse {
    #[serde(default)]
    data: Vec<InstrumentRow>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesMeta {
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    open: String,
    high: String,
    low: String,
    close: String,
    #[serde(default)]
    volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    meta: Option<TimeSeriesMeta>,
    #[serde(default)]
    values: Vec<TimeSeriesValue>,
}

#[derive(Debug, Deserialize)]
struct ExchangeRateResponse {
    rate: String,
    #[serde(default)]
    timestamp: Option<i64>,
}

pub struct TwelveDataProvider {
    client: Client,
    base_url: String,
    api_key: String,
    gate: Arc<RateLimitGate>,
}

impl TwelveDataProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, gate: Arc<RateLimitGate>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            gate,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, String)]) -> Result<T, MarketDataError> {
        self.gate.acquire().await;

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        log::debug!("twelve_data: requesting {path}");
        let mut request = self.client.get(&url).query(query);
        request = request.query(&[("apikey", self.api_key.as_str())]);

        let response = request.send().await.map_err(|err| MarketDataError::Http {
            provider: PROVIDER_ID,
            message: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("twelve_data: {path} returned status {status}");
            return Err(MarketDataError::BadStatus {
                provider: PROVIDER_ID,
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|err| MarketDataError::MalformedResponse {
            provider: PROVIDER_ID,
            message: err.to_string(),
        })
    }

    fn parse_instant(raw: &str) -> Result<DateTime<Utc>, MarketDataError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap()))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|err| MarketDataError::MalformedResponse {
                provider: PROVIDER_ID,
                message: format!("unparseable timestamp '{raw}': {err}"),
            })
    }

    fn parse_decimal(raw: &str, field: &'static str) -> Result<Decimal, MarketDataError> {
        raw.parse::<Decimal>().map_err(|err| MarketDataError::MalformedResponse {
            provider: PROVIDER_ID,
            message: format!("unparseable {field} '{raw}': {err}"),
        })
    }
}

#[async_trait]
impl QuoteProviderTrait for TwelveDataProvider {
    async fn list_instruments(&self, kind: InstrumentKind) -> CoreResult<Vec<InstrumentDirectoryEntry>> {
        let response: InstrumentListResponse = self
            .get_json(kind.as_wire_path(), &[])
            .await
            .map_err(CoreError::from)?;

        let now = Utc::now();
        Ok(response
            .data
            .into_iter()
            .map(|row| InstrumentDirectoryEntry {
                symbol: row.symbol,
                venue_code: row.mic_code.unwrap_or(row.exchange.clone()),
                display_venue: row.exchange,
                name: row.name,
                country: row.country,
                quote_currency: row.currency.unwrap_or_else(|| "USD".to_string()),
                updated_at: now,
            })
            .collect())
    }

    async fn time_series(
        &self,
        symbol: &str,
        venue_code: &str,
        interval: BarInterval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<OhlcvBar>> {
        let wire_interval = match interval {
            BarInterval::OneHour => "1h",
            BarInterval::OneDay => "1day",
        };
        let response: TimeSeriesResponse = self
            .get_json(
                "time_series",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", wire_interval.to_string()),
                    ("start_date", start.format("%Y-%m-%d %H:%M:%S").to_string()),
                    ("end_date", end.format("%Y-%m-%d %H:%M:%S").to_string()),
                ],
            )
            .await
            .map_err(CoreError::from)?;

        let currency = response
            .meta
            .and_then(|m| m.currency)
            .unwrap_or_else(|| "USD".to_string());

        let mut bars = Vec::with_capacity(response.values.len());
        for value in response.values {
            let parsed = (|| -> Result<OhlcvBar, MarketDataError> {
                let timestamp = Self::parse_instant(&value.datetime)?;
                let open = Self::parse_decimal(&value.open, "open")?;
                let high = Self::parse_decimal(&value.high, "high")?;
                let low = Self::parse_decimal(&value.low, "low")?;
                let close = Self::parse_decimal(&value.close, "close")?;
                let volume = match &value.volume {
                    Some(v) => Self::parse_decimal(v, "volume")?,
                    None => Decimal::ZERO,
                };
                Ok(OhlcvBar {
                    symbol: symbol.to_string(),
                    venue_code: venue_code.to_string(),
                    timestamp,
                    interval,
                    open,
                    high,
                    low,
                    close,
                    volume,
                    quote_currency: currency.clone(),
                })
            })();
            match parsed {
                Ok(bar) => bars.push(bar),
                Err(err) => log::warn!("twelve_data: dropping malformed bar for {symbol}@{venue_code}: {err}"),
            }
        }
        Ok(bars)
    }

    async fn exchange_rate(&self, source_ccy: &str, target_ccy: &str) -> CoreResult<(Decimal, DateTime<Utc>)> {
        let pair = format!("{source_ccy}/{target_ccy}");
        let response: ExchangeRateResponse = self
            .get_json("exchange_rate", &[("symbol", pair)])
            .await
            .map_err(CoreError::from)?;

        let rate = Self::parse_decimal(&response.rate, "rate").map_err(CoreError::from)?;
        let observed_at = response
            .timestamp
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);
        Ok((rate, observed_at))
    }
}
