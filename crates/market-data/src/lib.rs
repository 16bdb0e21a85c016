//! TwelveData-shaped Quote Provider Client (C5): HTTP provider, rate-limit
//! gate, and wire-model parsing. Implements `wealthfolio_core`'s
//! `QuoteProviderTrait`; owns no storage of its own.

pub mod errors;
pub mod provider;
pub mod rate_limit;

pub use errors::MarketDataError;
pub use provider::TwelveDataProvider;
pub use rate_limit::{RateLimitGate, QUOTE_PROVIDER_MIN_DELAY};
