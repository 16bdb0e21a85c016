//! Provider error kinds. Folded into `wealthfolio_core::CoreError::Provider`
//! at the crate boundary, mirroring how `openfigi`/`us_treasury_calc` box
//! their HTTP/parse failures into a single `ProviderError` variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("http request to {provider} failed: {message}")]
    Http { provider: &'static str, message: String },

    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse { provider: &'static str, message: String },

    #[error("{provider} responded with status {status}")]
    BadStatus { provider: &'static str, status: u16 },
}

impl From<MarketDataError> for wealthfolio_core::CoreError {
    fn from(err: MarketDataError) -> Self {
        wealthfolio_core::CoreError::Provider(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketDataError>;
