//! Entity types shared across the valuation pipeline.

pub mod asset;
pub mod bar;
pub mod fx_rate;
pub mod instrument;
pub mod statistic;

pub use asset::{Asset, AssetClass, AssetStatus, BondSettings, MarketIdentity, QuoteMode};
pub use bar::{BarInterval, OhlcvBar};
pub use fx_rate::FxRateRow;
pub use instrument::{InstrumentDirectoryEntry, InstrumentKind};
pub use statistic::{DistributionByClass, Statistic};
