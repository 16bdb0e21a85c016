//! Portfolio Statistic Builder (C8), its storage contracts, and the
//! asset-mutation entry points (spec §6) that sit in front of it.

pub mod lifecycle;
pub mod statistic_builder;

pub use lifecycle::AssetLifecycle;
pub use statistic_builder::{AssetStoreTrait, StatisticBuilder, StatisticStoreTrait};
