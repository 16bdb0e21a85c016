pub mod assets;
pub mod bars;
pub mod fx_rates;
pub mod instruments;
pub mod statistics;

pub use assets::AssetRepository;
pub use bars::BarRepository;
pub use fx_rates::FxRateRepository;
pub use instruments::InstrumentDirectoryRepository;
pub use statistics::StatisticRepository;
