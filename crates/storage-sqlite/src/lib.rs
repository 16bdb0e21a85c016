pub mod db;
pub mod errors;
pub mod models;
pub mod repository;
pub mod schema;

pub use db::{build_pool, get_connection, run_migrations, PooledSqliteConnection, SqlitePool, WriteHandle};
pub use errors::StorageError;
pub use repository::{AssetRepository, BarRepository, FxRateRepository, InstrumentDirectoryRepository, StatisticRepository};
