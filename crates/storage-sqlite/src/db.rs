//! Connection pool and single-writer indirection.
//!
//! Grounded on `goals::repository::GoalRepository`'s usage of
//! `crate::db::{get_connection, WriteHandle}`: reads go through the r2d2
//! pool directly; every write is funneled through one `WriteHandle` so
//! SQLite's single-writer constraint never surfaces as a `SQLITE_BUSY` race
//! between concurrent async tasks.

use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::{Arc, Mutex};

use crate::errors::{Result, StorageError};

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledSqliteConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn build_pool(database_url: &str) -> Result<Arc<SqlitePool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .build(manager)
        .map_err(|err| StorageError::Pool(err.to_string()))?;
    Ok(Arc::new(pool))
}

pub fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut conn = pool.get().map_err(|err| StorageError::Pool(err.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| StorageError::Migration(err.to_string()))?;
    Ok(())
}

pub fn get_connection(pool: &SqlitePool) -> Result<PooledSqliteConnection> {
    pool.get().map_err(|err| StorageError::Pool(err.to_string()))
}

/// Single-writer actor: every mutation is dispatched through this handle so
/// writes against the same SQLite file are strictly serialized, regardless
/// of how many async tasks call in concurrently.
#[derive(Clone)]
pub struct WriteHandle {
    conn: Arc<Mutex<SqliteConnection>>,
}

impl WriteHandle {
    pub fn new(conn: SqliteConnection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(database_url: &str) -> Result<Self> {
        use diesel::Connection;
        let conn = SqliteConnection::establish(database_url)
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(Self::new(conn))
    }

    /// Runs `f` against the dedicated writer connection on a blocking
    /// thread, holding the writer mutex for the duration of the closure.
    pub async fn exec<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().expect("writer mutex poisoned");
            f(&mut guard)
        })
        .await
        .map_err(|err| StorageError::WriterPanicked(err.to_string()))?
    }
}
