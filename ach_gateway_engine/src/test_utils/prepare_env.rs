use std::path::Path;

use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};
use tempfile::TempDir;

use crate::SqliteDatabase;

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

/// A database URL for a fresh store inside `dir`.
pub fn test_db_url(dir: &Path) -> String {
    format!("sqlite://{}/agw_test_store_{:08x}.db", dir.display(), rand::random::<u32>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if Sqlite::database_exists(p).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(p).await {
            warn!("Error dropping database {p}: {e:?}");
        }
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// Creates a fresh, migrated database in a new temporary directory and connects to it. The database is deleted when
/// the returned directory is dropped.
pub async fn new_test_database() -> (SqliteDatabase, TempDir) {
    let dir = tempfile::tempdir().expect("Error creating database directory");
    let db = new_test_database_in(dir.path()).await;
    (db, dir)
}

/// Creates a fresh, migrated database inside `dir` and connects to it.
pub async fn new_test_database_in(dir: &Path) -> SqliteDatabase {
    let url = test_db_url(dir);
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database")
}
