//! SQLite backend for the ACH gateway store.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
