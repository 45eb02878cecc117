//! ACH Gateway Engine
//!
//! The engine owns the settlement file lifecycle of the ACH gateway. Pending transfers and micro-deposits each come
//! with a small ACH file of their own. The engine merges those into per-ODFI settlement files, uploads them ahead of
//! each ODFI's cutoff, downloads inbound and return files and reconciles returned entries against the transfers
//! they came from.
//!
//! The library is divided into these sections:
//! 1. The NACHA file model ([`mod@ach`]): parsing and rendering of fixed-width ACH files.
//! 2. Store access ([`mod@traits`] and [`mod@db_types`]). Backends implement the traits in `traits`; SQLite is
//!    the only backend currently provided, as [`SqliteDatabase`].
//! 3. The file transfer engine ([`mod@file_transfer`]): transfer agents, the merge engine, return reconciliation and
//!    the controller that drives them.
//! 4. The accounts ledger client ([`mod@ledger`]) used to reverse the ledger transactions of returned transfers.
pub mod ach;
pub mod db_types;
pub mod file_transfer;
pub mod ledger;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
