//! # Gateway store interfaces
//!
//! The file transfer engine never talks to a database directly. It sees the store through the narrow traits in this
//! module, which a backend (currently only [`crate::SqliteDatabase`]) implements.
//!
//! * [`TransferManagement`] pages through pending transfers and records merge results against them.
//! * [`DepositoryManagement`] resolves and updates the bank accounts that transfers move money between.
//! * [`MicroDepositManagement`] does the same for account verification micro-deposits.
//! * [`AchFileStorage`] holds the per-transfer ACH files that are merged into settlement files.
//! * [`FileTransferConfigs`] provides cutoff times and file transfer settings per routing number.
//! * [`GatewayDatabase`] ties them together and adds the operations that span several of them atomically.
mod ach_file_storage;
mod depository_management;
mod file_transfer_configs;
mod gateway_database;
mod micro_deposit_management;
mod transfer_management;

pub use ach_file_storage::AchFileStorage;
pub use depository_management::DepositoryManagement;
pub use file_transfer_configs::FileTransferConfigs;
pub use gateway_database::{GatewayDatabase, GatewayDatabaseError};
pub use micro_deposit_management::MicroDepositManagement;
pub use transfer_management::TransferManagement;
