//! `SqliteDatabase` is a concrete implementation of an ACH gateway store.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::NaiveDate;
use log::*;
use sqlx::SqlitePool;

use super::db::{ach_files, db_url, depositories, file_transfer_configs, micro_deposits, new_pool, transfers};
use crate::{
    db_types::{
        Cents,
        Depository,
        DepositoryStatus,
        GroupableTransfer,
        MicroDeposit,
        NewDepository,
        NewMicroDeposit,
        NewTransfer,
        PageCursor,
        Transfer,
        UploadableMicroDeposit,
    },
    file_transfer::{CutoffTime, FileTransferConfig},
    traits::{
        AchFileStorage,
        DepositoryManagement,
        FileTransferConfigs,
        GatewayDatabase,
        GatewayDatabaseError,
        MicroDepositManagement,
        TransferManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl GatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn reclaim_transfer(
        &self,
        transfer_id: &str,
        return_code: &str,
        rejected_depositories: &[String],
    ) -> Result<Transfer, GatewayDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let transfer = transfers::reclaim_transfer(transfer_id, return_code, &mut tx).await?;
        for id in rejected_depositories {
            depositories::update_status(id, DepositoryStatus::Rejected, &mut tx).await?;
            debug!("🗃️ Depository {id} rejected after {return_code} on transfer {transfer_id}");
        }
        tx.commit().await?;
        info!("🗃️ Transfer {transfer_id} reclaimed with return code {return_code}");
        Ok(transfer)
    }
}

impl TransferManagement for SqliteDatabase {
    async fn insert_transfer(&self, transfer: NewTransfer) -> Result<Transfer, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        transfers::insert_transfer(transfer, &mut conn).await
    }

    async fn fetch_transfer(&self, id: &str) -> Result<Option<Transfer>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        transfers::fetch_transfer(id, &mut conn).await
    }

    async fn fetch_pending_transfers(
        &self,
        cursor: &PageCursor,
        limit: u32,
    ) -> Result<Vec<GroupableTransfer>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        transfers::fetch_pending_transfers(cursor, limit, &mut conn).await
    }

    async fn mark_transfer_as_merged(&self, transfer_id: &str, filename: &str) -> Result<(), GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        transfers::mark_transfer_as_merged(transfer_id, filename, &mut conn).await
    }

    async fn lookup_transfer_from_return(
        &self,
        sec_code: &str,
        amount: Cents,
        trace_number: &str,
        effective_entry_date: NaiveDate,
    ) -> Result<Option<Transfer>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        transfers::lookup_transfer_from_return(sec_code, amount, trace_number, effective_entry_date, &mut conn).await
    }
}

impl DepositoryManagement for SqliteDatabase {
    async fn insert_depository(&self, depository: NewDepository) -> Result<Depository, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        depositories::insert_depository(depository, &mut conn).await
    }

    async fn fetch_depository(&self, id: &str) -> Result<Option<Depository>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        depositories::fetch_depository(id, &mut conn).await
    }

    async fn lookup_depository_from_return(
        &self,
        user_id: &str,
        routing_number: &str,
        account_number: Option<&str>,
    ) -> Result<Option<Depository>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        depositories::lookup_depository(user_id, routing_number, account_number, &mut conn).await
    }

    async fn update_depository_status(
        &self,
        id: &str,
        status: DepositoryStatus,
    ) -> Result<Depository, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        depositories::update_status(id, status, &mut conn).await
    }
}

impl MicroDepositManagement for SqliteDatabase {
    async fn insert_micro_deposit(&self, deposit: NewMicroDeposit) -> Result<MicroDeposit, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        micro_deposits::insert_micro_deposit(deposit, &mut conn).await
    }

    async fn fetch_micro_deposits_for_depository(
        &self,
        depository_id: &str,
    ) -> Result<Vec<MicroDeposit>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        micro_deposits::fetch_for_depository(depository_id, &mut conn).await
    }

    async fn fetch_pending_micro_deposits(
        &self,
        cursor: &PageCursor,
        limit: u32,
    ) -> Result<Vec<UploadableMicroDeposit>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        micro_deposits::fetch_pending_micro_deposits(cursor, limit, &mut conn).await
    }

    async fn mark_micro_deposit_as_merged(&self, file_id: &str, filename: &str) -> Result<(), GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        micro_deposits::mark_as_merged(file_id, filename, &mut conn).await
    }
}

impl AchFileStorage for SqliteDatabase {
    async fn save_ach_file(&self, file_id: &str, contents: &str) -> Result<(), GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        ach_files::save_ach_file(file_id, contents, &mut conn).await
    }

    async fn fetch_ach_file(&self, file_id: &str) -> Result<Option<String>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        ach_files::fetch_ach_file(file_id, &mut conn).await
    }
}

impl FileTransferConfigs for SqliteDatabase {
    async fn fetch_cutoff_times(&self) -> Result<Vec<CutoffTime>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        file_transfer_configs::fetch_cutoff_times(&mut conn).await
    }

    async fn upsert_cutoff_time(&self, cutoff: &CutoffTime) -> Result<(), GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        file_transfer_configs::upsert_cutoff_time(cutoff, &mut conn).await
    }

    async fn fetch_file_transfer_configs(&self) -> Result<Vec<FileTransferConfig>, GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        file_transfer_configs::fetch_file_transfer_configs(&mut conn).await
    }

    async fn upsert_file_transfer_config(&self, config: &FileTransferConfig) -> Result<(), GatewayDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        file_transfer_configs::upsert_file_transfer_config(config, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `AGW_DATABASE_URL` (or the default database location).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies any outstanding migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
