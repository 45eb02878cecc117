use thiserror::Error;

use crate::{
    db_types::{Transfer, TransferStatus},
    traits::{AchFileStorage, DepositoryManagement, FileTransferConfigs, MicroDepositManagement, TransferManagement},
};

#[derive(Debug, Clone, Error)]
pub enum GatewayDatabaseError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Transfer {0} does not exist")]
    TransferNotFound(String),
    #[error("Transfer {0} cannot be reclaimed while it is {1}")]
    TransferNotReclaimable(String, TransferStatus),
    #[error("Depository {0} does not exist")]
    DepositoryNotFound(String),
    #[error("No micro-deposits exist for file {0}")]
    MicroDepositNotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("Invalid value stored in the database. {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for GatewayDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        GatewayDatabaseError::DatabaseError(e.to_string())
    }
}

/// The highest level of behaviour for backends supporting the ACH gateway file transfer engine.
#[allow(async_fn_in_trait)]
pub trait GatewayDatabase:
    Clone + TransferManagement + DepositoryManagement + MicroDepositManagement + AchFileStorage + FileTransferConfigs
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Applies the outcome of a returned entry in a single atomic transaction:
    /// * the return code is recorded against the transfer and its status set to `reclaimed`,
    /// * every depository in `rejected_depositories` is marked as `rejected`.
    ///
    /// Only `pending` or `processed` transfers can be reclaimed. Any other status, or a missing transfer or
    /// depository, rolls back the whole transaction.
    async fn reclaim_transfer(
        &self,
        transfer_id: &str,
        return_code: &str,
        rejected_depositories: &[String],
    ) -> Result<Transfer, GatewayDatabaseError>;
}
