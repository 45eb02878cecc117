use crate::{
    db_types::{MicroDeposit, NewMicroDeposit, PageCursor, UploadableMicroDeposit},
    traits::GatewayDatabaseError,
};

#[allow(async_fn_in_trait)]
pub trait MicroDepositManagement {
    async fn insert_micro_deposit(&self, deposit: NewMicroDeposit) -> Result<MicroDeposit, GatewayDatabaseError>;

    async fn fetch_micro_deposits_for_depository(
        &self,
        depository_id: &str,
    ) -> Result<Vec<MicroDeposit>, GatewayDatabaseError>;

    /// Returns up to `limit` unmerged micro-deposit files created strictly after `cursor`. The cursor id is the file
    /// id.
    async fn fetch_pending_micro_deposits(
        &self,
        cursor: &PageCursor,
        limit: u32,
    ) -> Result<Vec<UploadableMicroDeposit>, GatewayDatabaseError>;

    /// Records the settlement file against every micro-deposit carried by `file_id`.
    async fn mark_micro_deposit_as_merged(&self, file_id: &str, filename: &str) -> Result<(), GatewayDatabaseError>;
}
