use chrono::NaiveDate;

use crate::{
    db_types::{Cents, GroupableTransfer, NewTransfer, PageCursor, Transfer},
    traits::GatewayDatabaseError,
};

#[allow(async_fn_in_trait)]
pub trait TransferManagement {
    /// Stores a new transfer with `pending` status.
    async fn insert_transfer(&self, transfer: NewTransfer) -> Result<Transfer, GatewayDatabaseError>;

    async fn fetch_transfer(&self, id: &str) -> Result<Option<Transfer>, GatewayDatabaseError>;

    /// Returns up to `limit` pending transfers that have not been merged yet, created strictly after `cursor`, in
    /// `(created_at, id)` order.
    async fn fetch_pending_transfers(
        &self,
        cursor: &PageCursor,
        limit: u32,
    ) -> Result<Vec<GroupableTransfer>, GatewayDatabaseError>;

    /// Records the settlement file that the transfer's batch was merged into.
    async fn mark_transfer_as_merged(&self, transfer_id: &str, filename: &str) -> Result<(), GatewayDatabaseError>;

    /// Finds the transfer that a returned entry refers to. If several transfers match, the most recent is returned.
    async fn lookup_transfer_from_return(
        &self,
        sec_code: &str,
        amount: Cents,
        trace_number: &str,
        effective_entry_date: NaiveDate,
    ) -> Result<Option<Transfer>, GatewayDatabaseError>;
}
