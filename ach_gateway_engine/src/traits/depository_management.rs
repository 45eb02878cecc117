use crate::{
    db_types::{Depository, DepositoryStatus, NewDepository},
    traits::GatewayDatabaseError,
};

#[allow(async_fn_in_trait)]
pub trait DepositoryManagement {
    async fn insert_depository(&self, depository: NewDepository) -> Result<Depository, GatewayDatabaseError>;

    async fn fetch_depository(&self, id: &str) -> Result<Option<Depository>, GatewayDatabaseError>;

    /// Finds a user's depository at the given routing number. When `account_number` is `None`, the user's most
    /// recently created depository at that institution is returned.
    async fn lookup_depository_from_return(
        &self,
        user_id: &str,
        routing_number: &str,
        account_number: Option<&str>,
    ) -> Result<Option<Depository>, GatewayDatabaseError>;

    async fn update_depository_status(
        &self,
        id: &str,
        status: DepositoryStatus,
    ) -> Result<Depository, GatewayDatabaseError>;
}
