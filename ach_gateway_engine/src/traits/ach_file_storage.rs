use crate::traits::GatewayDatabaseError;

/// Storage for the NACHA-formatted files generated for individual transfers and micro-deposits.
#[allow(async_fn_in_trait)]
pub trait AchFileStorage {
    /// Stores the file contents under `file_id`, replacing any previous contents.
    async fn save_ach_file(&self, file_id: &str, contents: &str) -> Result<(), GatewayDatabaseError>;

    async fn fetch_ach_file(&self, file_id: &str) -> Result<Option<String>, GatewayDatabaseError>;
}
