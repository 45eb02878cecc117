use crate::{
    file_transfer::{CutoffTime, FileTransferConfig},
    traits::GatewayDatabaseError,
};

/// Per-routing-number settings for the file transfer controller.
#[allow(async_fn_in_trait)]
pub trait FileTransferConfigs {
    /// All stored cutoff times. Rows that do not form a valid cutoff are logged and left out.
    async fn fetch_cutoff_times(&self) -> Result<Vec<CutoffTime>, GatewayDatabaseError>;

    async fn upsert_cutoff_time(&self, cutoff: &CutoffTime) -> Result<(), GatewayDatabaseError>;

    /// All stored file transfer configs. Rows with an unknown protocol are logged and left out.
    async fn fetch_file_transfer_configs(&self) -> Result<Vec<FileTransferConfig>, GatewayDatabaseError>;

    async fn upsert_file_transfer_config(&self, config: &FileTransferConfig) -> Result<(), GatewayDatabaseError>;
}
