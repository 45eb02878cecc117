use ach_gateway_engine::{file_transfer::FileTransferController, ledger::AccountsClient, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

pub type GatewayController = FileTransferController<SqliteDatabase, AccountsClient>;

/// Starts the file transfer controller on its own task. The task runs until the controller is shut down through its
/// handle, or every handle has been dropped.
pub fn start_file_transfer_worker(controller: GatewayController) -> JoinHandle<()> {
    let schedule = controller.schedule();
    if schedule.is_empty() {
        warn!("🕰️ No cutoff times are configured. Open files will only be uploaded once they are full or a day old.");
    } else {
        info!(
            "🕰️ {} cutoff times loaded. Open files are uploaded within {} minutes of cutoff",
            schedule.len(),
            schedule.forced_upload_delta().num_minutes()
        );
    }
    tokio::spawn(async move {
        info!("🕰️ File transfer worker started");
        controller.run().await;
        info!("🕰️ File transfer worker exited");
    })
}
