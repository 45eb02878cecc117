#![allow(dead_code)]
use std::{path::Path, sync::Arc};

use ach_gateway_engine::{
    ach::{render_file, File},
    file_transfer::{
        ControllerConfig,
        CountingMetrics,
        CutoffTime,
        FileTransferConfig,
        FileTransferController,
        LocalConfig,
        TransferProtocol,
        RETAINED_RETURNS_DIR,
    },
    ledger::{LedgerClient, LedgerError},
    test_utils::{fixtures::ODFI_ROUTING, prepare_env::new_test_database},
    traits::{AchFileStorage, FileTransferConfigs},
    SqliteDatabase,
};
use chrono::{Timelike, Utc};
use mockall::mock;
use tempfile::TempDir;

mock! {
    pub Ledger {}
    impl LedgerClient for Ledger {
        async fn reverse_transaction(&self, transaction_id: &str, user_id: &str, request_id: &str) -> Result<(), LedgerError>;
    }
}

/// A store, a storage root for the gateway and a directory standing in for the ODFI's server.
pub struct TestGateway {
    pub db: SqliteDatabase,
    db_dir: TempDir,
    pub storage: TempDir,
    pub remote: TempDir,
    pub metrics: Arc<CountingMetrics>,
}

impl TestGateway {
    /// Sets up a gateway with a local file transfer config for [`ODFI_ROUTING`]. The cutoff is always between 12 and
    /// 24 hours away, and the forced upload window is 24 hours wide, so the open file is always uploaded.
    pub async fn new() -> Self {
        let (db, db_dir) = new_test_database().await;
        let storage = tempfile::tempdir().expect("Could not create storage dir");
        let remote = tempfile::tempdir().expect("Could not create remote dir");
        let config = FileTransferConfig::new(
            ODFI_ROUTING,
            TransferProtocol::Local(LocalConfig { root: remote.path().to_path_buf() }),
        );
        db.upsert_file_transfer_config(&config).await.expect("Could not save file transfer config");
        db.upsert_cutoff_time(&upcoming_cutoff()).await.expect("Could not save cutoff time");
        Self { db, db_dir, storage, remote, metrics: Arc::new(CountingMetrics::new()) }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            root_dir: self.storage.path().to_path_buf(),
            max_lines: 100,
            forced_upload_delta: chrono::Duration::hours(24),
            ..Default::default()
        }
    }

    pub async fn controller(&self, ledger: Option<MockLedger>) -> FileTransferController<SqliteDatabase, MockLedger> {
        self.controller_with(self.controller_config(), ledger).await
    }

    pub async fn controller_with(
        &self,
        config: ControllerConfig,
        ledger: Option<MockLedger>,
    ) -> FileTransferController<SqliteDatabase, MockLedger> {
        let (controller, _handle) =
            FileTransferController::new_with_metrics(self.db.clone(), ledger, config, self.metrics.clone())
                .await
                .expect("Could not create controller");
        controller
    }

    pub async fn store_file(&self, file_id: &str, file: &File) {
        self.db.save_ach_file(file_id, &render_file(file)).await.expect("Could not store ACH file");
    }

    pub fn remote_dir(&self, dir: &str) -> std::path::PathBuf {
        self.remote.path().join(dir)
    }

    pub fn merged_dir(&self) -> std::path::PathBuf {
        self.storage.path().join("merged")
    }

    pub fn retained_returns_dir(&self) -> std::path::PathBuf {
        self.storage.path().join(RETAINED_RETURNS_DIR)
    }
}

/// A 23:59 cutoff for [`ODFI_ROUTING`] in a zone where it is currently before noon.
fn upcoming_cutoff() -> CutoffTime {
    let zone = if Utc::now().hour() < 12 { "UTC" } else { "Etc/GMT+12" };
    CutoffTime::new(ODFI_ROUTING, 2359, zone).expect("Invalid cutoff")
}

pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.file_name().to_string_lossy().to_string()).collect())
        .unwrap_or_else(|_| Vec::new());
    names.sort();
    names
}
