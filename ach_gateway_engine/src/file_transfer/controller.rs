//! # File transfer controller
//!
//! The controller drives the settlement file lifecycle. Each cycle it
//! 1. downloads inbound and return files from every configured ODFI, logs notifications of change and reconciles
//!    returned entries (retrying any kept back from earlier cycles), and
//! 2. merges the next page of pending transfers and micro-deposits into settlement files, and uploads every file that
//!    is full, left over from an earlier day, or close to its routing number's cutoff.
//!
//! Cycles run on a timer, or on demand through a [`ControllerHandle`]. A flush request can ask for either half of
//! the cycle, or both, and may carry a reply channel that receives a [`CycleReport`] when the work is done.
//!
//! Only one controller may run against a store. Pending transfers are read through a cursor that lives as long as the
//! controller and nothing marks rows as claimed, so two controllers would merge the same transfers.
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, NaiveDate, Utc};
use log::*;
use serde::Serialize;
use tokio::{
    fs,
    sync::{mpsc, oneshot, watch},
    time::MissedTickBehavior,
};

use crate::{
    ach::{parse_file, File},
    db_types::{GroupableTransfer, PageCursor},
    file_transfer::{
        agent::{remote_path, FileTransferAgent, RemoteFile, TransferAgent},
        config::FileTransferConfig,
        cutoffs::{CutoffSchedule, DEFAULT_FORCED_UPLOAD_DELTA},
        errors::FileTransferError,
        inbound::log_notifications_of_change,
        merge::MergeEngine,
        mergeable::{mark_uploaded, scan_merged_dir, MergedFilename, DEFAULT_MAX_LINES},
        metrics::{LogMetrics, Metric, MetricsReporter},
        returns::{ReturnReconciler, ReturnSummary},
    },
    ledger::LedgerClient,
    traits::GatewayDatabase,
};

pub const DEFAULT_FILE_TRANSFER_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_TRANSFER_BATCH_SIZE: u32 = 100;
pub const DEFAULT_TEMP_DOWNLOAD_DIR: &str = "download";
/// Return files with entries that failed for reasons that may clear up are kept in `<root_dir>/retained-returns` and
/// processed again every cycle until they stop failing.
pub const RETAINED_RETURNS_DIR: &str = "retained-returns";
/// The metrics label for micro-deposits whose stored file can't be read, so the origin routing number is unknown.
const UNRESOLVED_ROUTING_NUMBER: &str = "unresolved";
const INBOUND_DIR: &str = "inbound";
const RETURNED_DIR: &str = "returned";

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Merged files are kept under `<root_dir>/merged`, downloads under `<root_dir>/<temp_download_dir>`.
    pub root_dir: PathBuf,
    pub interval: Duration,
    pub max_lines: usize,
    pub batch_size: u32,
    pub temp_download_dir: String,
    pub forced_upload_delta: chrono::Duration,
    /// Remove files from the remote server once they have been saved locally.
    pub delete_remote_files: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./storage"),
            interval: DEFAULT_FILE_TRANSFER_INTERVAL,
            max_lines: DEFAULT_MAX_LINES,
            batch_size: DEFAULT_TRANSFER_BATCH_SIZE,
            temp_download_dir: DEFAULT_TEMP_DOWNLOAD_DIR.to_string(),
            forced_upload_delta: DEFAULT_FORCED_UPLOAD_DELTA,
            delete_remote_files: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// Download and process inbound and return files only.
    Incoming,
    /// Merge and upload only.
    Outgoing,
    All,
}

impl FlushKind {
    fn incoming(&self) -> bool {
        matches!(self, FlushKind::Incoming | FlushKind::All)
    }

    fn outgoing(&self) -> bool {
        matches!(self, FlushKind::Outgoing | FlushKind::All)
    }
}

#[derive(Debug)]
pub struct FlushRequest {
    pub kind: FlushKind,
    pub reply: Option<oneshot::Sender<CycleReport>>,
}

/// What a single cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub files_downloaded: usize,
    pub change_notifications: usize,
    pub returns_reconciled: usize,
    pub returns_failed: usize,
    pub transfers_merged: usize,
    pub micro_deposits_merged: usize,
    pub files_uploaded: Vec<String>,
    pub errors: usize,
}

/// Controls a running [`FileTransferController`]. Handles are cheap to clone. Once every handle has been dropped the
/// controller stops.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    flush_tx: mpsc::Sender<FlushRequest>,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl ControllerHandle {
    /// Requests a cycle and waits for it to finish.
    pub async fn flush(&self, kind: FlushKind) -> Result<CycleReport, FileTransferError> {
        let (tx, rx) = oneshot::channel();
        self.flush_tx
            .send(FlushRequest { kind, reply: Some(tx) })
            .await
            .map_err(|_| FileTransferError::ControllerStopped)?;
        rx.await.map_err(|_| FileTransferError::ControllerStopped)
    }

    /// Requests a cycle without waiting for it.
    pub async fn trigger(&self, kind: FlushKind) -> Result<(), FileTransferError> {
        self.flush_tx.send(FlushRequest { kind, reply: None }).await.map_err(|_| FileTransferError::ControllerStopped)
    }

    /// Stops the controller. A cycle that is already running completes first.
    pub fn shutdown(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn is_running(&self) -> bool {
        !self.flush_tx.is_closed()
    }
}

#[derive(Debug, Default)]
struct Cursors {
    transfers: PageCursor,
    micro_deposits: PageCursor,
}

/// Everything a cycle needs, apart from the cursors.
struct CycleContext<B, L> {
    db: B,
    reconciler: ReturnReconciler<B, L>,
    merge: MergeEngine,
    schedule: CutoffSchedule,
    config: ControllerConfig,
    metrics: Arc<dyn MetricsReporter>,
}

pub struct FileTransferController<B, L> {
    ctx: CycleContext<B, L>,
    cursors: Cursors,
    flush_rx: mpsc::Receiver<FlushRequest>,
    cancel_rx: watch::Receiver<bool>,
}

impl<B, L> FileTransferController<B, L>
where
    B: GatewayDatabase,
    L: LedgerClient,
{
    /// Creates a controller, loading the cutoff schedule from the store.
    pub async fn new(
        db: B,
        ledger: Option<L>,
        config: ControllerConfig,
    ) -> Result<(Self, ControllerHandle), FileTransferError> {
        Self::new_with_metrics(db, ledger, config, Arc::new(LogMetrics)).await
    }

    pub async fn new_with_metrics(
        db: B,
        ledger: Option<L>,
        config: ControllerConfig,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Result<(Self, ControllerHandle), FileTransferError> {
        let cutoffs = db.fetch_cutoff_times().await?;
        info!("🚚️ Loaded {} cutoff times", cutoffs.len());
        let schedule = CutoffSchedule::new(cutoffs, config.forced_upload_delta);
        let reconciler = ReturnReconciler::new(db.clone(), ledger);
        if !reconciler.has_ledger() {
            info!("🚚️ No accounts service is configured. Returned transfers will not be reversed in the ledger.");
        }
        let merge = MergeEngine::new(&config.root_dir, config.max_lines);
        let (flush_tx, flush_rx) = mpsc::channel(8);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = ControllerHandle { flush_tx, cancel_tx: Arc::new(cancel_tx) };
        let ctx = CycleContext { db, reconciler, merge, schedule, config, metrics };
        Ok((Self { ctx, cursors: Cursors::default(), flush_rx, cancel_rx }, handle))
    }

    pub fn schedule(&self) -> &CutoffSchedule {
        &self.ctx.schedule
    }

    /// Runs until cancelled. Cancellation takes priority over flush requests, which take priority over the timer.
    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.ctx.config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        timer.tick().await;
        info!("🚚️ File transfer controller started. Running every {}s", self.ctx.config.interval.as_secs());
        loop {
            tokio::select! {
                biased;
                changed = self.cancel_rx.changed() => {
                    if changed.is_err() || *self.cancel_rx.borrow() {
                        break;
                    }
                },
                Some(request) = self.flush_rx.recv() => {
                    debug!("🚚️ Flush requested: {:?}", request.kind);
                    let report = self.run_cycle(request.kind).await;
                    if let Some(reply) = request.reply {
                        let _ = reply.send(report);
                    }
                },
                _ = timer.tick() => {
                    debug!("🚚️ Timer fired");
                    self.run_cycle(FlushKind::All).await;
                },
            }
        }
        info!("🚚️ File transfer controller stopped");
    }

    /// Runs one cycle. When both halves are requested, downloads and merges run concurrently.
    pub async fn run_cycle(&mut self, kind: FlushKind) -> CycleReport {
        let ctx = &self.ctx;
        let cursors = &mut self.cursors;
        let incoming = async {
            if kind.incoming() {
                ctx.download_and_process().await
            } else {
                CycleReport::default()
            }
        };
        let outgoing = async {
            if kind.outgoing() {
                ctx.merge_and_upload(cursors).await
            } else {
                CycleReport::default()
            }
        };
        let (incoming, outgoing) = tokio::join!(incoming, outgoing);
        let report = CycleReport {
            files_downloaded: incoming.files_downloaded,
            change_notifications: incoming.change_notifications,
            returns_reconciled: incoming.returns_reconciled,
            returns_failed: incoming.returns_failed,
            transfers_merged: outgoing.transfers_merged,
            micro_deposits_merged: outgoing.micro_deposits_merged,
            files_uploaded: outgoing.files_uploaded,
            errors: incoming.errors + outgoing.errors,
        };
        info!(
            "🚚️ Cycle complete. {} files downloaded, {} returns reconciled, {} transfers merged, {} files uploaded, {} \
             errors",
            report.files_downloaded,
            report.returns_reconciled,
            report.transfers_merged,
            report.files_uploaded.len(),
            report.errors
        );
        report
    }
}

impl<B, L> CycleContext<B, L>
where
    B: GatewayDatabase,
    L: LedgerClient,
{
    async fn configs(&self) -> Result<HashMap<String, FileTransferConfig>, FileTransferError> {
        let configs = self.db.fetch_file_transfer_configs().await?;
        Ok(configs.into_iter().map(|c| (c.routing_number.clone(), c)).collect())
    }

    //--------------------------------------    Download    ---------------------------------------------------------

    async fn download_and_process(&self) -> CycleReport {
        let mut report = CycleReport::default();
        self.process_returns(&self.retained_returns_dir(), &mut report).await;
        let configs = match self.configs().await {
            Ok(c) => c,
            Err(e) => {
                error!("📥️ Could not load file transfer configs. {e}");
                report.errors += 1;
                return report;
            },
        };
        let mut routing_numbers = configs.keys().collect::<Vec<_>>();
        routing_numbers.sort();
        for routing_number in routing_numbers {
            let config = &configs[routing_number];
            let dir = self.config.root_dir.join(&self.config.temp_download_dir);
            if let Err(e) = self.download_files(config, &dir, &mut report).await {
                error!("📥️ Could not download files for {routing_number}. {e}");
                self.metrics.increment(Metric::DownloadFailure, routing_number);
                report.errors += 1;
            }
            // Remote copies of whatever was saved may already be gone, so it is processed even if the download
            // stopped early
            self.process_downloads(&dir, &mut report).await;
            if let Err(e) = fs::remove_dir_all(&dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("📥️ Could not remove download directory {}. {e}", dir.display());
                }
            }
        }
        report
    }

    /// Saves every inbound and return file to `<dir>/{inbound,returned}`, deleting each remote file once its local
    /// copy has been written.
    async fn download_files(
        &self,
        config: &FileTransferConfig,
        dir: &Path,
        report: &mut CycleReport,
    ) -> Result<(), FileTransferError> {
        let mut agent = TransferAgent::connect(config).await?;
        let result = async {
            let inbound = agent.get_inbound_files().await?;
            let inbound_path = agent.inbound_path().to_string();
            self.save_files(&mut agent, inbound, &inbound_path, &dir.join(INBOUND_DIR), config, &mut *report).await?;
            let returned = agent.get_return_files().await?;
            let return_path = agent.return_path().to_string();
            self.save_files(&mut agent, returned, &return_path, &dir.join(RETURNED_DIR), config, &mut *report).await
        }
        .await;
        if let Err(e) = agent.close().await {
            warn!("📥️ Could not close connection for {}. {e}", config.routing_number);
        }
        result
    }

    async fn save_files(
        &self,
        agent: &mut TransferAgent,
        files: Vec<RemoteFile>,
        remote_dir: &str,
        local_dir: &Path,
        config: &FileTransferConfig,
        report: &mut CycleReport,
    ) -> Result<(), FileTransferError> {
        fs::create_dir_all(local_dir).await?;
        for file in files {
            let local = local_dir.join(&file.filename);
            fs::write(&local, &file.contents).await?;
            debug!("📥️ Downloaded {} from {}", file.filename, config.routing_number);
            report.files_downloaded += 1;
            self.metrics.increment(Metric::FileDownloaded, &config.routing_number);
            if self.config.delete_remote_files {
                if let Err(e) = agent.delete(&remote_path(remote_dir, &file.filename)).await {
                    error!("📥️ Could not delete {} from {}. {e}", file.filename, config.routing_number);
                    report.errors += 1;
                }
            }
        }
        Ok(())
    }

    async fn process_downloads(&self, dir: &Path, report: &mut CycleReport) {
        for (filename, file) in read_ach_files(&dir.join(INBOUND_DIR), report).await {
            report.change_notifications += log_notifications_of_change(&filename, &file);
        }
        self.process_returns(&dir.join(RETURNED_DIR), report).await;
    }

    fn retained_returns_dir(&self) -> PathBuf {
        self.config.root_dir.join(RETAINED_RETURNS_DIR)
    }

    /// Reconciles every return file in `dir`. Files with retryable failures are moved to the retained returns
    /// directory, and retained files are removed once nothing in them needs retrying.
    async fn process_returns(&self, dir: &Path, report: &mut CycleReport) {
        let retained_dir = self.retained_returns_dir();
        let is_retained = dir == retained_dir.as_path();
        let mut summary = ReturnSummary::default();
        for (filename, file) in read_ach_files(dir, report).await {
            let origin = file.origin_routing_number().to_string();
            let result = self.reconciler.process_file(&file).await;
            info!(
                "↩️ {filename}: {} entries reconciled, {} failed ({} retryable), {} already reclaimed",
                result.reconciled, result.failed, result.retryable, result.skipped
            );
            for _ in 0..result.reconciled {
                self.metrics.increment(Metric::ReturnReconciled, &origin);
            }
            for _ in 0..result.failed {
                self.metrics.increment(Metric::ReturnFailure, &origin);
            }
            let path = dir.join(&filename);
            match (result.retryable > 0, is_retained) {
                (true, true) => debug!("↩️ Keeping {filename} for another attempt"),
                (true, false) => {
                    let target = retained_dir.join(format!("{origin}-{filename}"));
                    if let Err(e) = retain_file(&path, &target).await {
                        error!(
                            "↩️ Could not keep {filename} for another attempt. {} returned entries will not be retried. \
                             {e}",
                            result.retryable
                        );
                        report.errors += 1;
                    }
                },
                (false, true) => {
                    if let Err(e) = fs::remove_file(&path).await {
                        warn!("↩️ Could not remove retained return file {filename}. {e}");
                    }
                },
                (false, false) => {},
            }
            summary.add(result);
        }
        report.returns_reconciled += summary.reconciled;
        report.returns_failed += summary.failed;
    }

    //--------------------------------------  Merge & upload  -------------------------------------------------------

    async fn merge_and_upload(&self, cursors: &mut Cursors) -> CycleReport {
        let mut report = CycleReport::default();
        let configs = match self.configs().await {
            Ok(c) => c,
            Err(e) => {
                error!("🗃️ Could not load file transfer configs. {e}");
                report.errors += 1;
                return report;
            },
        };
        let today = Utc::now().date_naive();
        self.merge_transfers(&configs, &mut cursors.transfers, today, &mut report).await;
        self.merge_micro_deposits(&configs, &mut cursors.micro_deposits, today, &mut report).await;
        self.upload_files(&configs, Utc::now(), &mut report).await;
        report
    }

    async fn merge_transfers(
        &self,
        configs: &HashMap<String, FileTransferConfig>,
        cursor: &mut PageCursor,
        today: NaiveDate,
        report: &mut CycleReport,
    ) {
        let transfers = match self.db.fetch_pending_transfers(cursor, self.config.batch_size).await {
            Ok(t) => t,
            Err(e) => {
                error!("🗃️ Could not fetch pending transfers. {e}");
                report.errors += 1;
                return;
            },
        };
        let mut groups: BTreeMap<String, Vec<GroupableTransfer>> = BTreeMap::new();
        for transfer in transfers {
            cursor.advance(transfer.created_at, &transfer.transfer_id);
            groups.entry(transfer.origin_routing_number.clone()).or_default().push(transfer);
        }
        for (routing_number, transfers) in groups {
            if !configs.contains_key(&routing_number) {
                warn!("🗃️ No file transfer config for {routing_number}. Skipping {} transfers", transfers.len());
                self.metrics.increment(Metric::MissingConfig, &routing_number);
                continue;
            }
            for transfer in transfers {
                let filename = match self.merge_stored_file(&transfer.file_id, &routing_number, today).await {
                    Ok(f) => f,
                    Err(e) => {
                        error!("🗃️ Could not merge file {} for transfer {}. {e}", transfer.file_id, transfer.transfer_id);
                        self.metrics.increment(Metric::MergeFailure, &routing_number);
                        report.errors += 1;
                        continue;
                    },
                };
                report.transfers_merged += 1;
                if let Err(e) = self.db.mark_transfer_as_merged(&transfer.transfer_id, &filename).await {
                    error!(
                        "🗃️ Transfer {} was merged into {filename} but could not be marked as merged. It may be merged \
                         again after a restart. {e}",
                        transfer.transfer_id
                    );
                    self.metrics.increment(Metric::BookkeepingFailure, &routing_number);
                    report.errors += 1;
                }
            }
        }
    }

    async fn merge_micro_deposits(
        &self,
        configs: &HashMap<String, FileTransferConfig>,
        cursor: &mut PageCursor,
        today: NaiveDate,
        report: &mut CycleReport,
    ) {
        let deposits = match self.db.fetch_pending_micro_deposits(cursor, self.config.batch_size).await {
            Ok(d) => d,
            Err(e) => {
                error!("🗃️ Could not fetch pending micro-deposits. {e}");
                report.errors += 1;
                return;
            },
        };
        for deposit in deposits {
            cursor.advance(deposit.created_at, &deposit.file_id);
            let file = match self.load_stored_file(&deposit.file_id).await {
                Ok(f) => f,
                Err(e) => {
                    error!("🗃️ Could not load micro-deposits {} for depository {}. {e}", deposit.file_id, deposit.depository_id);
                    self.metrics.increment(Metric::MergeFailure, UNRESOLVED_ROUTING_NUMBER);
                    report.errors += 1;
                    continue;
                },
            };
            let routing_number = file.origin_routing_number().to_string();
            if !configs.contains_key(&routing_number) {
                warn!("🗃️ No file transfer config for {routing_number}. Skipping micro-deposits {}", deposit.file_id);
                self.metrics.increment(Metric::MissingConfig, &routing_number);
                continue;
            }
            let filename = match self.merge.merge(&file, today).await {
                Ok(outcome) => outcome.merged_filename,
                Err(e) => {
                    error!("🗃️ Could not merge micro-deposits {} for depository {}. {e}", deposit.file_id, deposit.depository_id);
                    self.metrics.increment(Metric::MergeFailure, &routing_number);
                    report.errors += 1;
                    continue;
                },
            };
            report.micro_deposits_merged += 1;
            if let Err(e) = self.db.mark_micro_deposit_as_merged(&deposit.file_id, &filename).await {
                error!(
                    "🗃️ Micro-deposits in {} were merged into {filename} but could not be marked as merged. {e}",
                    deposit.file_id
                );
                self.metrics.increment(Metric::BookkeepingFailure, &routing_number);
                report.errors += 1;
            }
        }
    }

    async fn load_stored_file(&self, file_id: &str) -> Result<File, FileTransferError> {
        let contents = self
            .db
            .fetch_ach_file(file_id)
            .await?
            .ok_or_else(|| FileTransferError::FileNotFound(file_id.to_string()))?;
        Ok(parse_file(&contents)?)
    }

    /// Merges the stored file and returns the name of the settlement file its last batch ended up in.
    async fn merge_stored_file(
        &self,
        file_id: &str,
        routing_number: &str,
        today: NaiveDate,
    ) -> Result<String, FileTransferError> {
        let file = self.load_stored_file(file_id).await?;
        if file.origin_routing_number() != routing_number {
            warn!(
                "🗃️ File {file_id} originates from {} but its transfer names {routing_number}",
                file.origin_routing_number()
            );
        }
        let outcome = self.merge.merge(&file, today).await?;
        if !outcome.ready.is_empty() {
            debug!("🗃️ {} merged files are ready to upload", outcome.ready.len());
        }
        Ok(outcome.merged_filename)
    }

    /// Picks the merged files that should be uploaded now: every file that has a successor or is from an earlier
    /// day, plus today's open file if its routing number is near cutoff.
    async fn files_to_upload(&self, now: DateTime<Utc>) -> Result<Vec<(MergedFilename, PathBuf)>, FileTransferError> {
        let files = scan_merged_dir(self.merge.merged_dir()).await?;
        let today = now.date_naive();
        let mut latest: HashMap<String, u32> = HashMap::new();
        for (name, _) in files.iter().filter(|(n, _)| n.date == today) {
            let seq = latest.entry(name.routing_number.clone()).or_insert(name.sequence);
            *seq = (*seq).max(name.sequence);
        }
        let uploads = files
            .into_iter()
            .filter(|(name, _)| {
                let is_open = name.date == today && latest.get(&name.routing_number) == Some(&name.sequence);
                !is_open || self.schedule.is_near_cutoff(&name.routing_number, now)
            })
            .collect();
        Ok(uploads)
    }

    async fn upload_files(&self, configs: &HashMap<String, FileTransferConfig>, now: DateTime<Utc>, report: &mut CycleReport) {
        let files = match self.files_to_upload(now).await {
            Ok(f) => f,
            Err(e) => {
                error!("📤️ Could not scan merged files. {e}");
                report.errors += 1;
                return;
            },
        };
        let mut by_routing: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for (name, path) in files {
            by_routing.entry(name.routing_number).or_default().push(path);
        }
        for (routing_number, paths) in by_routing {
            let Some(config) = configs.get(&routing_number) else {
                warn!("📤️ No file transfer config for {routing_number}. {} files are waiting to upload", paths.len());
                self.metrics.increment(Metric::MissingConfig, &routing_number);
                continue;
            };
            let mut agent = match TransferAgent::connect(config).await {
                Ok(a) => a,
                Err(e) => {
                    error!("📤️ Could not connect to upload {} files for {routing_number}. {e}", paths.len());
                    self.metrics.increment(Metric::UploadFailure, &routing_number);
                    report.errors += 1;
                    continue;
                },
            };
            for path in paths {
                match upload_file(&mut agent, &path).await {
                    Ok(filename) => {
                        info!("📤️ Uploaded {filename} for {routing_number}");
                        self.metrics.increment(Metric::FileUploaded, &routing_number);
                        report.files_uploaded.push(filename);
                    },
                    Err(e) => {
                        error!("📤️ Upload of {} failed. {e}", path.display());
                        self.metrics.increment(Metric::UploadFailure, &routing_number);
                        report.errors += 1;
                    },
                }
            }
            if let Err(e) = agent.close().await {
                warn!("📤️ Could not close connection for {routing_number}. {e}");
            }
        }
    }
}

/// Uploads the file and renames the local copy with the `.uploaded` suffix.
async fn upload_file(agent: &mut TransferAgent, path: &Path) -> Result<String, FileTransferError> {
    let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let contents = fs::read(path).await?;
    agent.upload_file(RemoteFile::new(filename.clone(), contents)).await?;
    mark_uploaded(path).await.map_err(|e| {
        error!("📤️ {filename} was uploaded but could not be renamed. It will be uploaded again. {e}");
        e
    })?;
    Ok(filename)
}

/// Reads and parses every file in `dir`. Files that cannot be read or parsed are logged and skipped.
async fn retain_file(path: &Path, target: &Path) -> Result<(), std::io::Error> {
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir).await?;
    }
    fs::rename(path, target).await
}

async fn read_ach_files(dir: &Path, report: &mut CycleReport) -> Vec<(String, File)> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return vec![],
        Err(e) => {
            warn!("📥️ Could not read {}. {e}", dir.display());
            report.errors += 1;
            return vec![];
        },
    };
    let mut paths = vec![];
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => paths.push(entry.path()),
            Ok(None) => break,
            Err(e) => {
                warn!("📥️ Could not list {}. {e}", dir.display());
                report.errors += 1;
                break;
            },
        }
    }
    paths.sort();
    let mut files = vec![];
    for path in paths {
        let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let parsed = match fs::read_to_string(&path).await {
            Ok(contents) => parse_file(&contents).map_err(FileTransferError::from),
            Err(e) => Err(e.into()),
        };
        match parsed {
            Ok(file) => files.push((filename, file)),
            Err(e) => {
                warn!("📥️ Skipping {filename}. {e}");
                report.errors += 1;
            },
        }
    }
    files
}
