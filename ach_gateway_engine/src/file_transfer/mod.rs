//! # File transfer
//!
//! Everything between the gateway's store and its ODFIs: per routing number transfer configs and cutoff times, the
//! agents that move files, the merge engine that builds settlement files, reconciliation of returned entries and the
//! [`FileTransferController`] that ties it all together on a timer.
pub mod agent;
mod config;
mod controller;
mod cutoffs;
mod errors;
mod inbound;
mod merge;
mod mergeable;
mod metrics;
mod returns;

pub use agent::{AgentError, FileTransferAgent, LocalTransferAgent, RemoteFile, TransferAgent};
pub use config::{FileTransferConfig, FtpConfig, LocalConfig, SftpConfig, TransferProtocol};
pub use controller::{
    ControllerConfig,
    ControllerHandle,
    CycleReport,
    FileTransferController,
    FlushKind,
    FlushRequest,
    DEFAULT_FILE_TRANSFER_INTERVAL,
    DEFAULT_TEMP_DOWNLOAD_DIR,
    DEFAULT_TRANSFER_BATCH_SIZE,
    RETAINED_RETURNS_DIR,
};
pub use cutoffs::{CutoffError, CutoffSchedule, CutoffTime, DEFAULT_FORCED_UPLOAD_DELTA};
pub use errors::{FileTransferError, MergeError};
pub use inbound::{log_notifications_of_change, notifications_of_change, ChangeNotification};
pub use merge::{MergeEngine, MergeOutcome, MergePlan};
pub use mergeable::{
    highest_sequence,
    mark_uploaded,
    scan_merged_dir,
    sequence_from_filename,
    sequence_to_string,
    MergeableFile,
    MergedFilename,
    StagedFile,
    DEFAULT_MAX_LINES,
    FIRST_SEQUENCE,
    MAX_SEQUENCE,
    MERGED_DIR,
    UPLOADED_SUFFIX,
};
pub use metrics::{CountingMetrics, LogMetrics, Metric, MetricsReporter};
pub use returns::{return_code_action, ReturnAction, ReturnEntry, ReturnError, ReturnReconciler, ReturnSummary};
