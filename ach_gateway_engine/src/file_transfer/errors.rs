use chrono::NaiveDate;
use thiserror::Error;

use crate::{ach::AchError, file_transfer::agent::AgentError, traits::GatewayDatabaseError};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("The incoming file contains no batches")]
    NoBatches,
    #[error("Rendering {0} produced no records")]
    EmptyFile(String),
    #[error("A batch of {lines} lines cannot fit in a file of at most {max} lines")]
    BatchTooLarge { lines: usize, max: usize },
    #[error("All file sequence tokens for routing number {routing_number} on {date} have been used")]
    SequenceExhausted { routing_number: String, date: NaiveDate },
    #[error("{0} is not a valid merged filename")]
    InvalidFilename(String),
    #[error("Could not parse merged file. {0}")]
    ParseError(#[from] AchError),
    #[error("I/O error while merging. {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum FileTransferError {
    #[error("No file transfer config exists for routing number {0}")]
    MissingConfig(String),
    #[error("No stored ACH file with id {0}")]
    FileNotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] GatewayDatabaseError),
    #[error("Transfer agent error. {0}")]
    AgentError(#[from] AgentError),
    #[error("Merge error. {0}")]
    MergeError(#[from] MergeError),
    #[error("Could not parse ACH file. {0}")]
    AchError(#[from] AchError),
    #[error("I/O error. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The file transfer controller is not running")]
    ControllerStopped,
}
