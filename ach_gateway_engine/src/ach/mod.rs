//! # NACHA file model
//!
//! A minimal, immutable model of an ACH file: a [`FileHeader`], one or more [`Batch`]es (each holding
//! [`EntryDetail`] records and their [`Addenda`]) and the control records, which are never stored. Batch and file
//! control records are always derived from the contents when a file is rendered, and checked against the contents
//! when a file is parsed.
//!
//! Only the record types that the gateway manipulates are supported: file header/control, batch header/control,
//! entry detail and addenda types 05 (payment related), 98 (notification of change) and 99 (return).
//!
//! Files are rendered as 94-character fixed-width records, padded with `9` filler records to a multiple of ten
//! lines. The *line count* of a file is the number of records excluding filler, see [`count_records`].
mod reader;
mod records;
mod writer;

use thiserror::Error;

pub use reader::parse_file;
pub use records::{
    Addenda,
    Addenda05,
    Addenda98,
    Addenda99,
    Batch,
    BatchControl,
    BatchHeader,
    EntryDetail,
    File,
    FileControl,
    FileHeader,
};
pub use writer::{count_records, render_file};

/// The fixed length of every record in a NACHA file.
pub const RECORD_LENGTH: usize = 94;
/// The number of records per block.
pub const BLOCKING_FACTOR: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AchError {
    #[error("Line {line}: {reason}")]
    ParseError { line: usize, reason: String },
    #[error("The file does not contain a file header record")]
    MissingFileHeader,
    #[error("The file ended before its file control record")]
    MissingFileControl,
    #[error("Invalid date value: {0}")]
    InvalidDate(String),
    #[error("Invalid field value. {0}")]
    InvalidField(String),
}

impl AchError {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::ParseError { line, reason: reason.into() }
    }
}
