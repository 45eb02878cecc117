//! # File transfer agents
//!
//! A [`FileTransferAgent`] moves files between the gateway and an ODFI. The controller only ever sees this capability
//! set; which protocol sits behind it is decided per routing number by its [`FileTransferConfig`].
//!
//! [`TransferAgent`] is the tagged variant over the supported backends:
//! * FTP (feature `ftp`, enabled by default)
//! * SFTP (feature `sftp`)
//! * a local directory, for development and testing
mod local;

#[cfg(feature = "ftp")]
mod ftp;
#[cfg(feature = "sftp")]
mod sftp;

#[cfg(feature = "ftp")]
pub use ftp::FtpTransferAgent;
pub use local::LocalTransferAgent;
use log::*;
#[cfg(feature = "sftp")]
pub use sftp::SftpTransferAgent;
use thiserror::Error;

use crate::file_transfer::config::{FileTransferConfig, TransferProtocol};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Could not connect to {0}. {1}")]
    ConnectionError(String, String),
    #[error("I/O error during file transfer. {0}")]
    IOError(#[from] std::io::Error),
    #[error("File transfer protocol error. {0}")]
    ProtocolError(String),
    #[error("The {0} protocol is not supported by this build")]
    UnsupportedProtocol(String),
    #[error("The agent connection has already been closed")]
    Closed,
}

/// A file as it is exchanged with a remote server: its name (without any directory) and raw contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub filename: String,
    pub contents: Vec<u8>,
}

impl RemoteFile {
    pub fn new<S: Into<String>>(filename: S, contents: Vec<u8>) -> Self {
        Self { filename: filename.into(), contents }
    }
}

#[allow(async_fn_in_trait)]
pub trait FileTransferAgent {
    /// Fetches every file in the inbound directory.
    async fn get_inbound_files(&mut self) -> Result<Vec<RemoteFile>, AgentError>;

    /// Fetches every file in the return directory.
    async fn get_return_files(&mut self) -> Result<Vec<RemoteFile>, AgentError>;

    /// Writes the file into the outbound directory.
    async fn upload_file(&mut self, file: RemoteFile) -> Result<(), AgentError>;

    /// Deletes a remote file. `path` is relative to the server root, e.g. `inbound/20240301-ret.ach`.
    async fn delete(&mut self, path: &str) -> Result<(), AgentError>;

    fn inbound_path(&self) -> &str;

    fn return_path(&self) -> &str;

    async fn close(&mut self) -> Result<(), AgentError>;
}

pub enum TransferAgent {
    #[cfg(feature = "ftp")]
    Ftp(FtpTransferAgent),
    #[cfg(feature = "sftp")]
    Sftp(SftpTransferAgent),
    Local(LocalTransferAgent),
}

impl TransferAgent {
    /// Opens a connection using the protocol selected in the config.
    pub async fn connect(config: &FileTransferConfig) -> Result<Self, AgentError> {
        debug!("📡️ Connecting to {} for routing number {}", config.protocol, config.routing_number);
        match &config.protocol {
            #[cfg(feature = "ftp")]
            TransferProtocol::Ftp(ftp) => Ok(Self::Ftp(FtpTransferAgent::connect(config, ftp).await?)),
            #[cfg(not(feature = "ftp"))]
            TransferProtocol::Ftp(_) => Err(AgentError::UnsupportedProtocol("FTP".into())),
            #[cfg(feature = "sftp")]
            TransferProtocol::Sftp(sftp) => Ok(Self::Sftp(SftpTransferAgent::connect(config, sftp).await?)),
            #[cfg(not(feature = "sftp"))]
            TransferProtocol::Sftp(_) => Err(AgentError::UnsupportedProtocol("SFTP".into())),
            TransferProtocol::Local(local) => Ok(Self::Local(LocalTransferAgent::new(config, local).await?)),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $agent:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "ftp")]
            TransferAgent::Ftp($agent) => $call,
            #[cfg(feature = "sftp")]
            TransferAgent::Sftp($agent) => $call,
            TransferAgent::Local($agent) => $call,
        }
    };
}

impl FileTransferAgent for TransferAgent {
    async fn get_inbound_files(&mut self) -> Result<Vec<RemoteFile>, AgentError> {
        dispatch!(self, a => a.get_inbound_files().await)
    }

    async fn get_return_files(&mut self) -> Result<Vec<RemoteFile>, AgentError> {
        dispatch!(self, a => a.get_return_files().await)
    }

    async fn upload_file(&mut self, file: RemoteFile) -> Result<(), AgentError> {
        dispatch!(self, a => a.upload_file(file).await)
    }

    async fn delete(&mut self, path: &str) -> Result<(), AgentError> {
        dispatch!(self, a => a.delete(path).await)
    }

    fn inbound_path(&self) -> &str {
        dispatch!(self, a => a.inbound_path())
    }

    fn return_path(&self) -> &str {
        dispatch!(self, a => a.return_path())
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        dispatch!(self, a => a.close().await)
    }
}

/// Joins a remote directory and file name with `/`, whatever the local platform's separator.
pub(crate) fn remote_path(dir: &str, filename: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        filename.to_string()
    } else {
        format!("{dir}/{filename}")
    }
}

/// Directory listings from some servers include the directory prefix; strip it.
pub(crate) fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
