use std::{fmt::Display, path::PathBuf};

use agw_common::Secret;

/// Connection details for an FTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpConfig {
    /// host:port
    pub hostname: String,
    pub username: String,
    pub password: Secret<String>,
}

/// Connection details for an SFTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpConfig {
    /// host:port
    pub hostname: String,
    pub username: String,
    pub password: Secret<String>,
    /// Hex-encoded SHA-256 fingerprint of the server's host key. When set, connections to servers presenting any
    /// other key are refused.
    pub host_key_fingerprint: Option<String>,
}

/// A directory on the local filesystem standing in for a remote server. Used in development and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferProtocol {
    Ftp(FtpConfig),
    Sftp(SftpConfig),
    Local(LocalConfig),
}

impl Display for TransferProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ftp(c) => write!(f, "ftp://{}@{}", c.username, c.hostname),
            Self::Sftp(c) => write!(f, "sftp://{}@{}", c.username, c.hostname),
            Self::Local(c) => write!(f, "file://{}", c.root.display()),
        }
    }
}

/// How, and where, files for one routing number are exchanged with its ODFI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferConfig {
    pub routing_number: String,
    pub inbound_path: String,
    pub outbound_path: String,
    pub return_path: String,
    pub protocol: TransferProtocol,
}

impl FileTransferConfig {
    pub fn new(routing_number: &str, protocol: TransferProtocol) -> Self {
        Self {
            routing_number: routing_number.to_string(),
            inbound_path: "inbound".to_string(),
            outbound_path: "outbound".to_string(),
            return_path: "returned".to_string(),
            protocol,
        }
    }

    pub fn with_paths(mut self, inbound: &str, outbound: &str, returned: &str) -> Self {
        self.inbound_path = inbound.to_string();
        self.outbound_path = outbound.to_string();
        self.return_path = returned.to_string();
        self
    }
}
