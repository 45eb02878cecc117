use std::io::Cursor;

use log::*;
use suppaftp::{types::FileType, FtpError, FtpStream};

use super::{base_name, remote_path, AgentError, FileTransferAgent, RemoteFile};
use crate::file_transfer::config::{FileTransferConfig, FtpConfig};

impl From<FtpError> for AgentError {
    fn from(e: FtpError) -> Self {
        AgentError::ProtocolError(e.to_string())
    }
}

/// An FTP backend. `suppaftp`'s synchronous client is driven from tokio's blocking pool; the stream is moved into
/// each blocking call and handed back when it completes.
pub struct FtpTransferAgent {
    hostname: String,
    client: Option<FtpStream>,
    inbound_path: String,
    outbound_path: String,
    return_path: String,
}

impl FtpTransferAgent {
    pub async fn connect(config: &FileTransferConfig, ftp: &FtpConfig) -> Result<Self, AgentError> {
        let hostname = ftp.hostname.clone();
        let username = ftp.username.clone();
        let password = ftp.password.reveal().clone();
        let host = hostname.clone();
        let client = tokio::task::spawn_blocking(move || -> Result<FtpStream, FtpError> {
            let mut stream = FtpStream::connect(host.as_str())?;
            stream.login(username.as_str(), password.as_str())?;
            stream.transfer_type(FileType::Binary)?;
            Ok(stream)
        })
        .await
        .map_err(|e| AgentError::ConnectionError(hostname.clone(), e.to_string()))?
        .map_err(|e| AgentError::ConnectionError(hostname.clone(), e.to_string()))?;
        info!("📡️ Connected to FTP server {hostname}");
        Ok(Self {
            hostname,
            client: Some(client),
            inbound_path: config.inbound_path.clone(),
            outbound_path: config.outbound_path.clone(),
            return_path: config.return_path.clone(),
        })
    }

    async fn with_client<T, F>(&mut self, f: F) -> Result<T, AgentError>
    where
        F: FnOnce(&mut FtpStream) -> Result<T, FtpError> + Send + 'static,
        T: Send + 'static,
    {
        let mut client = self.client.take().ok_or(AgentError::Closed)?;
        let (client, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut client);
            (client, result)
        })
        .await
        .map_err(|e| AgentError::ProtocolError(format!("FTP task for {} failed. {e}", self.hostname)))?;
        self.client = Some(client);
        result.map_err(AgentError::from)
    }

    async fn fetch_dir(&mut self, dir: String) -> Result<Vec<RemoteFile>, AgentError> {
        let files = self
            .with_client(move |ftp| {
                let names = ftp.nlst(Some(dir.as_str()))?;
                let mut files = Vec::with_capacity(names.len());
                for name in names {
                    let filename = base_name(&name).to_string();
                    if filename.is_empty() || filename == "." || filename == ".." {
                        continue;
                    }
                    let buffer = ftp.retr_as_buffer(&remote_path(&dir, &filename))?;
                    files.push(RemoteFile::new(filename, buffer.into_inner()));
                }
                Ok(files)
            })
            .await?;
        trace!("📡️ Fetched {} files from {}", files.len(), self.hostname);
        Ok(files)
    }
}

impl FileTransferAgent for FtpTransferAgent {
    async fn get_inbound_files(&mut self) -> Result<Vec<RemoteFile>, AgentError> {
        self.fetch_dir(self.inbound_path.clone()).await
    }

    async fn get_return_files(&mut self) -> Result<Vec<RemoteFile>, AgentError> {
        self.fetch_dir(self.return_path.clone()).await
    }

    async fn upload_file(&mut self, file: RemoteFile) -> Result<(), AgentError> {
        let dest = remote_path(&self.outbound_path, base_name(&file.filename));
        let bytes = self
            .with_client(move |ftp| {
                let mut reader = Cursor::new(file.contents);
                ftp.put_file(dest.as_str(), &mut reader)
            })
            .await?;
        debug!("📡️ Uploaded {bytes} bytes to {}", self.hostname);
        Ok(())
    }

    async fn delete(&mut self, path: &str) -> Result<(), AgentError> {
        let path = path.to_string();
        self.with_client(move |ftp| ftp.rm(path.as_str())).await
    }

    fn inbound_path(&self) -> &str {
        &self.inbound_path
    }

    fn return_path(&self) -> &str {
        &self.return_path
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        if self.client.is_none() {
            return Ok(());
        }
        self.with_client(|ftp| ftp.quit()).await?;
        self.client = None;
        debug!("📡️ Closed FTP connection to {}", self.hostname);
        Ok(())
    }
}
