use std::{
    io::{Read, Write},
    net::TcpStream,
    path::Path,
};

use log::*;
use ssh2::{HashType, Session, Sftp};

use super::{base_name, remote_path, AgentError, FileTransferAgent, RemoteFile};
use crate::file_transfer::config::{FileTransferConfig, SftpConfig};

impl From<ssh2::Error> for AgentError {
    fn from(e: ssh2::Error) -> Self {
        AgentError::ProtocolError(e.to_string())
    }
}

struct SftpClient {
    session: Session,
    sftp: Sftp,
}

/// An SFTP backend built on `ssh2`, which is blocking. Like the FTP agent, the client is moved onto tokio's
/// blocking pool for every operation.
pub struct SftpTransferAgent {
    hostname: String,
    client: Option<SftpClient>,
    inbound_path: String,
    outbound_path: String,
    return_path: String,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn open_session(sftp: &SftpConfig) -> Result<SftpClient, AgentError> {
    let tcp = TcpStream::connect(sftp.hostname.as_str())?;
    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake()?;
    if let Some(expected) = &sftp.host_key_fingerprint {
        let actual = session.host_key_hash(HashType::Sha256).map(hex).unwrap_or_default();
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(AgentError::ConnectionError(
                sftp.hostname.clone(),
                format!("Host key fingerprint {actual} does not match the configured key"),
            ));
        }
    }
    session.userauth_password(&sftp.username, sftp.password.reveal())?;
    let sftp = session.sftp()?;
    Ok(SftpClient { session, sftp })
}

impl SftpTransferAgent {
    pub async fn connect(config: &FileTransferConfig, sftp: &SftpConfig) -> Result<Self, AgentError> {
        let hostname = sftp.hostname.clone();
        let settings = sftp.clone();
        let client = tokio::task::spawn_blocking(move || open_session(&settings))
            .await
            .map_err(|e| AgentError::ConnectionError(hostname.clone(), e.to_string()))?
            .map_err(|e| match e {
                AgentError::ConnectionError(..) => e,
                e => AgentError::ConnectionError(hostname.clone(), e.to_string()),
            })?;
        info!("📡️ Connected to SFTP server {hostname}");
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
        F: FnOnce(&SftpClient) -> Result<T, AgentError> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.client.take().ok_or(AgentError::Closed)?;
        let (client, result) = tokio::task::spawn_blocking(move || {
            let result = f(&client);
            (client, result)
        })
        .await
        .map_err(|e| AgentError::ProtocolError(format!("SFTP task for {} failed. {e}", self.hostname)))?;
        self.client = Some(client);
        result
    }

    async fn fetch_dir(&mut self, dir: String) -> Result<Vec<RemoteFile>, AgentError> {
        self.with_client(move |client| {
            let mut files = vec![];
            for (path, stat) in client.sftp.readdir(Path::new(&dir))? {
                if !stat.is_file() {
                    continue;
                }
                let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
                let mut contents = vec![];
                client.sftp.open(&path)?.read_to_end(&mut contents)?;
                files.push(RemoteFile::new(filename, contents));
            }
            files.sort_by(|a, b| a.filename.cmp(&b.filename));
            Ok(files)
        })
        .await
    }
}

impl FileTransferAgent for SftpTransferAgent {
    async fn get_inbound_files(&mut self) -> Result<Vec<RemoteFile>, AgentError> {
        self.fetch_dir(self.inbound_path.clone()).await
    }

    async fn get_return_files(&mut self) -> Result<Vec<RemoteFile>, AgentError> {
        self.fetch_dir(self.return_path.clone()).await
    }

    async fn upload_file(&mut self, file: RemoteFile) -> Result<(), AgentError> {
        let dest = remote_path(&self.outbound_path, base_name(&file.filename));
        self.with_client(move |client| {
            let mut remote = client.sftp.create(Path::new(&dest))?;
            remote.write_all(&file.contents)?;
            Ok(())
        })
        .await?;
        debug!("📡️ Uploaded file to {}", self.hostname);
        Ok(())
    }

    async fn delete(&mut self, path: &str) -> Result<(), AgentError> {
        let path = path.to_string();
        self.with_client(move |client| Ok(client.sftp.unlink(Path::new(&path))?)).await
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
        self.with_client(|client| Ok(client.session.disconnect(None, "closing", None)?)).await?;
        self.client = None;
        debug!("📡️ Closed SFTP connection to {}", self.hostname);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    #[test]
    fn fingerprints_are_lowercase_hex() {
        assert_eq!(super::hex(&[0x0a, 0xff, 0x10]), "0aff10");
    }
}
