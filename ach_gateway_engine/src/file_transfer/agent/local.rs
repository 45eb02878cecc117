use std::path::{Path, PathBuf};

use log::*;
use tokio::fs;

use super::{base_name, AgentError, FileTransferAgent, RemoteFile};
use crate::file_transfer::config::{FileTransferConfig, LocalConfig};

/// Treats a directory on the local filesystem as the remote server. The inbound, outbound and return paths are
/// resolved relative to the configured root.
#[derive(Debug, Clone)]
pub struct LocalTransferAgent {
    root: PathBuf,
    inbound_path: String,
    outbound_path: String,
    return_path: String,
    closed: bool,
}

impl LocalTransferAgent {
    pub async fn new(config: &FileTransferConfig, local: &LocalConfig) -> Result<Self, AgentError> {
        let agent = Self {
            root: local.root.clone(),
            inbound_path: config.inbound_path.clone(),
            outbound_path: config.outbound_path.clone(),
            return_path: config.return_path.clone(),
            closed: false,
        };
        for dir in [&agent.inbound_path, &agent.outbound_path, &agent.return_path] {
            fs::create_dir_all(agent.root.join(dir)).await?;
        }
        Ok(agent)
    }

    fn check_open(&self) -> Result<(), AgentError> {
        if self.closed {
            Err(AgentError::Closed)
        } else {
            Ok(())
        }
    }

    async fn read_files(&self, dir: &str) -> Result<Vec<RemoteFile>, AgentError> {
        self.check_open()?;
        let path = self.root.join(dir);
        let mut entries = fs::read_dir(&path).await?;
        let mut files = vec![];
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            let contents = fs::read(entry.path()).await?;
            files.push(RemoteFile::new(filename, contents));
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        trace!("📡️ Read {} files from {}", files.len(), path.display());
        Ok(files)
    }
}

impl FileTransferAgent for LocalTransferAgent {
    async fn get_inbound_files(&mut self) -> Result<Vec<RemoteFile>, AgentError> {
        self.read_files(&self.inbound_path).await
    }

    async fn get_return_files(&mut self) -> Result<Vec<RemoteFile>, AgentError> {
        self.read_files(&self.return_path).await
    }

    async fn upload_file(&mut self, file: RemoteFile) -> Result<(), AgentError> {
        self.check_open()?;
        let dest = self.root.join(&self.outbound_path).join(base_name(&file.filename));
        fs::write(&dest, &file.contents).await?;
        debug!("📡️ Wrote {} bytes to {}", file.contents.len(), dest.display());
        Ok(())
    }

    async fn delete(&mut self, path: &str) -> Result<(), AgentError> {
        self.check_open()?;
        let target = self.root.join(Path::new(path.trim_start_matches('/')));
        fs::remove_file(&target).await?;
        Ok(())
    }

    fn inbound_path(&self) -> &str {
        &self.inbound_path
    }

    fn return_path(&self) -> &str {
        &self.return_path
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::file_transfer::config::TransferProtocol;

    async fn agent(root: &Path) -> LocalTransferAgent {
        let local = LocalConfig { root: root.to_path_buf() };
        let config = FileTransferConfig::new("121042882", TransferProtocol::Local(local.clone()));
        LocalTransferAgent::new(&config, &local).await.expect("Failed to create agent")
    }

    #[tokio::test]
    async fn upload_list_and_delete() {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let mut agent = agent(dir.path()).await;
        agent.upload_file(RemoteFile::new("a.ach", b"101".to_vec())).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("outbound/a.ach")).unwrap(), b"101");

        std::fs::write(dir.path().join("returned/r2.ach"), b"two").unwrap();
        std::fs::write(dir.path().join("returned/r1.ach"), b"one").unwrap();
        std::fs::create_dir(dir.path().join("returned/nested")).unwrap();
        let files = agent.get_return_files().await.unwrap();
        let names = files.iter().map(|f| f.filename.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["r1.ach", "r2.ach"]);
        assert!(agent.get_inbound_files().await.unwrap().is_empty());

        agent.delete("returned/r1.ach").await.unwrap();
        assert_eq!(agent.get_return_files().await.unwrap().len(), 1);
        assert!(agent.delete("returned/r1.ach").await.is_err());
    }

    #[tokio::test]
    async fn closed_agents_refuse_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = agent(dir.path()).await;
        agent.close().await.unwrap();
        assert!(matches!(agent.get_inbound_files().await, Err(AgentError::Closed)));
        assert!(matches!(agent.upload_file(RemoteFile::new("a.ach", vec![])).await, Err(AgentError::Closed)));
    }
}
