//! Directory-backed log storage on `tokio::fs`.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{LogInfo, LogStorage};

/// Stores each log as a flat file inside one directory
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Opens (creating if needed) the log directory
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created
    pub async fn open<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        info!("Log storage ready at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl LogStorage for FsStorage {
    async fn create(&self, name: &str, initial: &[u8]) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path(name))
            .await?;
        file.write_all(initial).await?;
        file.flush().await?;
        file.sync_data().await?;
        debug!("Created log {}", name);
        Ok(())
    }

    async fn append(&self, name: &str, data: &[u8]) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(self.path(name))
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.path(name)).await
    }

    async fn exists(&self, name: &str) -> io::Result<bool> {
        fs::try_exists(self.path(name)).await
    }

    async fn list(&self) -> io::Result<Vec<LogInfo>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut logs = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            logs.push(LogInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: meta.len(),
            });
        }

        logs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(logs)
    }

    async fn read(&self, name: &str) -> io::Result<Bytes> {
        fs::read(self.path(name)).await.map(Bytes::from)
    }
}
