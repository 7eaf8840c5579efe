//! # Storage Module
//!
//! Named append-only log files on a removable medium.
//!
//! This module handles:
//! - The `LogStorage` trait the tracker writes through
//! - Directory-backed storage on `tokio::fs`
//! - Log name validation for caller-supplied names
//!
//! Every operation may fail (card pulled, write error). Callers treat
//! failures as non-fatal and keep their in-memory data.

pub mod fs;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::io;

use crate::error::{Result, TrackerError};

pub use fs::FsStorage;

/// Identifies the log file of a session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogHandle(String);

impl LogHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory entry returned by [`LogStorage::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogInfo {
    pub name: String,
    pub size: u64,
}

/// Trait for log storage operations
#[async_trait]
pub trait LogStorage: Send + Sync {
    /// Create a new log containing `initial` (fails if it already exists)
    async fn create(&self, name: &str, initial: &[u8]) -> io::Result<()>;

    /// Append data to an existing log
    async fn append(&self, name: &str, data: &[u8]) -> io::Result<()>;

    /// Remove a log
    async fn delete(&self, name: &str) -> io::Result<()>;

    /// Check whether a log exists
    async fn exists(&self, name: &str) -> io::Result<bool>;

    /// List logs sorted by name
    async fn list(&self) -> io::Result<Vec<LogInfo>>;

    /// Read a log's full contents
    async fn read(&self, name: &str) -> io::Result<Bytes>;
}

/// Rejects names that could escape the log directory.
///
/// # Errors
///
/// Returns `InvalidLogName` for empty names, path separators or `..`
pub fn validate_log_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.contains(['/', '\\', '\0'])
        || name.contains("..");

    if bad {
        return Err(TrackerError::InvalidLogName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// In-memory storage with failure injection.
    ///
    /// `write_delay` applies to every call except `list` and `read`.
    #[derive(Clone, Default)]
    pub struct MemoryStorage {
        pub files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
        pub fail_writes: Arc<Mutex<Option<io::ErrorKind>>>,
        pub write_delay: Arc<Mutex<Option<Duration>>>,
        pub append_calls: Arc<Mutex<usize>>,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.fail_writes.lock().unwrap() = Some(error);
        }

        pub fn clear_write_error(&self) {
            *self.fail_writes.lock().unwrap() = None;
        }

        pub fn set_write_delay(&self, delay: Duration) {
            *self.write_delay.lock().unwrap() = Some(delay);
        }

        pub fn contents(&self, name: &str) -> Option<String> {
            self.files
                .lock()
                .unwrap()
                .get(name)
                .map(|b| String::from_utf8_lossy(b).into_owned())
        }

        pub fn names(&self) -> Vec<String> {
            self.files.lock().unwrap().keys().cloned().collect()
        }

        pub fn append_calls(&self) -> usize {
            *self.append_calls.lock().unwrap()
        }

        fn check_write(&self) -> io::Result<()> {
            if let Some(kind) = *self.fail_writes.lock().unwrap() {
                return Err(io::Error::new(kind, "Mock storage error"));
            }
            Ok(())
        }

        async fn delay(&self) {
            let delay = *self.write_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl LogStorage for MemoryStorage {
        async fn create(&self, name: &str, initial: &[u8]) -> io::Result<()> {
            self.delay().await;
            self.check_write()?;
            let mut files = self.files.lock().unwrap();
            if files.contains_key(name) {
                return Err(io::Error::new(io::ErrorKind::AlreadyExists, "exists"));
            }
            files.insert(name.to_string(), initial.to_vec());
            Ok(())
        }

        async fn append(&self, name: &str, data: &[u8]) -> io::Result<()> {
            *self.append_calls.lock().unwrap() += 1;
            self.delay().await;
            self.check_write()?;
            let mut files = self.files.lock().unwrap();
            match files.get_mut(name) {
                Some(file) => {
                    file.extend_from_slice(data);
                    Ok(())
                }
                None => Err(io::Error::new(io::ErrorKind::NotFound, "no such log")),
            }
        }

        async fn delete(&self, name: &str) -> io::Result<()> {
            self.delay().await;
            self.check_write()?;
            match self.files.lock().unwrap().remove(name) {
                Some(_) => Ok(()),
                None => Err(io::Error::new(io::ErrorKind::NotFound, "no such log")),
            }
        }

        async fn exists(&self, name: &str) -> io::Result<bool> {
            self.delay().await;
            Ok(self.files.lock().unwrap().contains_key(name))
        }

        async fn list(&self) -> io::Result<Vec<LogInfo>> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .iter()
                .map(|(name, data)| LogInfo {
                    name: name.clone(),
                    size: data.len() as u64,
                })
                .collect())
        }

        async fn read(&self, name: &str) -> io::Result<Bytes> {
            self.files
                .lock()
                .unwrap()
                .get(name)
                .map(|d| Bytes::from(d.clone()))
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such log"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::MemoryStorage;
    use super::*;

    #[test]
    fn test_valid_log_names() {
        assert!(validate_log_name("log_20240601_120000.csv").is_ok());
        assert!(validate_log_name("track.csv").is_ok());
    }

    #[test]
    fn test_invalid_log_names() {
        for name in ["", "../etc/passwd", "a/b.csv", "..", "dir\\x.csv", "x\0.csv"] {
            match validate_log_name(name) {
                Err(TrackerError::InvalidLogName(n)) => assert_eq!(n, name),
                other => panic!("Expected InvalidLogName for {:?}, got: {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_log_handle_display() {
        let handle = LogHandle::new("log_1.csv");
        assert_eq!(handle.name(), "log_1.csv");
        assert_eq!(handle.to_string(), "log_1.csv");
    }

    #[tokio::test]
    async fn test_memory_storage_failure_injection() {
        let storage = MemoryStorage::new();
        storage.create("a.csv", b"h\n").await.unwrap();

        storage.set_write_error(io::ErrorKind::Other);
        assert!(storage.append("a.csv", b"x\n").await.is_err());
        assert_eq!(storage.contents("a.csv").unwrap(), "h\n");

        storage.clear_write_error();
        tokio_test::assert_ok!(storage.append("a.csv", b"x\n").await);
        assert_eq!(storage.contents("a.csv").unwrap(), "h\nx\n");
        assert_eq!(storage.append_calls(), 2);
    }
}
