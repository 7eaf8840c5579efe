//! # Console Commands
//!
//! Line-oriented command layer over [`Tracker`], used by the binary's stdin
//! console. Each line maps to one tracker operation and one reply line.
//!
//! | Command | Reply |
//! |---------|-------|
//! | `start`, `resume`, `pause`, `stop`, `discard` | `{"state": ...}` |
//! | `status` | snapshot JSON |
//! | `track` | JSON array of track points |
//! | `files` | JSON array of `{name, size}` |
//! | `read <name>` | log contents |
//! | `delete <name>` | `{"deleted": name}` |
//!
//! A lock timeout replies `busy` and may be retried.

use serde_json::json;
use std::str::FromStr;

use crate::error::Result;
use crate::tracker::Tracker;

/// One parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Resume,
    Pause,
    Stop,
    Discard,
    Status,
    Track,
    Files,
    Read(String),
    Delete(String),
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(|| "empty command".to_string())?;
        let arg = parts.next();

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("start", None) => Command::Start,
            ("resume", None) => Command::Resume,
            ("pause", None) => Command::Pause,
            ("stop", None) => Command::Stop,
            ("discard", None) => Command::Discard,
            ("status", None) => Command::Status,
            ("track", None) => Command::Track,
            ("files", None) => Command::Files,
            ("read", Some(name)) => Command::Read(name.to_string()),
            ("delete", Some(name)) => Command::Delete(name.to_string()),
            ("read" | "delete", None) => return Err(format!("{} needs a log name", verb)),
            _ => return Err(format!("unknown command: {}", line.trim())),
        };

        if parts.next().is_some() {
            return Err(format!("too many arguments: {}", line.trim()));
        }
        Ok(command)
    }
}

/// Runs `command` against `tracker` and formats the reply.
///
/// # Examples
///
/// ```no_run
/// # async fn demo(tracker: trail_logger::tracker::Tracker) {
/// use trail_logger::console::{execute, Command};
///
/// let reply = execute(&tracker, &Command::Status).await;
/// println!("{}", reply);
/// # }
/// ```
pub async fn execute(tracker: &Tracker, command: &Command) -> String {
    match run(tracker, command).await {
        Ok(reply) => reply,
        Err(e) if e.is_busy() => "busy".to_string(),
        Err(e) => format!("error: {}", e),
    }
}

async fn run(tracker: &Tracker, command: &Command) -> Result<String> {
    let state = match command {
        Command::Start => tracker.start().await?,
        Command::Resume => tracker.resume().await?,
        Command::Pause => tracker.pause().await?,
        Command::Stop => tracker.stop().await?,
        Command::Discard => tracker.discard().await?,
        Command::Status => return Ok(serde_json::to_string(&tracker.status().await?)?),
        Command::Track => return Ok(serde_json::to_string(&tracker.recent_track().await?)?),
        Command::Files => return Ok(serde_json::to_string(&tracker.list_logs().await?)?),
        Command::Read(name) => {
            let data = tracker.read_log(name).await?;
            return Ok(String::from_utf8_lossy(&data).into_owned());
        }
        Command::Delete(name) => {
            tracker.delete_log(name).await?;
            return Ok(json!({ "deleted": name }).to_string());
        }
    };

    Ok(json!({ "state": state }).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mocks::ManualClock;
    use crate::storage::mocks::MemoryStorage;
    use crate::tracker::TrackerSettings;
    use std::sync::Arc;

    fn tracker() -> (Tracker, MemoryStorage) {
        let storage = MemoryStorage::new();
        let tracker = Tracker::new(
            TrackerSettings::default(),
            Arc::new(storage.clone()),
            Arc::new(ManualClock::new()),
        );
        (tracker, storage)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!("  STATUS \n".parse::<Command>().unwrap(), Command::Status);
        assert_eq!(
            "read log_1.csv".parse::<Command>().unwrap(),
            Command::Read("log_1.csv".to_string())
        );
        assert_eq!(
            "delete old.csv".parse::<Command>().unwrap(),
            Command::Delete("old.csv".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<Command>().is_err());
        assert!("fly".parse::<Command>().is_err());
        assert!("read".parse::<Command>().is_err());
        assert!("stop now".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn test_state_commands_reply_json() {
        let (tracker, _) = tracker();
        assert_eq!(execute(&tracker, &Command::Start).await, r#"{"state":"recording"}"#);
        assert_eq!(execute(&tracker, &Command::Pause).await, r#"{"state":"paused"}"#);
        assert_eq!(execute(&tracker, &Command::Stop).await, r#"{"state":"idle"}"#);
    }

    #[tokio::test]
    async fn test_status_reply_is_snapshot() {
        let (tracker, _) = tracker();
        let reply = execute(&tracker, &Command::Status).await;
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["state"], "idle");
        assert_eq!(value["distance_m"], 0.0);
    }

    #[tokio::test]
    async fn test_files_read_delete() {
        let (tracker, storage) = tracker();
        storage.files.lock().unwrap().insert("a.csv".to_string(), b"hello\n".to_vec());

        let files: serde_json::Value = serde_json::from_str(&execute(&tracker, &Command::Files).await).unwrap();
        assert_eq!(files[0]["name"], "a.csv");
        assert_eq!(files[0]["size"], 6);

        assert_eq!(execute(&tracker, &Command::Read("a.csv".into())).await, "hello\n");
        assert_eq!(
            execute(&tracker, &Command::Delete("a.csv".into())).await,
            r#"{"deleted":"a.csv"}"#
        );
        assert!(execute(&tracker, &Command::Read("a.csv".into())).await.starts_with("error: Log not found"));
    }
}
