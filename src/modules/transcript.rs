//! Conversation transcripts on disk
//!
//! One JSON-lines file per user and owner under the module's data directory.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::channel::ChannelMessage;

/// Maximum serialized size of one transcript entry
pub const MAX_ENTRY_SIZE: usize = 64 * 1024;

/// Maximum length of a user id
const MAX_USER_ID_LEN: usize = 64;

/// Check that a user id is safe to use as a file name
pub fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && !user_id.starts_with('.')
        && user_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Transcript store
///
/// Transcripts are kept apart per owner, the authenticated subject that wrote
/// them, under a directory named by a UUIDv5 of the subject.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    /// Transcript directory path
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding one owner's transcripts
    fn owner_dir(&self, owner: &str) -> PathBuf {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, owner.as_bytes());
        self.dir.join(id.simple().to_string())
    }

    /// File path for a user's transcript
    fn get_path(&self, owner: &str, user_id: &str) -> Result<PathBuf> {
        if !is_valid_user_id(user_id) {
            return Err(anyhow!("Invalid user id: {:?}", user_id));
        }
        Ok(self.owner_dir(owner).join(format!("{}.jsonl", user_id)))
    }

    /// Append messages for one user in a single write
    pub async fn append(&self, owner: &str, messages: &[&ChannelMessage]) -> Result<PathBuf> {
        let Some(first) = messages.first() else {
            return Err(anyhow!("No messages to append"));
        };
        if let Some(other) = messages.iter().find(|m| m.user_id != first.user_id) {
            return Err(anyhow!(
                "Messages for {:?} and {:?} in one append",
                first.user_id,
                other.user_id
            ));
        }
        let path = self.get_path(owner, &first.user_id)?;

        let mut batch = String::new();
        for message in messages {
            let line = serde_json::to_string(message).context("Failed to serialize message")?;
            if line.len() > MAX_ENTRY_SIZE {
                return Err(anyhow!(
                    "Transcript entry too large: {} bytes (max: {})",
                    line.len(),
                    MAX_ENTRY_SIZE
                ));
            }
            batch.push_str(&line);
            batch.push('\n');
        }

        let dir = self.owner_dir(owner);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create transcript directory: {:?}", dir))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open transcript: {:?}", path))?;
        file.write_all(batch.as_bytes())
            .await
            .with_context(|| format!("Failed to write transcript: {:?}", path))?;

        debug!("Appended {} message(s) to {:?}", messages.len(), path);
        Ok(path)
    }

    /// Load a user's transcript, oldest first
    pub async fn load(&self, owner: &str, user_id: &str) -> Result<Vec<ChannelMessage>> {
        let path = self.get_path(owner, user_id)?;

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read transcript: {:?}", path));
            }
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Corrupt transcript entry"))
            .collect()
    }
}
