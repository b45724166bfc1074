//! Saved-chat storage
//!
//! Conversations can be snapshotted to JSON files in a configured directory
//! and listed or reloaded later. Stored files keep the upstream turn format;
//! loading converts turns to the flat message shape the frontend renders
//! (inline blobs are elided, they are not stored in a reloadable form).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SahayakError};
use crate::session::{Role, Turn};

/// A chat snapshot as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedChat {
    /// Session the snapshot was taken from.
    pub session_id: String,
    /// Display name chosen by the user.
    pub chat_name: String,
    /// Full turn history at save time.
    pub messages: Vec<Turn>,
    /// When the snapshot was written.
    pub saved_at: DateTime<Utc>,
}

/// One entry of the saved-chat listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedChatSummary {
    /// File name to pass to the load endpoint.
    pub filename: String,
    /// Display name.
    pub chat_name: String,
    /// Save timestamp.
    pub saved_at: DateTime<Utc>,
    /// Number of stored turns.
    pub message_count: usize,
}

/// A turn flattened to the shape the frontend renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendMessage {
    /// `user` or `assistant`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Concatenated text content.
    pub content: String,
    /// Attached files; always empty, files are not stored in saved form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Follow-up suggestions; always empty, not stored in saved form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// A loaded snapshot in frontend shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedChat {
    /// Session the snapshot was taken from.
    pub session_id: String,
    /// Display name.
    pub chat_name: String,
    /// Save timestamp.
    pub saved_at: DateTime<Utc>,
    /// Converted messages.
    pub messages: Vec<FrontendMessage>,
}

/// Directory-backed store of chat snapshots.
pub struct SavedChatStore {
    dir: PathBuf,
}

impl SavedChatStore {
    /// Creates a store rooted at the given directory (created lazily on save).
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Writes a snapshot and returns the file name it was stored under.
    ///
    /// The name is built from the sanitized chat name (or the session id when
    /// no name was given) plus a millisecond timestamp, so repeated saves
    /// never collide.
    pub fn save(&self, session_id: &str, chat_name: Option<&str>, turns: &[Turn]) -> Result<String> {
        std::fs::create_dir_all(&self.dir)?;

        let saved_at = Utc::now();
        let stem = sanitize_name(chat_name.unwrap_or(session_id));
        let filename = format!("{}_{}.json", stem, saved_at.timestamp_millis());

        let chat = SavedChat {
            session_id: session_id.to_string(),
            chat_name: chat_name.unwrap_or("Untitled Chat").to_string(),
            messages: turns.to_vec(),
            saved_at,
        };

        let json = serde_json::to_string_pretty(&chat)?;
        std::fs::write(self.dir.join(&filename), json)?;
        tracing::info!(%filename, "saved chat snapshot");

        Ok(filename)
    }

    /// Loads a snapshot by file name, converted to frontend shape.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::Storage`] when the name is not a plain file
    /// name or the snapshot does not exist.
    pub fn load(&self, filename: &str) -> Result<LoadedChat> {
        if filename.contains(['/', '\\']) || filename.starts_with('.') {
            return Err(SahayakError::Storage("Invalid chat filename".to_string()).into());
        }

        let path = self.dir.join(filename);
        if !path.exists() {
            return Err(SahayakError::Storage("Chat not found".to_string()).into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let chat: SavedChat = serde_json::from_str(&contents)?;

        Ok(LoadedChat {
            session_id: chat.session_id,
            chat_name: chat.chat_name,
            saved_at: chat.saved_at,
            messages: convert_messages(&chat.messages),
        })
    }

    /// Lists all snapshots, newest first.
    ///
    /// Unreadable or malformed files are skipped with a warning instead of
    /// failing the whole listing.
    pub fn list(&self) -> Result<Vec<SavedChatSummary>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().to_string();
            match std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|contents| serde_json::from_str::<SavedChat>(&contents).map_err(Into::into))
            {
                Ok(chat) => summaries.push(SavedChatSummary {
                    filename,
                    chat_name: chat.chat_name,
                    saved_at: chat.saved_at,
                    message_count: chat.messages.len(),
                }),
                Err(e) => {
                    tracing::warn!("Skipping unreadable saved chat {}: {}", filename, e);
                }
            }
        }

        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn convert_messages(turns: &[Turn]) -> Vec<FrontendMessage> {
    turns
        .iter()
        .filter_map(|turn| match turn.role {
            Role::User => {
                let text = turn.text();
                Some(FrontendMessage {
                    kind: "user".to_string(),
                    content: if text.is_empty() {
                        "User message".to_string()
                    } else {
                        text
                    },
                    files: Some(Vec::new()),
                    suggestions: None,
                })
            }
            Role::Model => {
                let text = turn.text();
                if text.is_empty() {
                    // A model turn with no text part has nothing to render.
                    None
                } else {
                    Some(FrontendMessage {
                        kind: "assistant".to_string(),
                        content: text,
                        files: None,
                        suggestions: Some(Vec::new()),
                    })
                }
            }
        })
        .collect()
}
