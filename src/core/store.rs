//! Chat history persistence.
//!
//! The conversation only needs a narrow contract from storage, captured by
//! [`ChatStore`]. Two implementations ship: [`FileChatStore`] keeps one JSON
//! document per chat under the data directory, and [`MemoryChatStore`] backs
//! tests and throwaway sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::core::config::write_atomically;
use crate::core::message::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(flatten)]
    pub message: ChatMessage,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("chat '{0}' not found")]
    NotFound(String),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("corrupt chat file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode chat: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, title: &str) -> Result<ChatSession, StoreError>;

    async fn get_chat(&self, chat_id: &str) -> Result<ChatSession, StoreError>;

    async fn append_message(&self, chat_id: &str, message: &ChatMessage)
        -> Result<(), StoreError>;

    /// Messages in the order they were appended.
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    /// Newest first.
    async fn list_chats(&self) -> Result<Vec<ChatSession>, StoreError>;

    async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError>;

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatDocument {
    #[serde(flatten)]
    session: ChatSession,
    #[serde(default)]
    messages: Vec<StoredMessage>,
}

impl ChatDocument {
    fn new(title: &str) -> Self {
        Self {
            session: ChatSession {
                id: Uuid::new_v4().to_string(),
                title: title.to_string(),
                created_at: Utc::now(),
            },
            messages: Vec::new(),
        }
    }

    fn push(&mut self, message: &ChatMessage) {
        self.messages.push(StoredMessage {
            message: message.clone(),
            created_at: Utc::now(),
        });
    }

    fn plain_messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(|m| m.message.clone()).collect()
    }
}

fn newest_first(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[derive(Debug, Default)]
pub struct MemoryChatStore {
    chats: Mutex<Vec<ChatDocument>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_chats<T>(&self, f: impl FnOnce(&mut Vec<ChatDocument>) -> T) -> T {
        let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut chats)
    }

    fn with_chat<T>(
        &self,
        chat_id: &str,
        f: impl FnOnce(&mut ChatDocument) -> T,
    ) -> Result<T, StoreError> {
        self.with_chats(|chats| {
            chats
                .iter_mut()
                .find(|c| c.session.id == chat_id)
                .map(f)
                .ok_or_else(|| StoreError::NotFound(chat_id.to_string()))
        })
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn create_chat(&self, title: &str) -> Result<ChatSession, StoreError> {
        let document = ChatDocument::new(title);
        let session = document.session.clone();
        self.with_chats(|chats| chats.push(document));
        Ok(session)
    }

    async fn get_chat(&self, chat_id: &str) -> Result<ChatSession, StoreError> {
        self.with_chat(chat_id, |chat| chat.session.clone())
    }

    async fn append_message(
        &self,
        chat_id: &str,
        message: &ChatMessage,
    ) -> Result<(), StoreError> {
        self.with_chat(chat_id, |chat| chat.push(message))
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        self.with_chat(chat_id, |chat| chat.plain_messages())
    }

    async fn list_chats(&self) -> Result<Vec<ChatSession>, StoreError> {
        let mut sessions: Vec<ChatSession> = self.with_chats(|chats| {
            chats.iter().rev().map(|c| c.session.clone()).collect()
        });
        newest_first(&mut sessions);
        Ok(sessions)
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError> {
        self.with_chats(|chats| {
            let before = chats.len();
            chats.retain(|c| c.session.id != chat_id);
            if chats.len() == before {
                Err(StoreError::NotFound(chat_id.to_string()))
            } else {
                Ok(())
            }
        })
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), StoreError> {
        self.with_chat(chat_id, |chat| chat.session.title = title.to_string())
    }
}

/// One `<chat id>.json` document per chat.
///
/// Writes go through a temp file and rename, and are serialized within the
/// process so concurrent appends to the same chat cannot drop messages.
#[derive(Debug)]
pub struct FileChatStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileChatStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chat_path(&self, chat_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !chat_id.is_empty()
            && chat_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(StoreError::NotFound(chat_id.to_string()));
        }
        Ok(self.dir.join(format!("{chat_id}.json")))
    }

    async fn read_document(&self, path: &Path) -> Result<Option<ChatDocument>, StoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn load(&self, chat_id: &str) -> Result<(PathBuf, ChatDocument), StoreError> {
        let path = self.chat_path(chat_id)?;
        match self.read_document(&path).await? {
            Some(document) => Ok((path, document)),
            None => Err(StoreError::NotFound(chat_id.to_string())),
        }
    }

    async fn write_document(&self, path: PathBuf, document: &ChatDocument) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(document)?;
        tokio::task::spawn_blocking(move || {
            write_atomically(&path, &contents).map_err(|source| StoreError::Io { path, source })
        })
        .await?
    }

    async fn update<F>(&self, chat_id: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ChatDocument) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let (path, mut document) = self.load(chat_id).await?;
        f(&mut document);
        self.write_document(path, &document).await
    }
}

#[async_trait]
impl ChatStore for FileChatStore {
    async fn create_chat(&self, title: &str) -> Result<ChatSession, StoreError> {
        let document = ChatDocument::new(title);
        let path = self.chat_path(&document.session.id)?;
        let _guard = self.write_lock.lock().await;
        self.write_document(path, &document).await?;
        Ok(document.session)
    }

    async fn get_chat(&self, chat_id: &str) -> Result<ChatSession, StoreError> {
        Ok(self.load(chat_id).await?.1.session)
    }

    async fn append_message(
        &self,
        chat_id: &str,
        message: &ChatMessage,
    ) -> Result<(), StoreError> {
        self.update(chat_id, |chat| chat.push(message)).await
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self.load(chat_id).await?.1.plain_messages())
    }

    async fn list_chats(&self) -> Result<Vec<ChatSession>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut sessions = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(StoreError::Io {
                        path: self.dir.clone(),
                        source,
                    })
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.read_document(&path).await {
                Ok(Some(document)) => sessions.push(document.session),
                Ok(None) => {}
                Err(err) => tracing::warn!("skipping unreadable chat: {err}"),
            }
        }

        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        newest_first(&mut sessions);
        Ok(sessions)
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError> {
        let path = self.chat_path(chat_id)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(chat_id.to_string()))
            }
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), StoreError> {
        self.update(chat_id, |chat| chat.session.title = title.to_string())
            .await
    }
}
