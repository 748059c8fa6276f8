//! Conversation entities: threads, messages, and derived views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Author role of a message. Exactly four literal values are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            "tool" => Ok(Role::Tool),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A persisted conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Opaque passthrough bag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One turn within a [`Thread`].
///
/// Immutable after creation except for metadata patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub thread_id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewThread {
    pub account_id: String,
    pub title: Option<String>,
    pub metadata: Option<Value>,
}

impl NewThread {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Partial update of a thread's mutable attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadPatch {
    pub title: Option<String>,
    pub metadata: Option<Value>,
}

impl ThreadPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.metadata.is_none()
    }
}

/// Model-facing projection of a stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl From<Message> for AiMessage {
    fn from(message: Message) -> Self {
        Self {
            role: message.role,
            content: message.content,
            metadata: message.metadata,
        }
    }
}

/// Aggregate counters for one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadStats {
    pub message_count: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub system_messages: usize,
    pub tool_messages: usize,
    pub total_characters: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ThreadStats {
    pub fn compute(thread: &Thread, messages: &[Message]) -> Self {
        let count = |role: Role| messages.iter().filter(|m| m.role == role).count();
        let last_activity = messages
            .iter()
            .map(|m| m.created_at)
            .max()
            .map_or(thread.updated_at, |t| t.max(thread.updated_at));

        Self {
            message_count: messages.len(),
            user_messages: count(Role::User),
            assistant_messages: count(Role::Assistant),
            system_messages: count(Role::System),
            tool_messages: count(Role::Tool),
            total_characters: messages.iter().map(|m| m.content.chars().count()).sum(),
            created_at: thread.created_at,
            last_activity,
        }
    }
}
