//! Context-window summarization policy
//!
//! Older messages are collapsed into one synthetic `system` message. What
//! happens to the originals afterwards is decided by [`SummaryMode`].

use super::entities::{Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Characters of each user message quoted in the topic list.
pub const TOPIC_PREVIEW_CHARS: usize = 100;

/// Fate of messages superseded by a summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    /// Hide from the model-facing view; still retrievable from the archive
    #[default]
    Archive,
    /// Physically remove from the store
    Delete,
}

impl SummaryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryMode::Archive => "archive",
            SummaryMode::Delete => "delete",
        }
    }
}

impl std::str::FromStr for SummaryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archive" => Ok(SummaryMode::Archive),
            "delete" => Ok(SummaryMode::Delete),
            other => Err(format!("unknown summary mode: {other}")),
        }
    }
}

/// Split a history into (to summarize, to keep). `None` when nothing to do.
pub fn split_for_summary(messages: &[Message], keep_recent: usize) -> Option<(&[Message], &[Message])> {
    if messages.len() <= keep_recent {
        return None;
    }
    Some(messages.split_at(messages.len() - keep_recent))
}

/// Short derived description of a run of messages.
pub fn summarize(messages: &[Message]) -> String {
    let user: Vec<&Message> = messages.iter().filter(|m| m.role == Role::User).collect();
    let assistant = messages.iter().filter(|m| m.role == Role::Assistant).count();

    let topics = user
        .iter()
        .map(|m| preview(&m.content))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

    format!(
        "Previous conversation summary: Conversation covered {} user messages and {} assistant responses. Main topics: {}",
        user.len(),
        assistant,
        topics
    )
}

/// Metadata attached to a summary message.
pub fn summary_metadata(summarized: usize, mode: SummaryMode) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("type".into(), Value::from("summary"));
    metadata.insert("originalMessageCount".into(), Value::from(summarized));
    metadata.insert("mode".into(), Value::from(mode.as_str()));
    metadata
}

fn preview(content: &str) -> String {
    content.trim().chars().take(TOPIC_PREVIEW_CHARS).collect()
}
