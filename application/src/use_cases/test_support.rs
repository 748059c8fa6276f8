//! In-memory doubles for use-case tests.

use crate::ports::cache::{CacheError, CachePort};
use crate::ports::llm_gateway::{Completion, CompletionRequest, GatewayError, LlmGateway};
use crate::ports::tool_dispatch::ToolDispatchPort;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use suna_domain::{
    FunctionSchema, Message, OperationSchema, ParamSpec, StoreError, SummaryMode, TagSchema,
    Thread, ThreadPatch, ThreadRepository, ToolContext, ToolError, ToolResult,
};

#[derive(Default)]
struct StoreState {
    threads: HashMap<String, Thread>,
    messages: Vec<(Message, bool)>,
}

/// Vec-backed store; `failing()` errors on every call.
#[derive(Default)]
pub struct TestStore {
    state: Mutex<StoreState>,
    fail: bool,
    fail_summaries: AtomicBool,
}

impl TestStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// From now on `replace_with_summary` fails without changing anything.
    pub fn fail_summaries(&self) {
        self.fail_summaries.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail {
            Err(StoreError::Backend("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ThreadRepository for TestStore {
    async fn insert_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.threads.insert(thread.thread_id.clone(), thread.clone());
        Ok(())
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>, StoreError> {
        self.check()?;
        Ok(self.state.lock().unwrap().threads.get(thread_id).cloned())
    }

    async fn update_thread(
        &self,
        thread_id: &str,
        patch: &ThreadPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Thread>, StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        Ok(state.threads.get_mut(thread_id).map(|t| {
            if let Some(title) = &patch.title {
                t.title = Some(title.clone());
            }
            if let Some(metadata) = &patch.metadata {
                t.metadata = Some(metadata.clone());
            }
            t.updated_at = updated_at;
            t.clone()
        }))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<bool, StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.messages.retain(|(m, _)| m.thread_id != thread_id);
        Ok(state.threads.remove(thread_id).is_some())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let Some(thread) = state.threads.get_mut(&message.thread_id) else {
            return Err(StoreError::ThreadNotFound(message.thread_id.clone()));
        };
        thread.updated_at = message.created_at;
        state.messages.push((message.clone(), false));
        Ok(())
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StoreError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|(m, archived)| m.thread_id == thread_id && !archived)
            .map(|(m, _)| m.clone())
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn update_message_metadata(
        &self,
        thread_id: &str,
        message_id: &str,
        patch: &Map<String, Value>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Message>, StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter_mut()
            .find(|(m, _)| m.thread_id == thread_id && m.message_id == message_id)
            .map(|(m, _)| {
                let metadata = m.metadata.get_or_insert_with(Map::new);
                for (k, v) in patch {
                    metadata.insert(k.clone(), v.clone());
                }
                m.updated_at = updated_at;
                m.clone()
            }))
    }

    async fn replace_with_summary(
        &self,
        summary: &Message,
        superseded: &[String],
        mode: SummaryMode,
    ) -> Result<usize, StoreError> {
        self.check()?;
        if self.fail_summaries.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".into()));
        }
        let mut state = self.state.lock().unwrap();
        let Some(thread) = state.threads.get_mut(&summary.thread_id) else {
            return Err(StoreError::ThreadNotFound(summary.thread_id.clone()));
        };
        thread.updated_at = summary.created_at;

        let thread_id = summary.thread_id.as_str();
        let targeted =
            |m: &Message| m.thread_id == thread_id && superseded.contains(&m.message_id);
        let affected = match mode {
            SummaryMode::Archive => {
                let mut count = 0;
                for (m, archived) in state.messages.iter_mut() {
                    if targeted(m) && !*archived {
                        *archived = true;
                        count += 1;
                    }
                }
                count
            }
            SummaryMode::Delete => {
                let before = state.messages.len();
                state.messages.retain(|(m, _)| !targeted(m));
                before - state.messages.len()
            }
        };
        state.messages.push((summary.clone(), false));
        Ok(affected)
    }

    async fn list_archived_messages(&self, thread_id: &str) -> Result<Vec<Message>, StoreError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|(m, archived)| m.thread_id == thread_id && *archived)
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn list_threads_updated_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .threads
            .values()
            .filter(|t| t.updated_at < cutoff)
            .map(|t| t.thread_id.clone())
            .collect())
    }
}

/// Cache that ignores TTLs and lets tests inspect keys.
#[derive(Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, String>>,
}

impl RecordingCache {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CachePort for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String, _ttl: Duration) -> Result<(), CacheError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let prefix = pattern.trim_end_matches('*');
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
}

/// Cache whose every call fails.
pub struct FailingCache;

#[async_trait]
impl CachePort for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("down".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("down".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("down".into()))
    }

    async fn delete_pattern(&self, _pattern: &str) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("down".into()))
    }
}

/// Gateway replaying a fixed list of completions and recording requests.
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<Completion, GatewayError>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGateway {
    pub fn new(replies: Vec<Result<Completion, GatewayError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::RequestFailed("script exhausted".into())))
    }
}

/// Dispatcher exposing one `echo` function.
pub struct EchoDispatch;

fn echo_schema() -> OperationSchema {
    OperationSchema::new("echo", "Echo the text back")
        .param(ParamSpec::string("text", "Text to echo").required())
}

#[async_trait]
impl ToolDispatchPort for EchoDispatch {
    fn function_schemas(&self) -> Vec<FunctionSchema> {
        vec![echo_schema().to_function_schema()]
    }

    fn tag_schemas(&self) -> Vec<TagSchema> {
        Vec::new()
    }

    fn stats(&self) -> Value {
        json!({"totalTools": 1})
    }

    async fn execute_function(
        &self,
        function_name: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult {
        if function_name != "echo" {
            return ToolResult::failure(ToolError::not_found(format!(
                "Function {function_name} not found in registry"
            )));
        }
        match echo_schema().validate(params) {
            Ok(args) => ToolResult::success(json!({
                "echo": args["text"],
                "thread": context.map(|c| c.thread_id.clone()),
            })),
            Err(e) => e.into(),
        }
    }

    async fn execute_tag(
        &self,
        tag_name: &str,
        _params: &Value,
        _context: Option<&ToolContext>,
    ) -> ToolResult {
        ToolResult::failure(ToolError::not_found(format!("Tag {tag_name} not found in registry")))
    }
}
