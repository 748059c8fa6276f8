//! Chat use case: one user turn through the model and the tool registry
//!
//! ```text
//! ChatRequest ──▶ validate ──▶ resolve/create thread ──▶ persist user message
//!                                                              │
//!        ┌─────────────────────────────────────────────────────┘
//!        ▼
//!   history ──▶ model ──tool calls──▶ ToolDispatchPort ──results──▶ model ──▶ ...
//!                 │                                     (≤ max_tool_steps)
//!                 └──final text──▶ persist assistant message ──▶ Finish event
//! ```
//!
//! [`ChatUseCase::start`] does the fallible, synchronous part (validation and
//! thread resolution) so the caller can map errors to a status code before any
//! output is streamed. The model loop runs on a spawned task and reports
//! through [`ChatEvent`]s.

use crate::config::ChatParams;
use crate::ports::llm_gateway::{
    CompletionRequest, LlmGateway, ModelMessage, ModelRole, ModelToolCall, Usage,
};
use crate::ports::tool_dispatch::ToolDispatchPort;
use crate::use_cases::thread_manager::{ThreadError, ThreadManager};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use suna_domain::{AiMessage, NewThread, Role, ToolContext, ToolResult};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Buffered events per in-flight chat.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error(transparent)]
    Thread(ThreadError),
}

impl From<ThreadError> for ChatError {
    fn from(err: ThreadError) -> Self {
        match err {
            ThreadError::ThreadNotFound(id) => ChatError::ThreadNotFound(id),
            other => ChatError::Thread(other),
        }
    }
}

/// One message as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
}

impl ChatRequest {
    /// The last message must come from the user and carry text.
    pub fn validate(&self) -> Result<&IncomingMessage, ChatError> {
        let last = self
            .messages
            .last()
            .ok_or_else(|| ChatError::InvalidRequest("messages must not be empty".into()))?;
        if last.role != Role::User {
            return Err(ChatError::InvalidRequest("No user message found".into()));
        }
        if last.content.trim().is_empty() {
            return Err(ChatError::InvalidRequest("user message is empty".into()));
        }
        Ok(last)
    }
}

/// Streamed progress of a chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Text {
        content: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        id: String,
        name: String,
        result: ToolResult,
    },
    Finish {
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        finish_reason: String,
        usage: Usage,
        tool_calls: usize,
    },
    Error {
        message: String,
    },
}

/// Handle returned by [`ChatUseCase::start`].
pub struct ChatStream {
    pub thread_id: String,
    pub request_id: String,
    pub events: mpsc::Receiver<ChatEvent>,
}

struct Turn {
    thread_id: String,
    user_id: String,
    request_id: String,
    messages: Vec<ModelMessage>,
}

#[derive(Clone)]
pub struct ChatUseCase {
    threads: Arc<ThreadManager>,
    tools: Arc<dyn ToolDispatchPort>,
    gateway: Arc<dyn LlmGateway>,
    params: ChatParams,
}

impl ChatUseCase {
    pub fn new(
        threads: Arc<ThreadManager>,
        tools: Arc<dyn ToolDispatchPort>,
        gateway: Arc<dyn LlmGateway>,
    ) -> Self {
        Self {
            threads,
            tools,
            gateway,
            params: ChatParams::default(),
        }
    }

    pub fn with_params(mut self, params: ChatParams) -> Self {
        self.params = params;
        self
    }

    pub fn threads(&self) -> &Arc<ThreadManager> {
        &self.threads
    }

    pub fn tools(&self) -> &Arc<dyn ToolDispatchPort> {
        &self.tools
    }

    /// Validate, resolve the thread, persist the user message, and spawn the
    /// model loop.
    pub async fn start(
        &self,
        request: ChatRequest,
        request_id: String,
    ) -> Result<ChatStream, ChatError> {
        let user_message = request.validate()?.content.clone();
        let user_id = request
            .user_id
            .clone()
            .unwrap_or_else(|| self.params.anonymous_user.clone());

        info!(
            request_id = %request_id,
            message_count = request.messages.len(),
            thread_id = ?request.thread_id,
            user_id = %user_id,
            "Chat request received"
        );

        let thread_id = match &request.thread_id {
            Some(id) => match self.threads.get_thread(id).await? {
                Some(thread) => thread.thread_id,
                None => return Err(ChatError::ThreadNotFound(id.clone())),
            },
            None => {
                let thread = self
                    .threads
                    .create_thread(
                        NewThread::new(&user_id).with_title(&self.params.default_thread_title),
                    )
                    .await?;
                info!(request_id = %request_id, thread_id = %thread.thread_id, "Created new thread");
                thread.thread_id
            }
        };

        self.threads
            .add_message(&thread_id, Role::User, user_message, None)
            .await?;

        let history = self.threads.get_messages_for_ai(&thread_id, None).await?;
        let mut messages = vec![ModelMessage::system(&self.params.system_prompt)];
        messages.extend(history.into_iter().map(to_model_message));

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let turn = Turn {
            thread_id: thread_id.clone(),
            user_id,
            request_id: request_id.clone(),
            messages,
        };
        let span = info_span!("chat_turn", request_id = %request_id, thread_id = %thread_id);
        let this = self.clone();
        tokio::spawn(async move { this.run_turn(turn, tx).await }.instrument(span));

        Ok(ChatStream {
            thread_id,
            request_id,
            events: rx,
        })
    }

    async fn run_turn(&self, turn: Turn, tx: mpsc::Sender<ChatEvent>) {
        let Turn {
            thread_id,
            user_id,
            request_id,
            mut messages,
        } = turn;

        let context = self
            .threads
            .get_thread_context(&thread_id, &user_id, Some(&request_id));
        let tools: Vec<Value> = self
            .tools
            .function_schemas()
            .iter()
            .map(|f| f.to_tool_declaration())
            .collect();

        let mut usage = Usage::default();
        let mut text = String::new();
        let mut finish_reason = String::from("stop");
        let mut tool_calls = 0usize;

        for step in 0..self.params.max_tool_steps.max(1) {
            let request = CompletionRequest {
                model: self.params.model.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
                max_tokens: self.params.max_tokens,
                temperature: self.params.temperature,
            };

            let completion = match self.gateway.complete(request).await {
                Ok(c) => c,
                Err(e) => {
                    error!(step, error = %e, "Model request failed");
                    emit(&tx, ChatEvent::Error {
                        message: "Model request failed".into(),
                    })
                    .await;
                    return;
                }
            };

            if let Some(u) = &completion.usage {
                usage.add(u);
            }
            finish_reason = completion.finish_reason.clone();
            if !completion.text.is_empty() {
                text.push_str(&completion.text);
                emit(&tx, ChatEvent::Text {
                    content: completion.text.clone(),
                })
                .await;
            }

            if completion.tool_calls.is_empty() {
                break;
            }

            messages.push(ModelMessage::assistant_with_calls(
                completion.text,
                completion.tool_calls.clone(),
            ));
            for call in completion.tool_calls {
                let result = self.dispatch(&call, &context, &tx).await;
                tool_calls += 1;
                messages.push(ModelMessage::tool_result(&call.id, render_result(&result)));
            }

            if step + 1 == self.params.max_tool_steps {
                warn!(steps = step + 1, "Tool loop stopped at step limit");
                finish_reason = "max_steps".into();
            }
        }

        let mut metadata = Map::new();
        metadata.insert(
            "usage".into(),
            serde_json::to_value(usage).unwrap_or(Value::Null),
        );
        metadata.insert("finishReason".into(), Value::from(finish_reason.clone()));
        metadata.insert("toolCalls".into(), Value::from(tool_calls));

        let message_id = if text.is_empty() {
            None
        } else {
            match self
                .threads
                .add_message(&thread_id, Role::Assistant, text, Some(metadata))
                .await
            {
                Ok(message) => Some(message.message_id),
                Err(e) => {
                    error!(error = %e, "Failed to persist assistant message");
                    emit(&tx, ChatEvent::Error {
                        message: "Failed to persist response".into(),
                    })
                    .await;
                    return;
                }
            }
        };

        if let Some(keep) = self.params.summarize_keep_recent {
            if let Err(e) = self.threads.summarize_old_messages(&thread_id, keep).await {
                warn!(error = %e, "Post-turn summarization failed");
            }
        }

        info!(
            finish_reason = %finish_reason,
            tool_calls,
            total_tokens = usage.total_tokens,
            "Chat turn finished"
        );
        emit(&tx, ChatEvent::Finish {
            message_id,
            finish_reason,
            usage,
            tool_calls,
        })
        .await;
    }

    async fn dispatch(
        &self,
        call: &ModelToolCall,
        context: &ToolContext,
        tx: &mpsc::Sender<ChatEvent>,
    ) -> ToolResult {
        emit(tx, ChatEvent::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        })
        .await;

        let result = self
            .tools
            .execute_function(&call.name, &call.arguments, Some(context))
            .await;

        emit(tx, ChatEvent::ToolResult {
            id: call.id.clone(),
            name: call.name.clone(),
            result: result.clone(),
        })
        .await;
        result
    }
}

fn to_model_message(message: AiMessage) -> ModelMessage {
    match message.role {
        // Stored tool output has no call id to pair with; surface it as context.
        Role::Tool => ModelMessage::system(format!("Tool output: {}", message.content)),
        role => ModelMessage::new(ModelRole::from(role), message.content),
    }
}

fn render_result(result: &ToolResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|_| {
        result
            .error_message()
            .unwrap_or("tool result could not be encoded")
            .to_string()
    })
}

async fn emit(tx: &mpsc::Sender<ChatEvent>, event: ChatEvent) {
    if tx.send(event).await.is_err() {
        debug!("Chat client disconnected; continuing without streaming");
    }
}
