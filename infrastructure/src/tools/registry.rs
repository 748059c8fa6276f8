//! Tool Registry
//!
//! The [`ToolRegistry`] owns every registered [`Tool`] instance and routes
//! calls to them by function name or by tag name. It implements
//! [`ToolDispatchPort`] for the chat flow.
//!
//! # Usage
//!
//! ```ignore
//! use suna_infrastructure::tools::{RegistrationOptions, ShellTool, ToolRegistry};
//!
//! let registry = ToolRegistry::new();
//! registry.register_tool(ShellTool::new(config), RegistrationOptions::default()).await?;
//!
//! let result = registry
//!     .execute_function("execute", &json!({"command": "ls"}), None)
//!     .await;
//! ```
//!
//! # Index model
//!
//! ```text
//!   order: [shell, files, web_search]        (registration order, source of truth)
//!            │
//!            ▼ rebuilt after every mutation
//!   ┌──────────────┬─────────────────────┬────────────────────┐
//!   │ by_name      │ by_function         │ by_tag             │
//!   │ tool → entry │ op → (entry, op)    │ tag → (entry, op)  │
//!   └──────────────┴─────────────────────┴────────────────────┘
//! ```
//!
//! The three maps live in one immutable [`Indices`] value behind an `Arc`.
//! Writers build a new value and swap the pointer, so a reader either sees
//! the old set or the new set, never a mix. Every route holds the entry it
//! points at, which makes a dangling function or tag entry unrepresentable.
//!
//! # Name collisions
//!
//! Later registrations win. Because the maps are rebuilt from the ordered
//! list, unregistering the winner re-exposes the previous owner. Shadowed
//! names are reported by [`ToolRegistry::stats`].

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use suna_application::ports::tool_dispatch::ToolDispatchPort;
use suna_domain::{
    FunctionSchema, OperationSchema, TagSchema, Tool, ToolContext, ToolError, ToolLifecycleError,
    ToolResult,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Errors raised while registering a tool.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,

    #[error("failed to initialize tool {tool}: {source}")]
    InitFailed {
        tool: String,
        #[source]
        source: ToolLifecycleError,
    },
}

/// Per-registration knobs.
#[derive(Debug, Clone)]
pub struct RegistrationOptions {
    /// Restrict the tool to these operation names
    pub function_names: Option<Vec<String>>,
    pub enable_functions: bool,
    pub enable_tags: bool,
    /// Free-form, logged at registration
    pub metadata: Map<String, Value>,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            function_names: None,
            enable_functions: true,
            enable_tags: true,
            metadata: Map::new(),
        }
    }
}

impl RegistrationOptions {
    pub fn only<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.function_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn without_tags(mut self) -> Self {
        self.enable_tags = false;
        self
    }

    pub fn without_functions(mut self) -> Self {
        self.enable_functions = false;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A registered tool and the schema snapshot taken at registration.
pub struct RegisteredTool {
    pub tool: Arc<dyn Tool>,
    pub name: String,
    pub description: String,
    pub version: String,
    /// Operations after `function_names` filtering
    pub operations: Vec<OperationSchema>,
    pub enable_functions: bool,
    pub enable_tags: bool,
    pub registered_at: DateTime<Utc>,
}

#[derive(Clone)]
struct Route {
    entry: Arc<RegisteredTool>,
    operation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Function,
    Tag,
}

/// A function or tag name declared by more than one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collision {
    pub kind: IndexKind,
    pub name: String,
    pub winner: String,
    pub shadowed: Vec<String>,
}

#[derive(Default)]
struct Indices {
    order: Vec<Arc<RegisteredTool>>,
    by_name: HashMap<String, Arc<RegisteredTool>>,
    by_function: HashMap<String, Route>,
    by_tag: HashMap<String, Route>,
    collisions: Vec<Collision>,
}

impl Indices {
    fn build(order: Vec<Arc<RegisteredTool>>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_function: HashMap<String, Route> = HashMap::new();
        let mut by_tag: HashMap<String, Route> = HashMap::new();
        let mut shadowed: BTreeMap<(IndexKind, String), Vec<String>> = BTreeMap::new();

        for entry in &order {
            by_name.insert(entry.name.clone(), entry.clone());
            for op in &entry.operations {
                let route = Route {
                    entry: entry.clone(),
                    operation: op.name.clone(),
                };
                if entry.enable_functions {
                    if let Some(prev) = by_function.insert(op.name.clone(), route.clone()) {
                        shadowed
                            .entry((IndexKind::Function, op.name.clone()))
                            .or_default()
                            .push(prev.entry.name.clone());
                    }
                }
                if let (true, Some(tag)) = (entry.enable_tags, op.tag_name()) {
                    if let Some(prev) = by_tag.insert(tag.to_string(), route) {
                        shadowed
                            .entry((IndexKind::Tag, tag.to_string()))
                            .or_default()
                            .push(prev.entry.name.clone());
                    }
                }
            }
        }

        let collisions = shadowed
            .into_iter()
            .filter_map(|((kind, name), shadowed)| {
                let index = match kind {
                    IndexKind::Function => &by_function,
                    IndexKind::Tag => &by_tag,
                };
                index.get(&name).map(|route| Collision {
                    kind,
                    winner: route.entry.name.clone(),
                    name,
                    shadowed,
                })
            })
            .collect();

        Self {
            order,
            by_name,
            by_function,
            by_tag,
            collisions,
        }
    }

    /// Operations of `entry` that currently own their function name.
    fn winning_functions<'a>(
        &'a self,
        entry: &'a Arc<RegisteredTool>,
    ) -> impl Iterator<Item = &'a OperationSchema> + 'a {
        entry.operations.iter().filter(move |op| {
            self.by_function
                .get(&op.name)
                .is_some_and(|r| Arc::ptr_eq(&r.entry, entry))
        })
    }

    fn winning_tags<'a>(
        &'a self,
        entry: &'a Arc<RegisteredTool>,
    ) -> impl Iterator<Item = &'a OperationSchema> + 'a {
        entry.operations.iter().filter(move |op| {
            op.tag_name()
                .and_then(|tag| self.by_tag.get(tag))
                .is_some_and(|r| Arc::ptr_eq(&r.entry, entry) && r.operation == op.name)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStats {
    pub version: String,
    pub registered_at: DateTime<Utc>,
}

/// Introspection snapshot. Built from memory only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total_tools: usize,
    pub functions: usize,
    pub tags: usize,
    pub tools_by_name: BTreeMap<String, ToolStats>,
    pub collisions: Vec<Collision>,
}

/// Catalog of tool instances with atomic function and tag indices.
pub struct ToolRegistry {
    indices: RwLock<Arc<Indices>>,
    /// Serializes register/unregister/clear
    writer: Mutex<()>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        debug!("Initialized new ToolRegistry");
        Self {
            indices: RwLock::new(Arc::new(Indices::default())),
            writer: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Arc<Indices> {
        self.indices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, indices: Indices) {
        *self.indices.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(indices);
    }

    /// Initialize and register a tool.
    ///
    /// A tool whose `init()` fails is not registered. Registering a name that
    /// already exists replaces the previous instance after its cleanup.
    pub async fn register_tool<T: Tool + 'static>(
        &self,
        tool: T,
        options: RegistrationOptions,
    ) -> Result<(), RegistryError> {
        self.register_boxed(Box::new(tool), options).await
    }

    pub async fn register_boxed(
        &self,
        mut tool: Box<dyn Tool>,
        options: RegistrationOptions,
    ) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let _guard = self.writer.lock().await;

        if let Err(source) = tool.init().await {
            error!(tool = %name, error = %source, "Failed to register tool");
            return Err(RegistryError::InitFailed { tool: name, source });
        }

        let declared = tool.schemas();
        let total_operations = declared.len();
        let operations: Vec<OperationSchema> = match &options.function_names {
            Some(allowed) => declared
                .into_iter()
                .filter(|op| allowed.contains(&op.name))
                .collect(),
            None => declared,
        };

        let entry = Arc::new(RegisteredTool {
            description: tool.description().to_string(),
            version: tool.version().to_string(),
            tool: Arc::from(tool),
            name: name.clone(),
            operations,
            enable_functions: options.enable_functions,
            enable_tags: options.enable_tags,
            registered_at: Utc::now(),
        });

        let current = self.snapshot();
        let replaced = current.by_name.get(&name).cloned();

        let mut order: Vec<_> = current
            .order
            .iter()
            .filter(|e| e.name != name)
            .cloned()
            .collect();
        order.push(entry.clone());
        let indices = Indices::build(order);

        let functions = indices.winning_functions(&entry).count();
        let tags = indices.winning_tags(&entry).count();
        for collision in indices
            .collisions
            .iter()
            .filter(|c| c.winner == name)
        {
            warn!(
                kind = ?collision.kind,
                name = %collision.name,
                winner = %collision.winner,
                shadowed = ?collision.shadowed,
                "Name collision, last registration wins"
            );
        }
        self.publish(indices);

        // readers only reach the replaced instance through older snapshots now
        if let Some(previous) = replaced {
            warn!(tool = %name, "Replaced already registered tool");
            run_cleanup(&previous).await;
        }

        info!(
            tool = %name,
            version = %entry.version,
            functions,
            tags,
            total_operations,
            metadata = ?options.metadata,
            "Registered tool"
        );
        Ok(())
    }

    /// Run the tool's cleanup and drop it from every index.
    ///
    /// Returns `false` for an unknown name.
    pub async fn unregister_tool(&self, name: &str) -> bool {
        let _guard = self.writer.lock().await;
        let current = self.snapshot();
        let Some(entry) = current.by_name.get(name) else {
            warn!(tool = %name, "Tool not found for unregistration");
            return false;
        };

        run_cleanup(entry).await;

        let order = current
            .order
            .iter()
            .filter(|e| e.name != name)
            .cloned()
            .collect();
        self.publish(Indices::build(order));
        info!(tool = %name, "Unregistered tool");
        true
    }

    /// Clean up every tool and empty the registry. One failing cleanup does
    /// not stop the others.
    pub async fn clear_all(&self) {
        let _guard = self.writer.lock().await;
        let current = self.snapshot();
        info!(tools = current.order.len(), "Clearing all tools from registry");
        for entry in &current.order {
            run_cleanup(entry).await;
        }
        self.publish(Indices::default());
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.snapshot().by_name.get(name).cloned()
    }

    pub fn all_tools(&self) -> Vec<Arc<RegisteredTool>> {
        self.snapshot().order.clone()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.snapshot().by_function.contains_key(name)
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.snapshot().by_tag.contains_key(name)
    }

    pub fn available_functions(&self) -> Vec<String> {
        let indices = self.snapshot();
        indices
            .order
            .iter()
            .flat_map(|e| indices.winning_functions(e).map(|op| op.name.clone()))
            .collect()
    }

    pub fn available_tags(&self) -> Vec<String> {
        let indices = self.snapshot();
        indices
            .order
            .iter()
            .flat_map(|e| {
                indices
                    .winning_tags(e)
                    .filter_map(|op| op.tag_name().map(str::to_string))
            })
            .collect()
    }

    /// Structured-call declarations, in registration order.
    pub fn function_schemas(&self) -> Vec<FunctionSchema> {
        let indices = self.snapshot();
        indices
            .order
            .iter()
            .flat_map(|e| indices.winning_functions(e).map(|op| op.to_function_schema()))
            .collect()
    }

    pub fn tag_schemas(&self) -> Vec<TagSchema> {
        let indices = self.snapshot();
        indices
            .order
            .iter()
            .flat_map(|e| indices.winning_tags(e).filter_map(|op| op.to_tag_schema()))
            .collect()
    }

    /// Every tag example snippet, for prompt construction.
    pub fn tag_examples(&self) -> Vec<String> {
        self.tag_schemas()
            .into_iter()
            .flat_map(|t| t.examples)
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let indices = self.snapshot();
        RegistryStats {
            total_tools: indices.by_name.len(),
            functions: indices.by_function.len(),
            tags: indices.by_tag.len(),
            tools_by_name: indices
                .by_name
                .iter()
                .map(|(name, e)| {
                    (
                        name.clone(),
                        ToolStats {
                            version: e.version.clone(),
                            registered_at: e.registered_at,
                        },
                    )
                })
                .collect(),
            collisions: indices.collisions.clone(),
        }
    }

    pub async fn execute_function(
        &self,
        function_name: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult {
        let route = self.snapshot().by_function.get(function_name).cloned();
        match route {
            Some(route) => execute_safely(route, params, context).await,
            None => ToolResult::failure(ToolError::not_found(format!(
                "Function {function_name} not found in registry"
            ))),
        }
    }

    pub async fn execute_tag(
        &self,
        tag_name: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult {
        let route = self.snapshot().by_tag.get(tag_name).cloned();
        match route {
            Some(route) => execute_safely(route, params, context).await,
            None => ToolResult::failure(ToolError::not_found(format!(
                "Tag {tag_name} not found in registry"
            ))),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_cleanup(entry: &RegisteredTool) {
    if let Err(e) = entry.tool.cleanup().await {
        error!(tool = %entry.name, error = %e, "Failed to cleanup tool");
    }
}

/// Delegate to the tool, timing the call and turning a panic into a failure.
async fn execute_safely(route: Route, params: &Value, context: Option<&ToolContext>) -> ToolResult {
    let tool_name = route.entry.name.as_str();
    let operation = route.operation.as_str();
    debug!(
        tool = %tool_name,
        function = %operation,
        parameters = ?params.as_object().map(|m| m.keys().collect::<Vec<_>>()),
        thread_id = ?context.map(|c| c.thread_id.as_str()),
        "Executing tool function"
    );

    let start = Instant::now();
    let outcome = AssertUnwindSafe(route.entry.tool.execute(operation, params, context))
        .catch_unwind()
        .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(result) => {
            info!(
                tool = %tool_name,
                function = %operation,
                success = result.is_success(),
                duration_ms,
                "Tool execution completed"
            );
            result
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                tool = %tool_name,
                function = %operation,
                duration_ms,
                error = %message,
                "Tool execution failed"
            );
            ToolResult::failure(ToolError::internal(format!(
                "Tool execution failed: {message}"
            )))
        }
    };
    result.with_metadata("duration_ms", duration_ms)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[async_trait]
impl ToolDispatchPort for ToolRegistry {
    fn function_schemas(&self) -> Vec<FunctionSchema> {
        ToolRegistry::function_schemas(self)
    }

    fn tag_schemas(&self) -> Vec<TagSchema> {
        ToolRegistry::tag_schemas(self)
    }

    fn stats(&self) -> Value {
        serde_json::to_value(ToolRegistry::stats(self)).unwrap_or(Value::Null)
    }

    async fn execute_function(
        &self,
        function_name: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult {
        ToolRegistry::execute_function(self, function_name, params, context).await
    }

    async fn execute_tag(
        &self,
        tag_name: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult {
        ToolRegistry::execute_tag(self, tag_name, params, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use suna_domain::{ErrorKind, ParamSpec, TagSpec};
    use tokio::sync::Notify;

    struct StubTool {
        name: String,
        label: &'static str,
        operations: Vec<&'static str>,
        fail_init: bool,
        cleanups: Arc<AtomicUsize>,
        /// (entered, release): cleanup signals the first, then waits on the second
        cleanup_gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl StubTool {
        fn new(name: &str, operations: Vec<&'static str>) -> Self {
            Self {
                name: name.into(),
                label: "stub",
                operations,
                fail_init: false,
                cleanups: Arc::new(AtomicUsize::new(0)),
                cleanup_gate: None,
            }
        }

        fn labelled(mut self, label: &'static str) -> Self {
            self.label = label;
            self
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        async fn init(&mut self) -> Result<(), ToolLifecycleError> {
            if self.fail_init {
                return Err(ToolLifecycleError::MissingDependency("API key".into()));
            }
            Ok(())
        }

        fn schemas(&self) -> Vec<OperationSchema> {
            self.operations
                .iter()
                .map(|op| {
                    OperationSchema::new(*op, format!("{op} operation"))
                        .param(ParamSpec::string("input", "Input"))
                        .with_tag(TagSpec::new(format!("{op}_tag")))
                })
                .collect()
        }

        async fn execute(
            &self,
            operation: &str,
            _params: &Value,
            _context: Option<&ToolContext>,
        ) -> ToolResult {
            match operation {
                "boom" => panic!("stub exploded"),
                op if self.operations.contains(&op) => ToolResult::success(
                    json!({"tool": self.name, "label": self.label, "operation": op}),
                ),
                op => ToolResult::unknown_operation(&self.name, op),
            }
        }

        async fn cleanup(&self) -> Result<(), ToolLifecycleError> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            if let Some((entered, release)) = &self.cleanup_gate {
                entered.notify_one();
                release.notified().await;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(StubTool::new("alpha", vec!["run", "stop"]), RegistrationOptions::default())
            .await
            .unwrap();

        assert!(registry.has_function("run"));
        assert!(registry.has_tag("stop_tag"));
        assert_eq!(registry.available_functions(), vec!["run", "stop"]);

        let result = registry.execute_function("run", &json!({}), None).await;
        assert!(result.is_success());
        assert!(result.metadata().unwrap().contains_key("duration_ms"));

        let tagged = registry.execute_tag("stop_tag", &json!({}), None).await;
        assert_eq!(tagged.data().unwrap()["operation"], "stop");
    }

    #[tokio::test]
    async fn test_unknown_function_and_tag() {
        let registry = ToolRegistry::new();
        let result = registry.execute_function("nope", &json!({}), None).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
        assert_eq!(result.error_message(), Some("Function nope not found in registry"));

        let result = registry.execute_tag("nope", &json!({}), None).await;
        assert_eq!(result.error_message(), Some("Tag nope not found in registry"));
    }

    #[tokio::test]
    async fn test_collision_last_registration_wins() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(StubTool::new("first", vec!["run"]), RegistrationOptions::default())
            .await
            .unwrap();
        registry
            .register_tool(StubTool::new("second", vec!["run"]), RegistrationOptions::default())
            .await
            .unwrap();

        for _ in 0..3 {
            let result = registry.execute_function("run", &json!({}), None).await;
            assert_eq!(result.data().unwrap()["tool"], "second");
        }

        let stats = registry.stats();
        assert_eq!(stats.total_tools, 2);
        assert!(stats.tools_by_name.contains_key("first"));
        assert!(stats.tools_by_name.contains_key("second"));
        assert_eq!(stats.functions, 1);
        assert_eq!(stats.collisions.len(), 2);
        let function = stats
            .collisions
            .iter()
            .find(|c| c.kind == IndexKind::Function)
            .unwrap();
        assert_eq!(function.winner, "second");
        assert_eq!(function.shadowed, vec!["first"]);

        // Only the winner is declared to the model
        assert_eq!(registry.function_schemas().len(), 1);

        // Removing the winner re-exposes the earlier owner
        assert!(registry.unregister_tool("second").await);
        let result = registry.execute_function("run", &json!({}), None).await;
        assert_eq!(result.data().unwrap()["tool"], "first");
        assert!(registry.stats().collisions.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ToolRegistry::new();
        let tool = StubTool::new("alpha", vec!["run"]);
        let cleanups = tool.cleanups.clone();
        registry
            .register_tool(tool, RegistrationOptions::default())
            .await
            .unwrap();

        assert!(registry.unregister_tool("alpha").await);
        assert!(!registry.unregister_tool("alpha").await);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert!(!registry.has_function("run"));
        assert!(!registry.has_tag("run_tag"));
        assert!(registry.function_schemas().is_empty());
    }

    #[tokio::test]
    async fn test_failed_init_is_not_registered() {
        let registry = ToolRegistry::new();
        let mut tool = StubTool::new("broken", vec!["run"]);
        tool.fail_init = true;
        let err = registry
            .register_tool(tool, RegistrationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InitFailed { .. }));
        assert!(registry.get_tool("broken").is_none());
        assert!(!registry.has_function("run"));
    }

    #[tokio::test]
    async fn test_registration_options_filter() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(
                StubTool::new("alpha", vec!["run", "stop"]),
                RegistrationOptions::default().only(["run"]).without_tags(),
            )
            .await
            .unwrap();

        assert_eq!(registry.available_functions(), vec!["run"]);
        assert!(registry.available_tags().is_empty());
        let result = registry.execute_function("stop", &json!({}), None).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_reregistration_replaces_instance() {
        let registry = ToolRegistry::new();
        let old = StubTool::new("alpha", vec!["run"]);
        let old_cleanups = old.cleanups.clone();
        registry.register_tool(old, RegistrationOptions::default()).await.unwrap();
        registry
            .register_tool(StubTool::new("alpha", vec!["walk"]), RegistrationOptions::default())
            .await
            .unwrap();

        assert_eq!(old_cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(registry.stats().total_tools, 1);
        assert!(!registry.has_function("run"));
        assert!(registry.has_function("walk"));
    }

    #[tokio::test]
    async fn test_replaced_tool_unreachable_during_its_cleanup() {
        let registry = Arc::new(ToolRegistry::new());
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let mut old = StubTool::new("alpha", vec!["run"]).labelled("old");
        old.cleanup_gate = Some((entered.clone(), release.clone()));
        registry.register_tool(old, RegistrationOptions::default()).await.unwrap();

        let replacing = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .register_tool(
                        StubTool::new("alpha", vec!["run"]).labelled("new"),
                        RegistrationOptions::default(),
                    )
                    .await
            })
        };

        // the old instance is mid-cleanup; dispatch must already see the new one
        entered.notified().await;
        let result = registry.execute_function("run", &json!({}), None).await;
        assert_eq!(result.data().unwrap()["label"], "new");
        assert_eq!(registry.stats().total_tools, 1);

        release.notify_one();
        replacing.await.unwrap().unwrap();
        let result = registry.execute_function("run", &json!({}), None).await;
        assert_eq!(result.data().unwrap()["label"], "new");
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(StubTool::new("alpha", vec!["boom"]), RegistrationOptions::default())
            .await
            .unwrap();

        let result = registry.execute_function("boom", &json!({}), None).await;
        assert!(!result.is_success());
        assert_eq!(result.error_kind(), Some(ErrorKind::Internal));
        assert_eq!(result.error_message(), Some("Tool execution failed: stub exploded"));
    }

    #[tokio::test]
    async fn test_clear_all_cleans_every_tool() {
        let registry = ToolRegistry::new();
        let a = StubTool::new("a", vec!["x"]);
        let b = StubTool::new("b", vec!["y"]);
        let (ca, cb) = (a.cleanups.clone(), b.cleanups.clone());
        registry.register_tool(a, RegistrationOptions::default()).await.unwrap();
        registry.register_tool(b, RegistrationOptions::default()).await.unwrap();

        registry.clear_all().await;
        assert_eq!(ca.load(Ordering::SeqCst), 1);
        assert_eq!(cb.load(Ordering::SeqCst), 1);
        assert_eq!(registry.stats().total_tools, 0);
    }

    #[tokio::test]
    async fn test_tag_examples_follow_registration() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(StubTool::new("alpha", vec!["run"]), RegistrationOptions::default())
            .await
            .unwrap();
        assert_eq!(registry.tag_schemas()[0].tag_name, "run_tag");
        registry.unregister_tool("alpha").await;
        assert!(registry.tag_examples().is_empty());
        assert!(registry.tag_schemas().is_empty());
    }
}
