//! ToolRegistry: name → {description, parameter schema, handler}.
//!
//! The registry is filled once at startup (see `tools::build_registry`) and
//! is read-only afterwards. `dispatch` is the only way a tool runs: it
//! validates arguments against the tool's schema, invokes the handler, and
//! converts validation failures and handler panics into error envelopes so
//! nothing escapes to the session loop. Only an unknown tool name is
//! returned as an `Err`.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use rmcp::model::Tool;
use serde_json::{Map, Value};

use crate::error::ShellportError;
use crate::process::runner::ExecutionResult;
use crate::response::{ToolResult, normalize};
use crate::schema::{ParamSpec, ValidatedArgs, to_json_schema, validate};

/// Async tool body. Receives validated arguments, always yields an envelope.
pub type ToolHandler = Arc<dyn Fn(ValidatedArgs) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// A registered tool.
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    handler: ToolHandler,
}

impl ToolDefinition {
    /// Render as an MCP tool listing entry.
    pub fn to_mcp_tool(&self) -> Tool {
        Tool {
            name: self.name.clone().into(),
            title: None,
            description: Some(self.description.clone().into()),
            input_schema: Arc::new(to_json_schema(&self.params)),
            output_schema: None,
            annotations: None,
            icons: None,
            meta: None,
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Registry of tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        handler: ToolHandler,
    ) -> crate::Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ShellportError::DuplicateTool(name));
        }

        tracing::debug!(tool = %name, params = params.len(), "registering tool");
        self.index.insert(name.clone(), self.tools.len());
        self.tools.push(ToolDefinition {
            name,
            description: description.into(),
            params,
            handler,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tools as MCP listing entries.
    pub fn mcp_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDefinition::to_mcp_tool).collect()
    }

    /// Validate `arguments` and run the named tool.
    ///
    /// Returns `UnknownTool` without running anything when the name is not
    /// registered. Every other outcome, including invalid arguments and a
    /// panicking handler, is an `Ok` envelope.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<&Map<String, Value>>,
    ) -> crate::Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| ShellportError::UnknownTool(name.to_string()))?;

        let args = match validate(&tool.params, arguments) {
            Ok(args) => args,
            Err(e) => {
                let err = ShellportError::InvalidArguments(name.to_string(), e);
                tracing::warn!(tool = %name, error = %err, "rejected tool call");
                return Ok(ToolResult::error(capitalize(&err.to_string())));
            }
        };

        let call = (tool.handler)(args);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => Ok(result),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(tool = %name, panic = %message, "tool handler panicked");
                Ok(normalize(ExecutionResult::failed(
                    format!("handler panicked: {}", message),
                    std::time::Duration::ZERO,
                )))
            }
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> ToolHandler {
        Arc::new(move |args: ValidatedArgs| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let text = args
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("none")
                    .to_string();
                ToolResult::success(text)
            }
            .boxed()
        })
    }

    fn echo_registry(counter: Arc<AtomicUsize>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "echo",
                "Echo a message",
                vec![ParamSpec::required("message", ParamKind::String, "text")],
                counting_handler(counter),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = echo_registry(counter.clone());
        let result = registry.register("echo", "again", vec![], counting_handler(counter));
        assert!(matches!(result, Err(ShellportError::DuplicateTool(n)) if n == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_runs_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = echo_registry(counter.clone());
        let args = json!({ "message": "hi" });
        let result = registry
            .dispatch("echo", args.as_object())
            .await
            .unwrap();
        assert_eq!(result, ToolResult::success("hi"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_run_handlers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = echo_registry(counter.clone());
        let result = registry.dispatch("nope", None).await;
        assert!(matches!(result, Err(ShellportError::UnknownTool(n)) if n == "nope"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_error_envelope() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = echo_registry(counter.clone());
        let result = registry.dispatch("echo", None).await.unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            "Invalid arguments for tool 'echo': missing required parameter 'message'"
        );
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_panic_is_normalized() {
        let mut registry = ToolRegistry::new();
        fn explode() -> ToolResult {
            panic!("boom")
        }
        let handler: ToolHandler = Arc::new(|_args: ValidatedArgs| async { explode() }.boxed());
        registry.register("explode", "Panics", vec![], handler).unwrap();

        let result = registry.dispatch("explode", None).await.unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            "Error executing command: handler panicked: boom"
        );
    }

    #[test]
    fn test_names_keep_registration_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        for name in ["b", "a", "c"] {
            registry
                .register(name, name, vec![], counting_handler(counter.clone()))
                .unwrap();
        }
        assert_eq!(registry.names(), vec!["b", "a", "c"]);
        assert!(registry.contains("a"));
        assert!(!registry.contains("d"));
    }

    #[test]
    fn test_mcp_tool_listing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = echo_registry(counter);
        let tools = registry.mcp_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[0].description.as_deref(), Some("Echo a message"));
        assert_eq!(tools[0].input_schema["required"], json!(["message"]));
    }
}
