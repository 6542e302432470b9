//! ShellportMcpServer: rmcp ServerHandler backed by the immutable ToolRegistry.
//!
//! Tool listing and tool calls are delegated to the registry. Each clone made
//! with `for_new_session` shares the registry but tracks its own session
//! state, so the HTTP mode can hand one instance to every connecting client.

pub mod session;

use std::sync::Arc;

use rmcp::ErrorData as McpError;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{NotificationContext, RequestContext, RoleServer};

use crate::error::ShellportError;
use crate::registry::ToolRegistry;

pub use session::{SessionState, SessionTracker, run_session};

#[derive(Clone)]
pub struct ShellportMcpServer {
    registry: Arc<ToolRegistry>,
    session: SessionTracker,
}

impl ShellportMcpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            session: SessionTracker::new(),
        }
    }

    /// A server sharing this registry with a fresh session tracker.
    pub fn for_new_session(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            session: SessionTracker::new(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn session(&self) -> &SessionTracker {
        &self.session
    }
}

impl ServerHandler for ShellportMcpServer {
    /// Return server metadata: name "shellport", tool capabilities enabled.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "shellport".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Runs PowerShell commands and scripts and reports on processes, services, disks and files of this host."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.registry.mcp_tools(),
            next_cursor: None,
            meta: None,
        })
    }

    /// Dispatch through the registry. Only an unknown tool name is a
    /// protocol error; every other outcome is a result envelope.
    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let _call = self.session.begin_call();
        match self
            .registry
            .dispatch(&request.name, request.arguments.as_ref())
            .await
        {
            Ok(result) => Ok(result.into()),
            Err(e @ ShellportError::UnknownTool(_)) => {
                tracing::warn!(tool = %request.name, "call for unknown tool");
                Err(McpError::invalid_params(e.to_string(), None))
            }
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    async fn on_initialized(&self, _context: NotificationContext<RoleServer>) {
        tracing::info!("MCP client initialized");
        self.session.mark_ready();
    }
}
