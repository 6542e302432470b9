//! shellport: MCP server exposing PowerShell execution and host introspection.
//!
//! Each tool call is validated against a declared schema, turned into a
//! PowerShell script with every caller value quoted as a literal, run in a
//! fresh interpreter process, and returned as a uniform text envelope.

pub mod config;
pub mod error;
pub mod process;
pub mod registry;
pub mod response;
pub mod schema;
pub mod server;
pub mod tools;

pub use config::{
    InterpreterConfig, ShellportConfig, ToolsConfig, parse_env_ref, resolve_env_vars,
};
pub use error::{Result, ShellportError};
pub use process::quote::quote_literal;
pub use process::runner::{ExecutionResult, ProcessRunner, RunOptions};
pub use process::{CapturedOutput, ProcessHandle, ProcessSpawner, TokioSpawner};
pub use registry::{ToolDefinition, ToolHandler, ToolRegistry};
pub use response::{ToolResult, normalize};
pub use schema::{ParamKind, ParamSpec, ValidatedArgs, ValidationError};
pub use server::{SessionState, SessionTracker, ShellportMcpServer, run_session};
pub use tools::{CATALOGUE, build_registry};
