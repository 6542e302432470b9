//! The tool catalogue and registry construction.
//!
//! Each tool is a typed parameter struct plus a pure builder that turns it
//! into interpreter script text. Builders never touch the process layer, so
//! the exact command for any argument set can be asserted in tests. Every
//! caller-supplied value reaches the script through
//! `process::quote::quote_literal`; the only exception is the `command`
//! argument of `execute-powershell`, which is script text by definition.

pub mod files;
pub mod powershell;
pub mod system;

use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;

use crate::error::ShellportError;
use crate::process::ProcessSpawner;
use crate::process::runner::{ProcessRunner, RunOptions};
use crate::registry::{ToolHandler, ToolRegistry};
use crate::response::{ToolResult, normalize};
use crate::schema::{ParamSpec, ValidatedArgs};

/// Every tool name this server can expose, in registration order.
pub const CATALOGUE: [&str; 10] = [
    powershell::EXECUTE_POWERSHELL,
    powershell::EXECUTE_POWERSHELL_SCRIPT,
    powershell::CREATE_POWERSHELL_SCRIPT,
    system::GET_SYSTEM_INFO,
    system::GET_PROCESS_LIST,
    system::GET_SERVICE_STATUS,
    system::CHECK_DISK_SPACE,
    files::LIST_DIRECTORY,
    files::GET_FILE_INFO,
    files::SEARCH_FILES,
];

/// Script text and run options produced by a tool's builder.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub command: String,
    pub options: RunOptions,
}

impl Invocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            options: RunOptions::default(),
        }
    }

    pub fn in_directory(mut self, dir: Option<String>) -> Self {
        self.options = RunOptions::in_directory(dir);
        self
    }
}

/// A tool ready to be registered.
pub struct ToolEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub handler: ToolHandler,
}

/// Wrap a builder as a handler: parse params, build the script, run it, normalize.
pub(crate) fn command_handler<S, P>(
    runner: Arc<ProcessRunner<S>>,
    tool: &'static str,
    build: fn(P) -> Invocation,
) -> ToolHandler
where
    S: ProcessSpawner,
    P: DeserializeOwned + Send + 'static,
{
    Arc::new(move |args: ValidatedArgs| {
        let runner = runner.clone();
        async move {
            let params: P = match args.parse() {
                Ok(params) => params,
                Err(e) => {
                    tracing::error!(tool = %tool, error = %e, "validated arguments did not fit parameter type");
                    return ToolResult::error(format!(
                        "Invalid arguments for tool '{}': {}",
                        tool, e
                    ));
                }
            };

            let invocation = build(params);
            let result = runner.run(&invocation.command, &invocation.options).await;

            tracing::info!(
                tool = %tool,
                success = result.success,
                duration_ms = %result.duration.as_millis(),
                "tool invocation"
            );

            normalize(result)
        }
        .boxed()
    })
}

/// Build the immutable registry of all catalogue tools except `disabled`.
///
/// Called once at startup. A duplicate name is a programming error and
/// fails the build; so does a disabled name that is not in the catalogue.
pub fn build_registry<S: ProcessSpawner>(
    runner: Arc<ProcessRunner<S>>,
    disabled: &[String],
) -> crate::Result<ToolRegistry> {
    if let Some(unknown) = disabled.iter().find(|d| !CATALOGUE.contains(&d.as_str())) {
        return Err(ShellportError::InvalidConfig(format!(
            "cannot disable unknown tool '{}'",
            unknown
        )));
    }

    let entries = powershell::tools(&runner)
        .into_iter()
        .chain(system::tools(&runner))
        .chain(files::tools(&runner));

    let mut registry = ToolRegistry::new();
    for entry in entries {
        if disabled.iter().any(|d| d == entry.name) {
            tracing::debug!(tool = %entry.name, "skipping disabled tool");
            continue;
        }
        registry.register(entry.name, entry.description, entry.params, entry.handler)?;
    }

    tracing::info!(
        tool_count = registry.len(),
        executable = %runner.executable(),
        "tool registry built"
    );
    Ok(registry)
}
