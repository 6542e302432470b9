//! PowerShell execution tools: run a command, run a script file, write a script file.

use std::sync::Arc;

use serde::Deserialize;

use crate::process::ProcessSpawner;
use crate::process::quote::{quote_all, quote_literal};
use crate::process::runner::ProcessRunner;
use crate::schema::{ParamKind, ParamSpec};
use crate::tools::{Invocation, ToolEntry, command_handler};

pub const EXECUTE_POWERSHELL: &str = "execute-powershell";
pub const EXECUTE_POWERSHELL_SCRIPT: &str = "execute-powershell-script";
pub const CREATE_POWERSHELL_SCRIPT: &str = "create-powershell-script";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteParams {
    pub command: String,
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteScriptParams {
    pub script_path: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScriptParams {
    pub script_path: String,
    pub content: String,
    pub executable: bool,
}

/// The command text is passed through untouched: running it is the point.
pub fn execute_command(params: ExecuteParams) -> Invocation {
    Invocation::new(params.command).in_directory(params.working_directory)
}

pub fn execute_script_command(params: ExecuteScriptParams) -> Invocation {
    let mut command = format!("& {}", quote_literal(&params.script_path));
    if !params.parameters.is_empty() {
        command.push(' ');
        command.push_str(&quote_all(&params.parameters));
    }
    Invocation::new(command).in_directory(params.working_directory)
}

/// Write the script with `Set-Content`, optionally making it runnable.
///
/// On Windows "executable" means allowing local scripts for the current user
/// (RemoteSigned); elsewhere it means setting the execute bit.
pub fn create_script_command(params: CreateScriptParams) -> Invocation {
    let path = quote_literal(&params.script_path);
    let mut command = String::from("& {\n");
    command.push_str(&format!(
        "    Set-Content -LiteralPath {} -Value {} -Encoding UTF8 -ErrorAction Stop\n",
        path,
        quote_literal(&params.content)
    ));
    if params.executable {
        command.push_str(
            "    if ($IsWindows -or $PSVersionTable.PSEdition -eq 'Desktop') {\n        Set-ExecutionPolicy -ExecutionPolicy RemoteSigned -Scope CurrentUser -Force -ErrorAction Stop\n    } else {\n",
        );
        command.push_str(&format!("        chmod +x -- {}\n    }}\n", path));
    }
    command.push_str(&format!(
        "    Write-Output ('Script created successfully at: ' + {})\n}}",
        path
    ));
    Invocation::new(command)
}

pub(crate) fn tools<S: ProcessSpawner>(runner: &Arc<ProcessRunner<S>>) -> Vec<ToolEntry> {
    vec![
        ToolEntry {
            name: EXECUTE_POWERSHELL,
            description: "Execute a PowerShell command with optional working directory",
            params: vec![
                ParamSpec::required(
                    "command",
                    ParamKind::String,
                    "The PowerShell command to execute",
                ),
                ParamSpec::optional(
                    "workingDirectory",
                    ParamKind::String,
                    "Optional working directory for command execution",
                ),
            ],
            handler: command_handler(runner.clone(), EXECUTE_POWERSHELL, execute_command),
        },
        ToolEntry {
            name: EXECUTE_POWERSHELL_SCRIPT,
            description: "Execute a PowerShell script file with optional parameters",
            params: vec![
                ParamSpec::required(
                    "scriptPath",
                    ParamKind::String,
                    "Path to the PowerShell script file (.ps1)",
                ),
                ParamSpec::optional(
                    "parameters",
                    ParamKind::StringArray,
                    "Optional parameters to pass to the script",
                ),
                ParamSpec::optional(
                    "workingDirectory",
                    ParamKind::String,
                    "Optional working directory for script execution",
                ),
            ],
            handler: command_handler(
                runner.clone(),
                EXECUTE_POWERSHELL_SCRIPT,
                execute_script_command,
            ),
        },
        ToolEntry {
            name: CREATE_POWERSHELL_SCRIPT,
            description: "Create a new PowerShell script file with specified content",
            params: vec![
                ParamSpec::required(
                    "scriptPath",
                    ParamKind::String,
                    "Path where to create the PowerShell script (.ps1)",
                ),
                ParamSpec::required("content", ParamKind::String, "PowerShell script content"),
                ParamSpec::optional(
                    "executable",
                    ParamKind::Bool,
                    "Make the script executable (default: true)",
                )
                .with_default(true),
            ],
            handler: command_handler(
                runner.clone(),
                CREATE_POWERSHELL_SCRIPT,
                create_script_command,
            ),
        },
    ]
}
