//! File system tools: directory listing, item details, pattern search.

use std::sync::Arc;

use serde::Deserialize;

use crate::process::ProcessSpawner;
use crate::process::quote::quote_literal;
use crate::process::runner::ProcessRunner;
use crate::schema::{ParamKind, ParamSpec};
use crate::tools::{Invocation, ToolEntry, command_handler};

pub const LIST_DIRECTORY: &str = "list-directory";
pub const GET_FILE_INFO: &str = "get-file-info";
pub const SEARCH_FILES: &str = "search-files";

/// Directory entries show as `Directory`, everything else as `File`.
const TYPE_COLUMN: &str =
    "@{Name='Type';Expression={if ($_.PSIsContainer) {'Directory'} else {'File'}}}";

const SIZE_COLUMN: &str = "@{Name='Size(KB)';Expression={if (-not $_.PSIsContainer) {[math]::Round($_.Length / 1KB, 2)} else {$null}}}";

#[derive(Debug, Clone, Deserialize)]
pub struct ListDirectoryParams {
    pub path: String,
    pub filter: Option<String>,
    pub detailed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfoParams {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilesParams {
    pub search_path: String,
    pub pattern: String,
    pub recursive: bool,
    pub limit: i64,
}

pub fn list_directory_command(params: ListDirectoryParams) -> Invocation {
    let mut command = format!("Get-ChildItem -Path {}", quote_literal(&params.path));
    if let Some(filter) = params.filter.as_deref() {
        command.push_str(&format!(" -Filter {}", quote_literal(filter)));
    }
    command.push_str(" -ErrorAction SilentlyContinue | ");
    if params.detailed {
        command.push_str(&format!(
            "Select-Object Name, {}, {}, LastWriteTime, CreationTime, Attributes, FullName",
            TYPE_COLUMN, SIZE_COLUMN
        ));
    } else {
        command.push_str(&format!("Select-Object Name, {}, LastWriteTime", TYPE_COLUMN));
    }
    command.push_str(" | ConvertTo-Json");
    Invocation::new(command)
}

pub fn file_info_command(params: FileInfoParams) -> Invocation {
    let path = quote_literal(&params.path);
    let command = format!(
        r#"& {{
    $item = Get-Item -Path {path} -ErrorAction SilentlyContinue
    if ($item) {{
        $info = [ordered]@{{
            'Name' = $item.Name
            'FullName' = $item.FullName
            'Type' = if ($item.PSIsContainer) {{ 'Directory' }} else {{ 'File' }}
            'CreationTime' = $item.CreationTime.ToString('o')
            'LastWriteTime' = $item.LastWriteTime.ToString('o')
            'LastAccessTime' = $item.LastAccessTime.ToString('o')
            'Attributes' = $item.Attributes.ToString()
        }}
        if (-not $item.PSIsContainer) {{
            $info['Size(Bytes)'] = $item.Length
            $info['Size(KB)'] = [math]::Round($item.Length / 1KB, 2)
            $info['Size(MB)'] = [math]::Round($item.Length / 1MB, 2)
            $info['Extension'] = $item.Extension
        }}
        $info | ConvertTo-Json
    }} else {{
        Write-Error ('File or directory not found: ' + {path})
    }}
}}"#
    );
    Invocation::new(command)
}

pub fn search_files_command(params: SearchFilesParams) -> Invocation {
    let mut command = format!(
        "Get-ChildItem -Path {} -Filter {}",
        quote_literal(&params.search_path),
        quote_literal(&params.pattern)
    );
    if params.recursive {
        command.push_str(" -Recurse");
    }
    command.push_str(&format!(
        " -ErrorAction SilentlyContinue | Select-Object -First {} Name, FullName, {}, LastWriteTime | ConvertTo-Json",
        params.limit, TYPE_COLUMN
    ));
    Invocation::new(command)
}

pub(crate) fn tools<S: ProcessSpawner>(runner: &Arc<ProcessRunner<S>>) -> Vec<ToolEntry> {
    vec![
        ToolEntry {
            name: LIST_DIRECTORY,
            description: "List directory contents with detailed file information",
            params: vec![
                ParamSpec::required("path", ParamKind::String, "Directory path to list"),
                ParamSpec::optional(
                    "filter",
                    ParamKind::String,
                    "Optional file filter pattern (e.g., \"*.txt\")",
                ),
                ParamSpec::optional(
                    "detailed",
                    ParamKind::Bool,
                    "Show detailed file information",
                )
                .with_default(false),
            ],
            handler: command_handler(runner.clone(), LIST_DIRECTORY, list_directory_command),
        },
        ToolEntry {
            name: GET_FILE_INFO,
            description: "Get detailed information about a specific file or directory",
            params: vec![ParamSpec::required(
                "path",
                ParamKind::String,
                "Path to the file or directory",
            )],
            handler: command_handler(runner.clone(), GET_FILE_INFO, file_info_command),
        },
        ToolEntry {
            name: SEARCH_FILES,
            description: "Search for files matching a pattern in specified directories",
            params: vec![
                ParamSpec::required(
                    "searchPath",
                    ParamKind::String,
                    "Directory path to search in",
                ),
                ParamSpec::required(
                    "pattern",
                    ParamKind::String,
                    "File name pattern to search for (supports wildcards)",
                ),
                ParamSpec::optional(
                    "recursive",
                    ParamKind::Bool,
                    "Search recursively in subdirectories",
                )
                .with_default(true),
                ParamSpec::optional(
                    "limit",
                    ParamKind::Integer,
                    "Maximum number of results to return",
                )
                .with_default(50)
                .with_minimum(1),
            ],
            handler: command_handler(runner.clone(), SEARCH_FILES, search_files_command),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_directory_simple() {
        let invocation = list_directory_command(ListDirectoryParams {
            path: "C:\\Users".to_string(),
            filter: None,
            detailed: false,
        });
        assert!(invocation.command.starts_with(
            "Get-ChildItem -Path 'C:\\Users' -ErrorAction SilentlyContinue | Select-Object Name, @{Name='Type'"
        ));
        assert!(!invocation.command.contains("Size(KB)"));
        assert!(invocation.command.ends_with("| ConvertTo-Json"));
    }

    #[test]
    fn test_list_directory_detailed_with_filter() {
        let invocation = list_directory_command(ListDirectoryParams {
            path: "/var/log".to_string(),
            filter: Some("*.log".to_string()),
            detailed: true,
        });
        assert!(invocation
            .command
            .starts_with("Get-ChildItem -Path '/var/log' -Filter '*.log' -ErrorAction"));
        assert!(invocation.command.contains("Size(KB)"));
        assert!(invocation.command.contains("CreationTime, Attributes, FullName"));
    }

    #[test]
    fn test_file_info_quotes_path_in_both_places() {
        let invocation = file_info_command(FileInfoParams {
            path: "C:\\it's here.txt".to_string(),
        });
        assert!(invocation
            .command
            .contains("Get-Item -Path 'C:\\it''s here.txt' -ErrorAction SilentlyContinue"));
        assert!(invocation
            .command
            .contains("Write-Error ('File or directory not found: ' + 'C:\\it''s here.txt')"));
        assert!(invocation.command.starts_with("& {"));
        assert!(invocation.command.ends_with('}'));
    }

    #[test]
    fn test_search_files_recursive_with_limit() {
        let invocation = search_files_command(SearchFilesParams {
            search_path: "C:\\src".to_string(),
            pattern: "*.rs".to_string(),
            recursive: true,
            limit: 50,
        });
        assert!(invocation
            .command
            .starts_with("Get-ChildItem -Path 'C:\\src' -Filter '*.rs' -Recurse -ErrorAction SilentlyContinue"));
        assert!(invocation.command.contains("Select-Object -First 50 Name, FullName"));
    }

    #[test]
    fn test_search_files_non_recursive() {
        let invocation = search_files_command(SearchFilesParams {
            search_path: ".".to_string(),
            pattern: "*.toml".to_string(),
            recursive: false,
            limit: 3,
        });
        assert!(!invocation.command.contains("-Recurse"));
        assert!(invocation.command.contains("-First 3 "));
    }

    #[test]
    fn test_search_pattern_cannot_break_out() {
        let invocation = search_files_command(SearchFilesParams {
            search_path: "C:\\".to_string(),
            pattern: "*' | Remove-Item; '".to_string(),
            recursive: false,
            limit: 1,
        });
        assert!(invocation.command.contains("-Filter '*'' | Remove-Item; '''"));
    }
}
