//! Host introspection tools: system summary, processes, services, disks.
//!
//! All queries go through CIM rather than the WMI cmdlets, which PowerShell 7
//! no longer ships.

use std::sync::Arc;

use serde::Deserialize;

use crate::process::ProcessSpawner;
use crate::process::quote::quote_literal;
use crate::process::runner::ProcessRunner;
use crate::schema::{ParamKind, ParamSpec};
use crate::tools::{Invocation, ToolEntry, command_handler};

pub const GET_SYSTEM_INFO: &str = "get-system-info";
pub const GET_PROCESS_LIST: &str = "get-process-list";
pub const GET_SERVICE_STATUS: &str = "get-service-status";
pub const CHECK_DISK_SPACE: &str = "check-disk-space";

const SYSTEM_INFO_SCRIPT: &str = r#"& {
    $computerInfo = Get-ComputerInfo
    $osInfo = Get-CimInstance -ClassName Win32_OperatingSystem
    $cpuInfo = Get-CimInstance -ClassName Win32_Processor
    $memInfo = Get-CimInstance -ClassName Win32_PhysicalMemory | Measure-Object -Property Capacity -Sum
    [ordered]@{
        'Computer Name' = $env:COMPUTERNAME
        'OS Name' = $computerInfo.WindowsProductName
        'OS Version' = $computerInfo.WindowsVersion
        'Build Number' = $computerInfo.WindowsBuildLabEx
        'Total RAM (GB)' = [math]::Round($memInfo.Sum / 1GB, 2)
        'CPU Name' = ($cpuInfo | Select-Object -First 1).Name
        'CPU Cores' = ($cpuInfo | Measure-Object -Property NumberOfCores -Sum).Sum
        'CPU Logical Processors' = ($cpuInfo | Measure-Object -Property NumberOfLogicalProcessors -Sum).Sum
        'System Uptime' = ((Get-Date) - $osInfo.LastBootUpTime).ToString()
        'Current User' = $env:USERNAME
        'Computer Domain' = $computerInfo.CsDomain
        'TimeZone' = $computerInfo.TimeZone
        'Last Boot Time' = $osInfo.LastBootUpTime.ToString('o')
    } | ConvertTo-Json -Depth 2
}"#;

/// Calculated column showing working set in megabytes.
const MEMORY_MB_COLUMN: &str =
    "@{Name='Memory(MB)';Expression={[math]::Round($_.WorkingSet / 1MB, 2)}}";

const DISK_COLUMNS: &str = "DeviceID, \
    @{Name='Size(GB)';Expression={[math]::Round($_.Size / 1GB, 2)}}, \
    @{Name='FreeSpace(GB)';Expression={[math]::Round($_.FreeSpace / 1GB, 2)}}, \
    @{Name='UsedSpace(GB)';Expression={[math]::Round(($_.Size - $_.FreeSpace) / 1GB, 2)}}, \
    @{Name='PercentFree';Expression={if ($_.Size) {[math]::Round(($_.FreeSpace / $_.Size) * 100, 2)} else {0}}}, \
    FileSystem, VolumeName";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoParams {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ProcessSort {
    #[serde(rename = "CPU")]
    Cpu,
    Memory,
    Name,
}

impl ProcessSort {
    /// `Sort-Object` arguments for this ordering.
    fn sort_clause(self) -> &'static str {
        match self {
            ProcessSort::Cpu => "Sort-Object -Property CPU -Descending",
            ProcessSort::Memory => "Sort-Object -Property WorkingSet -Descending",
            ProcessSort::Name => "Sort-Object -Property Name -Descending",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessListParams {
    pub process_name: Option<String>,
    pub sort_by: ProcessSort,
    pub limit: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ServiceState {
    Running,
    Stopped,
    All,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatusParams {
    pub service_name: Option<String>,
    pub status: ServiceState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiskSpaceParams {
    pub drive: Option<String>,
}

pub fn system_info_command(_params: NoParams) -> Invocation {
    Invocation::new(SYSTEM_INFO_SCRIPT)
}

pub fn process_list_command(params: ProcessListParams) -> Invocation {
    let mut command = String::from("Get-Process");
    if let Some(name) = params.process_name.as_deref() {
        command.push_str(&format!(
            " -Name {} -ErrorAction SilentlyContinue",
            quote_literal(&format!("*{}*", name))
        ));
    }
    command.push_str(&format!(
        " | {} | Select-Object -First {} Name, Id, CPU, {}, ProcessName | ConvertTo-Json",
        params.sort_by.sort_clause(),
        params.limit,
        MEMORY_MB_COLUMN
    ));
    Invocation::new(command)
}

pub fn service_status_command(params: ServiceStatusParams) -> Invocation {
    let mut command = String::from("Get-Service");
    if let Some(name) = params.service_name.as_deref() {
        command.push_str(&format!(
            " -Name {} -ErrorAction SilentlyContinue",
            quote_literal(&format!("*{}*", name))
        ));
    }
    let state = match params.status {
        ServiceState::Running => Some("Running"),
        ServiceState::Stopped => Some("Stopped"),
        ServiceState::All => None,
    };
    if let Some(state) = state {
        command.push_str(&format!(
            " | Where-Object {{ $_.Status -eq {} }}",
            quote_literal(state)
        ));
    }
    command.push_str(
        " | Select-Object Name, Status, StartType, DisplayName | Sort-Object Name | ConvertTo-Json",
    );
    Invocation::new(command)
}

pub fn disk_space_command(params: DiskSpaceParams) -> Invocation {
    let mut command = String::from("Get-CimInstance -ClassName Win32_LogicalDisk");
    if let Some(drive) = params.drive.as_deref() {
        command.push_str(&format!(
            " | Where-Object {{ $_.DeviceID -eq {} }}",
            quote_literal(&drive.to_uppercase())
        ));
    }
    command.push_str(&format!(
        " | Select-Object {} | ConvertTo-Json",
        DISK_COLUMNS
    ));
    Invocation::new(command)
}

pub(crate) fn tools<S: ProcessSpawner>(runner: &Arc<ProcessRunner<S>>) -> Vec<ToolEntry> {
    vec![
        ToolEntry {
            name: GET_SYSTEM_INFO,
            description: "Get comprehensive Windows system information including hardware, OS, and performance metrics",
            params: vec![],
            handler: command_handler(runner.clone(), GET_SYSTEM_INFO, system_info_command),
        },
        ToolEntry {
            name: GET_PROCESS_LIST,
            description: "Get list of running processes with CPU and memory usage, optionally filtered by name",
            params: vec![
                ParamSpec::optional(
                    "processName",
                    ParamKind::String,
                    "Optional process name filter",
                ),
                ParamSpec::optional(
                    "sortBy",
                    ParamKind::Enum(&["CPU", "Memory", "Name"]),
                    "Sort processes by CPU, Memory, or Name",
                )
                .with_default("CPU"),
                ParamSpec::optional(
                    "limit",
                    ParamKind::Integer,
                    "Maximum number of processes to return (default: 10)",
                )
                .with_default(10)
                .with_minimum(1),
            ],
            handler: command_handler(runner.clone(), GET_PROCESS_LIST, process_list_command),
        },
        ToolEntry {
            name: GET_SERVICE_STATUS,
            description: "Get Windows service status, optionally filtered by service name or status",
            params: vec![
                ParamSpec::optional(
                    "serviceName",
                    ParamKind::String,
                    "Optional service name filter",
                ),
                ParamSpec::optional(
                    "status",
                    ParamKind::Enum(&["Running", "Stopped", "All"]),
                    "Filter by service status",
                )
                .with_default("All"),
            ],
            handler: command_handler(runner.clone(), GET_SERVICE_STATUS, service_status_command),
        },
        ToolEntry {
            name: CHECK_DISK_SPACE,
            description: "Check disk space usage for all drives or a specific drive",
            params: vec![ParamSpec::optional(
                "drive",
                ParamKind::String,
                "Optional drive letter (e.g., \"C:\", \"D:\") to check specific drive",
            )],
            handler: command_handler(runner.clone(), CHECK_DISK_SPACE, disk_space_command),
        },
    ]
}
