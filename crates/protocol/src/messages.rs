//! Plugin message definitions
//!
//! The shell talks to the plugin with request/response pairs:
//! - an [`Invoke`] names a command and carries its JSON arguments
//! - an [`InvokeResponse`] either resolves with a JSON payload or rejects
//!   with a human-readable reason
//!
//! Permission decisions arrive outside this request/response flow and are
//! delivered to the shell as [`HostEvent`]s.

use crate::types::{DeviceDescriptor, PermissionState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Plugin name used in `plugin:<name>|<command>` invocations
pub const PLUGIN_NAME: &str = "printer";

/// Commands exposed by the printer plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Enumerate attached USB devices
    ListPrinters,
    /// Check or request permission to open a device
    ConnectPrinter,
    /// Write raw bytes to a device's bulk-out endpoint
    PrintRaw,
    /// Diagnostic no-op
    TestPrint,
}

impl Command {
    /// All commands, in the order they are listed to users
    pub const ALL: [Command; 4] = [
        Command::ListPrinters,
        Command::ConnectPrinter,
        Command::PrintRaw,
        Command::TestPrint,
    ];

    /// Wire name of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::ListPrinters => "list_printers",
            Command::ConnectPrinter => "connect_printer",
            Command::PrintRaw => "print_raw",
            Command::TestPrint => "test_print",
        }
    }

    /// Parse a command name
    ///
    /// Accepts both the bare name (`print_raw`) and the shell's qualified
    /// form (`plugin:printer|print_raw`).
    pub fn parse(name: &str) -> Option<Self> {
        let bare = match name.strip_prefix("plugin:") {
            Some(qualified) => {
                let (plugin, command) = qualified.split_once('|')?;
                if plugin != PLUGIN_NAME {
                    return None;
                }
                command
            }
            None => name,
        };

        Self::ALL.into_iter().find(|cmd| cmd.as_str() == bare)
    }
}

/// A single command invocation from the shell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoke {
    /// Caller-chosen id echoed back in the response
    pub id: u64,
    /// Command name, bare or `plugin:printer|` qualified
    pub cmd: String,
    /// Command arguments
    #[serde(default)]
    pub args: Value,
}

/// Outcome of an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InvokeResult {
    /// The command completed and produced `data`
    Resolved {
        /// Command-specific response payload
        data: Value,
    },
    /// The command was refused
    Rejected {
        /// Human-readable reason
        error: String,
    },
}

/// Response to an [`Invoke`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    /// Id of the invocation, `None` when the request could not be parsed
    pub id: Option<u64>,
    /// Outcome
    #[serde(flatten)]
    pub result: InvokeResult,
}

impl InvokeResponse {
    /// Build a resolved response
    pub fn resolved(id: Option<u64>, data: Value) -> Self {
        Self {
            id,
            result: InvokeResult::Resolved { data },
        }
    }

    /// Build a rejected response
    pub fn rejected(id: Option<u64>, error: impl Into<String>) -> Self {
        Self {
            id,
            result: InvokeResult::Rejected {
                error: error.into(),
            },
        }
    }

    /// Whether the invocation resolved
    pub fn is_resolved(&self) -> bool {
        matches!(self.result, InvokeResult::Resolved { .. })
    }
}

/// Unsolicited notification pushed to the shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum HostEvent {
    /// A permission request was issued or decided
    Permission {
        /// Device the permission applies to
        #[serde(rename = "deviceName")]
        device_name: String,
        /// Current state of the request
        state: PermissionState,
    },
}

/// Arguments of `connect_printer`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPrinterArgs {
    pub device_name: Option<String>,
}

/// Arguments of `print_raw`
///
/// `data` is a list of integers as produced by a JSON array of numbers.
/// Conversion to bytes happens in the plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRawArgs {
    pub device_name: Option<String>,
    pub data: Option<Vec<i64>>,
}

/// Arguments of `test_print`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestPrintArgs {
    pub value: Option<String>,
}

/// Response of `list_printers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPrintersResponse {
    pub printers: Vec<DeviceDescriptor>,
}

/// Response of `connect_printer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectPrinterResponse {
    /// `true` if the permission grant is already present
    pub success: bool,
    pub message: String,
}

/// Response of `print_raw`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRawResponse {
    pub success: bool,
    /// Bytes reported written by the transfer; may be less than requested
    pub bytes_written: usize,
}
