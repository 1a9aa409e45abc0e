//! Printer plugin command surface
//!
//! Parses shell arguments, runs the directory/session operations and shapes
//! their results. Argument checks happen here, before any USB access.

use crate::error::{PrinterError, Result};
use crate::payload::{self, OutOfRangePolicy};
use crate::usb::{DeviceDirectory, TransferSession};
use common::DeviceSource;
use protocol::{
    Command, ConnectPrinterArgs, ConnectPrinterResponse, Invoke, InvokeResponse,
    ListPrintersResponse, PrintRawArgs, PrintRawResponse, TestPrintArgs,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Behavior switches taken from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginOptions {
    /// Detach kernel drivers before claiming an interface
    pub force_detach: bool,
    /// Handling of print data values outside the byte range
    pub out_of_range: OutOfRangePolicy,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            force_detach: true,
            out_of_range: OutOfRangePolicy::Strict,
        }
    }
}

/// The printer plugin
///
/// Holds no mutable state; one instance can serve concurrent invocations.
pub struct PrinterPlugin<S> {
    directory: DeviceDirectory<S>,
    session: TransferSession<S>,
    out_of_range: OutOfRangePolicy,
}

impl<S: DeviceSource> PrinterPlugin<S> {
    pub fn new(source: Arc<S>, options: PluginOptions) -> Self {
        Self {
            directory: DeviceDirectory::new(Arc::clone(&source)),
            session: TransferSession::new(source, options.force_detach),
            out_of_range: options.out_of_range,
        }
    }

    /// `list_printers`
    pub fn list_printers(&self) -> Result<ListPrintersResponse> {
        Ok(ListPrintersResponse {
            printers: self.directory.list()?,
        })
    }

    /// `connect_printer`
    pub fn connect_printer(&self, args: ConnectPrinterArgs) -> Result<ConnectPrinterResponse> {
        let device_name = args.device_name.ok_or(PrinterError::MissingDeviceName)?;
        let outcome = self.session.request_access(&device_name)?;

        Ok(ConnectPrinterResponse {
            success: outcome.granted(),
            message: outcome.message().to_string(),
        })
    }

    /// `print_raw`
    pub fn print_raw(&self, args: PrintRawArgs) -> Result<PrintRawResponse> {
        let (device_name, data) = match (args.device_name, args.data) {
            (Some(device_name), Some(data)) => (device_name, data),
            _ => return Err(PrinterError::MissingPrintArguments),
        };

        let bytes = payload::to_bytes(&data, self.out_of_range)?;
        let bytes_written = self.session.write(&device_name, &bytes)?;

        Ok(PrintRawResponse {
            success: true,
            bytes_written,
        })
    }

    /// `test_print`: diagnostic acknowledgement
    pub fn test_print(&self, args: TestPrintArgs) {
        info!(
            "test_print received with value: {}",
            args.value.as_deref().unwrap_or("<none>")
        );
    }

    /// Run a command by name with raw JSON arguments
    pub fn dispatch(&self, cmd: &str, args: Value) -> Result<Value> {
        let command =
            Command::parse(cmd).ok_or_else(|| PrinterError::UnknownCommand(cmd.to_string()))?;
        debug!("Dispatching {}", command.as_str());

        let response = match command {
            Command::ListPrinters => serde_json::to_value(self.list_printers()?)?,
            Command::ConnectPrinter => {
                serde_json::to_value(self.connect_printer(parse_args(args)?)?)?
            }
            Command::PrintRaw => serde_json::to_value(self.print_raw(parse_args(args)?)?)?,
            Command::TestPrint => {
                self.test_print(parse_args(args)?);
                Value::Null
            }
        };
        Ok(response)
    }

    /// Run an invocation and build its response
    pub fn invoke(&self, invoke: Invoke) -> InvokeResponse {
        match self.dispatch(&invoke.cmd, invoke.args) {
            Ok(data) => InvokeResponse::resolved(Some(invoke.id), data),
            Err(e) => {
                warn!("{} (id {}) rejected: {}", invoke.cmd, invoke.id, e);
                InvokeResponse::rejected(Some(invoke.id), e.to_string())
            }
        }
    }
}

/// Parse command arguments; absent arguments mean all fields absent
fn parse_args<T: DeserializeOwned + Default>(args: Value) -> Result<T> {
    if args.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(args).map_err(|e| PrinterError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{FakeDeviceSource, mock_printer};
    use serde_json::json;

    fn plugin(source: &FakeDeviceSource) -> PrinterPlugin<FakeDeviceSource> {
        PrinterPlugin::new(Arc::new(source.clone()), PluginOptions::default())
    }

    #[test]
    fn test_parse_args_null_is_default() {
        let args: PrintRawArgs = parse_args(Value::Null).unwrap();
        assert!(args.device_name.is_none());
    }

    #[test]
    fn test_parse_args_wrong_shape() {
        let result: Result<PrintRawArgs> = parse_args(json!({"data": "hello"}));
        assert!(matches!(result, Err(PrinterError::InvalidArguments(_))));
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let source = FakeDeviceSource::new();
        let err = plugin(&source).dispatch("open_drawer", Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "Unknown command: open_drawer");
    }

    #[test]
    fn test_test_print_resolves_with_null() {
        let source = FakeDeviceSource::new();
        let data = plugin(&source)
            .dispatch("plugin:printer|test_print", json!({"value": "ping"}))
            .unwrap();
        assert!(data.is_null());
        assert_eq!(source.enumerations(), 0);
    }

    #[test]
    fn test_invalid_data_rejected_before_usb() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001").permitted());
        let err = plugin(&source)
            .print_raw(PrintRawArgs {
                device_name: Some("USB001".to_string()),
                data: Some(vec![27, 64, 999]),
            })
            .unwrap_err();

        assert!(matches!(err, PrinterError::InvalidData { index: 2, value: 999 }));
        assert_eq!(source.opens(), 0);
    }

    #[test]
    fn test_truncate_policy_allows_out_of_range() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001").permitted());
        let plugin = PrinterPlugin::new(
            Arc::new(source.clone()),
            PluginOptions {
                force_detach: false,
                out_of_range: OutOfRangePolicy::Truncate,
            },
        );

        let response = plugin
            .print_raw(PrintRawArgs {
                device_name: Some("USB001".to_string()),
                data: Some(vec![0x141]),
            })
            .unwrap();

        assert_eq!(response.bytes_written, 1);
        assert_eq!(source.writes()[0].data, vec![0x41]);
        assert!(!source.claims()[0].force_detach);
    }
}
