//! Protocol library for the USB printer plugin
//!
//! This crate defines the messages exchanged between the application shell and
//! the printer plugin: device descriptors, command invocations and their
//! argument/response shapes, and unsolicited host events. Messages travel as
//! JSON lines.
//!
//! # Example
//!
//! ```
//! use protocol::{Command, decode_invoke};
//!
//! let invoke = decode_invoke(
//!     r#"{"id":1,"cmd":"plugin:printer|connect_printer","args":{"deviceName":"USB001"}}"#,
//! )
//! .unwrap();
//!
//! assert_eq!(Command::parse(&invoke.cmd), Some(Command::ConnectPrinter));
//! assert_eq!(invoke.args["deviceName"], "USB001");
//! ```

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;

pub use codec::{MAX_LINE_SIZE, decode_invoke, encode_line};

#[cfg(feature = "async")]
pub use codec::{LineReader, write_line_async};
pub use error::{ProtocolError, Result};
pub use messages::{
    Command, ConnectPrinterArgs, ConnectPrinterResponse, HostEvent, Invoke, InvokeResponse,
    InvokeResult, ListPrintersResponse, PLUGIN_NAME, PrintRawArgs, PrintRawResponse,
    TestPrintArgs,
};
pub use types::{DeviceDescriptor, PermissionState, UNKNOWN_NAME};
