//! USB raw printer plugin
//!
//! Enumerates attached USB devices, runs the host permission handshake and
//! writes caller-supplied bytes to a device's bulk-out endpoint. The
//! [`PrinterPlugin`] exposes this as the `list_printers`, `connect_printer`,
//! `print_raw` and `test_print` commands; [`host::serve`] carries those
//! commands over JSON lines.

pub mod config;
pub mod error;
pub mod host;
pub mod payload;
pub mod plugin;
pub mod usb;

pub use error::{PrinterError, Result};
pub use payload::OutOfRangePolicy;
pub use plugin::{PluginOptions, PrinterPlugin};
