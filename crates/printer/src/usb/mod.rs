//! USB subsystem
//!
//! Device enumeration and raw bulk printing:
//! - [`DeviceDirectory`] lists attached devices and resolves names
//! - [`TransferSession`] runs the permission handshake and bulk writes
//! - [`RusbSource`] reaches the host through libusb

pub mod directory;
pub mod rusb_source;
pub mod session;

pub use directory::DeviceDirectory;
pub use rusb_source::{RusbConnection, RusbSource};
pub use session::{AccessOutcome, BulkOutEndpoint, TRANSFER_TIMEOUT, TransferSession, select_bulk_out};
