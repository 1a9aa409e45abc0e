//! Common utilities for the USB printer plugin
//!
//! This crate provides shared functionality for the plugin crates: the
//! [`DeviceSource`] capability over the host USB subsystem, the permission
//! event bridge, error handling and logging setup.

pub mod channel;
pub mod error;
pub mod logging;
pub mod usb_types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use channel::{PermissionEvent, PermissionEvents, PermissionNotifier, create_permission_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use usb_types::{
    DeviceConnection, DeviceSource, EndpointDirection, EndpointInfo, InterfaceInfo, NativeDevice,
    TransferKind,
};
