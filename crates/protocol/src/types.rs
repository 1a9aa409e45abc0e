//! Device and result type definitions
//!
//! These are the shapes the application shell sees. Field names follow the
//! shell's camelCase convention on the wire.

use serde::{Deserialize, Serialize};

/// Name reported when a device does not provide a manufacturer or product string
pub const UNKNOWN_NAME: &str = "Unknown";

/// One attached USB device as presented to the shell
///
/// An immutable snapshot of the host device table taken at enumeration time.
/// Descriptors are re-derived on every listing and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Platform-stable device identifier, used as the selector for all other commands
    pub device_name: String,
    /// Numeric device id
    pub device_id: u32,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Manufacturer string, or [`UNKNOWN_NAME`]
    pub manufacturer_name: String,
    /// Product string, or [`UNKNOWN_NAME`]
    pub product_name: String,
}

impl DeviceDescriptor {
    /// Build a descriptor, substituting [`UNKNOWN_NAME`] for absent strings
    pub fn new(
        device_name: impl Into<String>,
        device_id: u32,
        vendor_id: u16,
        product_id: u16,
        manufacturer_name: Option<String>,
        product_name: Option<String>,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            device_id,
            vendor_id,
            product_id,
            manufacturer_name: manufacturer_name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            product_name: product_name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        }
    }

    /// Short human-readable label, e.g. `04b8:0202 EPSON TM-T20`
    pub fn label(&self) -> String {
        format!(
            "{:04x}:{:04x} {} {}",
            self.vendor_id, self.product_id, self.manufacturer_name, self.product_name
        )
    }
}

/// State carried by a permission notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// A permission request was issued and awaits a decision
    Requested,
    /// Access was granted
    Granted,
    /// Access was denied
    Denied,
}
