//! Plugin error types
//!
//! Every variant is surfaced to the shell as a rejected call; the display
//! string is the rejection reason.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrinterError {
    /// `connect_printer` was called without `deviceName`
    #[error("Device name is required")]
    MissingDeviceName,

    /// `print_raw` was called without `deviceName` or `data`
    #[error("Device name and data are required")]
    MissingPrintArguments,

    /// Arguments were present but had the wrong shape
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// No device with the requested name is attached
    #[error("Device not found")]
    DeviceNotFound,

    /// The host has not granted access to the device
    #[error("Permission denied")]
    PermissionDenied,

    /// The host refused to open the device
    #[error("Failed to open connection")]
    ConnectionFailed,

    /// No interface exposes a bulk-out endpoint
    #[error("Bulk out endpoint not found")]
    EndpointNotFound,

    #[error("Failed to claim interface")]
    ClaimFailed,

    #[error("Transfer failed")]
    TransferFailed,

    /// A payload value cannot be represented as a byte
    #[error("Invalid byte value {value} at index {index}")]
    InvalidData { index: usize, value: i64 },

    /// A response could not be encoded
    #[error("Failed to encode response: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The host device table could not be read
    #[error(transparent)]
    Host(#[from] common::Error),
}

pub type Result<T> = std::result::Result<T, PrinterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reasons() {
        assert_eq!(PrinterError::DeviceNotFound.to_string(), "Device not found");
        assert_eq!(
            PrinterError::MissingPrintArguments.to_string(),
            "Device name and data are required"
        );
        assert_eq!(
            PrinterError::InvalidData {
                index: 3,
                value: 300
            }
            .to_string(),
            "Invalid byte value 300 at index 3"
        );
        assert_eq!(
            PrinterError::Host(common::Error::Usb("Access denied".to_string())).to_string(),
            "USB error: Access denied"
        );
    }
}
