//! Device directory
//!
//! Maps the host's current device table to [`DeviceDescriptor`]s and resolves
//! device names. Nothing is cached: every call re-reads the table.

use crate::error::{PrinterError, Result};
use common::{DeviceSource, NativeDevice};
use protocol::DeviceDescriptor;
use std::sync::Arc;
use tracing::debug;

/// Read-only view over the host device table
pub struct DeviceDirectory<S> {
    source: Arc<S>,
}

impl<S> Clone for DeviceDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: DeviceSource> DeviceDirectory<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// List every attached device, one descriptor per device
    ///
    /// No filtering by device class is applied.
    pub fn list(&self) -> Result<Vec<DeviceDescriptor>> {
        let devices = self.source.devices()?;
        debug!("Enumerated {} devices", devices.len());
        Ok(devices.into_iter().map(describe).collect())
    }

    /// Find an attached device by name
    pub fn resolve(&self, device_name: &str) -> Result<NativeDevice> {
        self.source
            .devices()?
            .into_iter()
            .find(|device| device.name == device_name)
            .ok_or_else(|| {
                debug!("Device {} not in directory", device_name);
                PrinterError::DeviceNotFound
            })
    }
}

/// Convert a native device to its shell-facing descriptor
pub fn describe(device: NativeDevice) -> DeviceDescriptor {
    DeviceDescriptor::new(
        device.name,
        device.id,
        device.vendor_id,
        device.product_id,
        device.manufacturer,
        device.product,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{FakeDeviceSource, mock_keyboard, mock_printer};
    use protocol::UNKNOWN_NAME;

    fn directory(source: &FakeDeviceSource) -> DeviceDirectory<FakeDeviceSource> {
        DeviceDirectory::new(Arc::new(source.clone()))
    }

    #[test]
    fn test_list_maps_every_device() {
        let source = FakeDeviceSource::new()
            .with_device(mock_printer("USB001"))
            .with_device(mock_keyboard("USB003"));

        let listed = directory(&source).list().unwrap();

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].device_name, "USB001");
        assert_eq!(listed[0].manufacturer_name, "Test Manufacturer");
        assert_eq!(listed[1].device_name, "USB003");
        assert_eq!(listed[1].manufacturer_name, UNKNOWN_NAME);
        assert_eq!(listed[1].product_name, UNKNOWN_NAME);
    }

    #[test]
    fn test_list_is_not_cached() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001"));
        let directory = directory(&source);

        assert_eq!(directory.list().unwrap().len(), 1);
        source.add_device(mock_printer("USB002"));
        assert_eq!(directory.list().unwrap().len(), 2);
        assert_eq!(source.enumerations(), 2);
    }

    #[test]
    fn test_resolve() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001"));
        let directory = directory(&source);

        assert_eq!(directory.resolve("USB001").unwrap().name, "USB001");
        assert!(matches!(
            directory.resolve("USB002"),
            Err(PrinterError::DeviceNotFound)
        ));
    }
}
