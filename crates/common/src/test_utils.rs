//! Test utilities for the printer plugin
//!
//! Provides an in-memory [`DeviceSource`] whose device table, permission
//! flags and failure points are scripted by the test, and which records every
//! open, claim, write and close it sees.
//!
//! # Example
//!
//! ```
//! use common::DeviceSource;
//! use common::test_utils::{FakeDeviceSource, mock_printer};
//!
//! let source = FakeDeviceSource::new().with_device(mock_printer("USB001").permitted());
//! let devices = source.devices().unwrap();
//! assert_eq!(devices.len(), 1);
//! assert!(source.has_permission(&devices[0]));
//! ```

use crate::usb_types::{DeviceConnection, DeviceSource, EndpointInfo, InterfaceInfo, NativeDevice};
use crate::{Error, PermissionEvent, PermissionNotifier, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How a fake device answers bulk writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FakeTransfer {
    /// Accept every byte
    #[default]
    Full,
    /// Accept at most this many bytes
    Short(usize),
    /// Fail the transfer
    Fail,
}

/// A scripted device in the fake table
#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub native: NativeDevice,
    pub permitted: bool,
    pub open_fails: bool,
    pub claim_fails: bool,
    pub transfer: FakeTransfer,
}

impl FakeDevice {
    pub fn new(native: NativeDevice) -> Self {
        Self {
            native,
            permitted: false,
            open_fails: false,
            claim_fails: false,
            transfer: FakeTransfer::Full,
        }
    }

    pub fn permitted(mut self) -> Self {
        self.permitted = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.open_fails = true;
        self
    }

    pub fn failing_claim(mut self) -> Self {
        self.claim_fails = true;
        self
    }

    pub fn with_transfer(mut self, transfer: FakeTransfer) -> Self {
        self.transfer = transfer;
        self
    }
}

/// A bulk write observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub device_name: String,
    pub endpoint: u8,
    pub data: Vec<u8>,
    pub timeout: Duration,
}

/// An interface claim observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClaim {
    pub device_name: String,
    pub interface: u8,
    pub force_detach: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    devices: Vec<FakeDevice>,
    enumerations: usize,
    opens: usize,
    closes: usize,
    permission_requests: Vec<String>,
    claims: Vec<RecordedClaim>,
    writes: Vec<RecordedWrite>,
}

/// In-memory device source
///
/// Clones share state, so a test can keep one handle for inspection while the
/// code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeDeviceSource {
    state: Arc<Mutex<FakeState>>,
    notifier: Option<PermissionNotifier>,
}

impl FakeDeviceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish permission requests on this bridge
    pub fn with_notifier(mut self, notifier: PermissionNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_device(self, device: FakeDevice) -> Self {
        self.add_device(device);
        self
    }

    pub fn add_device(&self, device: FakeDevice) {
        self.state().devices.push(device);
    }

    /// Detach a device from the table
    pub fn remove_device(&self, name: &str) {
        self.state().devices.retain(|d| d.native.name != name);
    }

    /// Simulate the host granting or revoking access
    pub fn set_permission(&self, name: &str, permitted: bool) {
        for device in self.state().devices.iter_mut() {
            if device.native.name == name {
                device.permitted = permitted;
            }
        }
    }

    /// Number of device table queries
    pub fn enumerations(&self) -> usize {
        self.state().enumerations
    }

    pub fn opens(&self) -> usize {
        self.state().opens
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    pub fn permission_requests(&self) -> Vec<String> {
        self.state().permission_requests.clone()
    }

    pub fn claims(&self) -> Vec<RecordedClaim> {
        self.state().claims.clone()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state().writes.clone()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find(&self, name: &str) -> Option<FakeDevice> {
        self.state()
            .devices
            .iter()
            .find(|d| d.native.name == name)
            .cloned()
    }
}

impl DeviceSource for FakeDeviceSource {
    type Connection = FakeConnection;

    fn devices(&self) -> Result<Vec<NativeDevice>> {
        let mut state = self.state();
        state.enumerations += 1;
        Ok(state.devices.iter().map(|d| d.native.clone()).collect())
    }

    fn has_permission(&self, device: &NativeDevice) -> bool {
        self.find(&device.name).is_some_and(|d| d.permitted)
    }

    fn request_permission(&self, device: &NativeDevice) -> Result<()> {
        self.state().permission_requests.push(device.name.clone());
        if let Some(notifier) = &self.notifier {
            notifier.notify(PermissionEvent::Requested {
                device_name: device.name.clone(),
                vendor_id: device.vendor_id,
                product_id: device.product_id,
            })?;
        }
        Ok(())
    }

    fn open(&self, device: &NativeDevice) -> Result<FakeConnection> {
        let fake = self
            .find(&device.name)
            .ok_or_else(|| Error::Usb("No such device".to_string()))?;

        self.state().opens += 1;
        if fake.open_fails {
            return Err(Error::Usb("Resource busy".to_string()));
        }

        Ok(FakeConnection {
            state: Arc::clone(&self.state),
            device: fake,
        })
    }
}

/// Connection handed out by [`FakeDeviceSource`]
#[derive(Debug)]
pub struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
    device: FakeDevice,
}

impl FakeConnection {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceConnection for FakeConnection {
    fn claim_interface(&mut self, interface: u8, force_detach: bool) -> Result<()> {
        self.state().claims.push(RecordedClaim {
            device_name: self.device.native.name.clone(),
            interface,
            force_detach,
        });
        if self.device.claim_fails {
            return Err(Error::Usb("Interface busy".to_string()));
        }
        Ok(())
    }

    fn bulk_transfer(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        self.state().writes.push(RecordedWrite {
            device_name: self.device.native.name.clone(),
            endpoint,
            data: data.to_vec(),
            timeout,
        });
        match self.device.transfer {
            FakeTransfer::Full => Ok(data.len()),
            FakeTransfer::Short(max) => Ok(data.len().min(max)),
            FakeTransfer::Fail => Err(Error::Usb("Pipe error".to_string())),
        }
    }

    fn close(&mut self) {
        self.state().closes += 1;
    }
}

/// A receipt-printer-like device: one interface with bulk-out 0x01 and bulk-in 0x82
pub fn mock_printer(name: &str) -> FakeDevice {
    FakeDevice::new(
        NativeDevice::new(name, 1, 0x0416, 0x5011)
            .with_strings(Some("Test Manufacturer"), Some("Test Printer"))
            .with_interface(InterfaceInfo::new(
                0,
                vec![EndpointInfo::bulk_out(0x01), EndpointInfo::bulk_in(0x02)],
            )),
    )
}

/// A device with no bulk-out endpoint anywhere (e.g. a keyboard)
pub fn mock_keyboard(name: &str) -> FakeDevice {
    FakeDevice::new(
        NativeDevice::new(name, 2, 0x046d, 0xc31c)
            .with_interface(InterfaceInfo::new(0, vec![EndpointInfo::interrupt_in(0x01)])),
    )
}
