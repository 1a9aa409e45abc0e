//! USB type abstractions
//!
//! The host USB subsystem is reached only through [`DeviceSource`], which is
//! injected into the device directory and transfer session. A libusb-backed
//! source is used in production and an in-memory one in tests.

use std::time::Duration;

/// Endpoint transfer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// Endpoint direction, relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointDirection {
    /// Device to host
    In,
    /// Host to device
    Out,
}

/// One endpoint of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Endpoint address including the direction bit
    pub address: u8,
    pub transfer_kind: TransferKind,
    pub direction: EndpointDirection,
}

impl EndpointInfo {
    /// Bulk endpoint, host to device
    pub fn bulk_out(address: u8) -> Self {
        Self {
            address: address & 0x7f,
            transfer_kind: TransferKind::Bulk,
            direction: EndpointDirection::Out,
        }
    }

    /// Bulk endpoint, device to host
    pub fn bulk_in(address: u8) -> Self {
        Self {
            address: address | 0x80,
            transfer_kind: TransferKind::Bulk,
            direction: EndpointDirection::In,
        }
    }

    /// Interrupt endpoint, device to host
    pub fn interrupt_in(address: u8) -> Self {
        Self {
            address: address | 0x80,
            transfer_kind: TransferKind::Interrupt,
            direction: EndpointDirection::In,
        }
    }

    /// Whether this endpoint can carry a bulk write from the host
    pub fn is_bulk_out(&self) -> bool {
        self.transfer_kind == TransferKind::Bulk && self.direction == EndpointDirection::Out
    }
}

/// One interface of the active configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// Interface number used for claiming
    pub number: u8,
    /// Endpoints in descriptor order
    pub endpoints: Vec<EndpointInfo>,
}

impl InterfaceInfo {
    pub fn new(number: u8, endpoints: Vec<EndpointInfo>) -> Self {
        Self { number, endpoints }
    }
}

/// A device as reported by the host USB subsystem
///
/// Manufacturer and product strings stay optional here; the device directory
/// resolves them to a sentinel at its boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeDevice {
    /// Platform-stable name, e.g. `/dev/bus/usb/001/004`
    pub name: String,
    pub id: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    /// Interfaces in ascending descriptor order
    pub interfaces: Vec<InterfaceInfo>,
}

impl NativeDevice {
    /// Device with no string descriptors and no interfaces
    pub fn new(name: impl Into<String>, id: u32, vendor_id: u16, product_id: u16) -> Self {
        Self {
            name: name.into(),
            id,
            vendor_id,
            product_id,
            manufacturer: None,
            product: None,
            interfaces: Vec::new(),
        }
    }

    pub fn with_strings(mut self, manufacturer: Option<&str>, product: Option<&str>) -> Self {
        self.manufacturer = manufacturer.map(str::to_string);
        self.product = product.map(str::to_string);
        self
    }

    pub fn with_interface(mut self, interface: InterfaceInfo) -> Self {
        self.interfaces.push(interface);
        self
    }
}

/// An open, exclusive connection to a device
pub trait DeviceConnection {
    /// Claim an interface, detaching a kernel driver first if `force_detach` is set
    fn claim_interface(&mut self, interface: u8, force_detach: bool) -> crate::Result<()>;

    /// Synchronous bulk write; returns the number of bytes the device accepted
    fn bulk_transfer(&mut self, endpoint: u8, data: &[u8], timeout: Duration)
    -> crate::Result<usize>;

    /// Release claimed interfaces and close the connection
    fn close(&mut self);
}

/// Host USB subsystem capability
///
/// Device and permission tables belong to the host; implementations hold no
/// state of their own that callers rely on between calls.
pub trait DeviceSource: Send + Sync {
    type Connection: DeviceConnection;

    /// Snapshot of the currently attached devices
    fn devices(&self) -> crate::Result<Vec<NativeDevice>>;

    /// Whether the host has granted this application access to the device
    fn has_permission(&self, device: &NativeDevice) -> bool;

    /// Ask the host for access. Returns immediately; the decision arrives
    /// later as a [`PermissionEvent`](crate::PermissionEvent).
    fn request_permission(&self, device: &NativeDevice) -> crate::Result<()>;

    /// Open an exclusive connection to the device
    fn open(&self, device: &NativeDevice) -> crate::Result<Self::Connection>;
}
