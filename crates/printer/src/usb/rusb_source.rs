//! libusb-backed device source
//!
//! Device names follow the Linux usbfs layout (`/dev/bus/usb/BBB/DDD`) and
//! device ids are `bus * 1000 + address`. A device counts as permitted when
//! the host lets us open it; udev rules or group membership decide that, so a
//! permission request is published for an external broker to act on.

use common::{
    DeviceConnection, DeviceSource, EndpointDirection, EndpointInfo, Error, InterfaceInfo,
    NativeDevice, PermissionEvent, PermissionNotifier, Result, TransferKind,
};
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Platform-stable name of a libusb device
pub fn device_name<T: UsbContext>(device: &Device<T>) -> String {
    format!(
        "/dev/bus/usb/{:03}/{:03}",
        device.bus_number(),
        device.address()
    )
}

/// Numeric id of a libusb device
pub fn device_id<T: UsbContext>(device: &Device<T>) -> u32 {
    device.bus_number() as u32 * 1000 + device.address() as u32
}

/// Suggested udev rule granting access to a device
pub fn udev_rule_hint(vendor_id: u16, product_id: u16) -> String {
    format!(
        "SUBSYSTEM==\"usb\", ATTRS{{idVendor}}==\"{:04x}\", ATTRS{{idProduct}}==\"{:04x}\", MODE=\"0660\", TAG+=\"uaccess\"",
        vendor_id, product_id
    )
}

fn map_rusb_error(e: rusb::Error) -> Error {
    Error::Usb(e.to_string())
}

fn map_transfer_kind(kind: rusb::TransferType) -> TransferKind {
    match kind {
        rusb::TransferType::Control => TransferKind::Control,
        rusb::TransferType::Isochronous => TransferKind::Isochronous,
        rusb::TransferType::Bulk => TransferKind::Bulk,
        rusb::TransferType::Interrupt => TransferKind::Interrupt,
    }
}

fn map_direction(direction: rusb::Direction) -> EndpointDirection {
    match direction {
        rusb::Direction::In => EndpointDirection::In,
        rusb::Direction::Out => EndpointDirection::Out,
    }
}

/// Device source over a libusb context
pub struct RusbSource {
    context: Context,
    notifier: PermissionNotifier,
}

impl RusbSource {
    pub fn new(notifier: PermissionNotifier) -> Result<Self> {
        let context = Context::new().map_err(map_rusb_error)?;
        Ok(Self { context, notifier })
    }

    /// Find the libusb device behind a native device
    fn lookup(&self, native: &NativeDevice) -> Result<Device<Context>> {
        self.context
            .devices()
            .map_err(map_rusb_error)?
            .iter()
            .find(|device| device_name(device) == native.name)
            .ok_or_else(|| Error::Usb(format!("{} is no longer attached", native.name)))
    }

    fn describe(&self, device: &Device<Context>) -> Result<NativeDevice> {
        let descriptor = device.device_descriptor().map_err(map_rusb_error)?;

        // Strings need an open handle; without access they stay absent
        let (manufacturer, product) = match device.open() {
            Ok(handle) => (
                descriptor
                    .manufacturer_string_index()
                    .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok()),
                descriptor
                    .product_string_index()
                    .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok()),
            ),
            Err(e) => {
                debug!("Cannot read strings of {}: {}", device_name(device), e);
                (None, None)
            }
        };

        Ok(NativeDevice {
            name: device_name(device),
            id: device_id(device),
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            manufacturer,
            product,
            interfaces: read_interfaces(device),
        })
    }
}

/// Interfaces of the active configuration, first alternate setting only
fn read_interfaces(device: &Device<Context>) -> Vec<InterfaceInfo> {
    let config = match device
        .active_config_descriptor()
        .or_else(|_| device.config_descriptor(0))
    {
        Ok(config) => config,
        Err(e) => {
            debug!(
                "No config descriptor for {}: {}",
                device_name(device),
                e
            );
            return Vec::new();
        }
    };

    let mut interfaces: Vec<InterfaceInfo> = config
        .interfaces()
        .filter_map(|interface| {
            let setting = interface.descriptors().next()?;
            let endpoints = setting
                .endpoint_descriptors()
                .map(|ep| EndpointInfo {
                    address: ep.address(),
                    transfer_kind: map_transfer_kind(ep.transfer_type()),
                    direction: map_direction(ep.direction()),
                })
                .collect();
            Some(InterfaceInfo::new(interface.number(), endpoints))
        })
        .collect();

    interfaces.sort_by_key(|interface| interface.number);
    interfaces
}

impl DeviceSource for RusbSource {
    type Connection = RusbConnection;

    fn devices(&self) -> Result<Vec<NativeDevice>> {
        let list = self.context.devices().map_err(map_rusb_error)?;

        let mut devices = Vec::with_capacity(list.len());
        for device in list.iter() {
            match self.describe(&device) {
                Ok(native) => devices.push(native),
                Err(e) => warn!("Skipping {}: {}", device_name(&device), e),
            }
        }
        Ok(devices)
    }

    fn has_permission(&self, native: &NativeDevice) -> bool {
        let device = match self.lookup(native) {
            Ok(device) => device,
            Err(_) => return false,
        };

        match device.open() {
            Ok(_) => true,
            Err(rusb::Error::Access) => false,
            Err(e) => {
                // Not an authorization failure; let open() report it
                debug!("Permission probe on {} failed: {}", native.name, e);
                true
            }
        }
    }

    fn request_permission(&self, native: &NativeDevice) -> Result<()> {
        info!(
            "Access to {} needs a host grant, e.g. udev rule: {}",
            native.name,
            udev_rule_hint(native.vendor_id, native.product_id)
        );
        self.notifier.notify(PermissionEvent::Requested {
            device_name: native.name.clone(),
            vendor_id: native.vendor_id,
            product_id: native.product_id,
        })
    }

    fn open(&self, native: &NativeDevice) -> Result<RusbConnection> {
        let handle = self.lookup(native)?.open().map_err(map_rusb_error)?;
        debug!("Opened {}", native.name);

        Ok(RusbConnection {
            name: native.name.clone(),
            handle: Some(handle),
            claimed_interfaces: Vec::new(),
            detached_interfaces: Vec::new(),
        })
    }
}

/// Open libusb device handle with its claimed interfaces
pub struct RusbConnection {
    name: String,
    handle: Option<DeviceHandle<Context>>,
    claimed_interfaces: Vec<u8>,
    detached_interfaces: Vec<u8>,
}

impl RusbConnection {
    fn handle_mut(&mut self) -> Result<&mut DeviceHandle<Context>> {
        self.handle
            .as_mut()
            .ok_or_else(|| Error::Usb("connection closed".to_string()))
    }
}

impl DeviceConnection for RusbConnection {
    fn claim_interface(&mut self, interface: u8, force_detach: bool) -> Result<()> {
        let name = self.name.clone();
        let handle = self.handle_mut()?;

        let mut detached = false;
        if force_detach && rusb::supports_detach_kernel_driver() {
            match handle.kernel_driver_active(interface) {
                Ok(true) => {
                    debug!(
                        "Detaching kernel driver from interface {} on {}",
                        interface, name
                    );
                    match handle.detach_kernel_driver(interface) {
                        Ok(()) => detached = true,
                        Err(e) => warn!(
                            "Failed to detach kernel driver from interface {}: {}",
                            interface, e
                        ),
                    }
                }
                Ok(false) => {}
                Err(e) => debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    interface, e
                ),
            }
        }

        let claimed = handle.claim_interface(interface).map_err(map_rusb_error);
        if detached {
            self.detached_interfaces.push(interface);
        }
        claimed?;

        debug!("Claimed interface {} on {}", interface, name);
        self.claimed_interfaces.push(interface);
        Ok(())
    }

    fn bulk_transfer(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        let handle = self.handle_mut()?;
        handle
            .write_bulk(endpoint, data, timeout)
            .map_err(map_rusb_error)
    }

    fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            for interface in self.claimed_interfaces.drain(..) {
                if let Err(e) = handle.release_interface(interface) {
                    warn!("Failed to release interface {}: {}", interface, e);
                }
            }

            // Restore kernel control of anything we detached
            for interface in self.detached_interfaces.drain(..) {
                if let Err(e) = handle.attach_kernel_driver(interface) {
                    debug!(
                        "Could not reattach kernel driver to interface {}: {}",
                        interface, e
                    );
                }
            }

            debug!("Closed {}", self.name);
        }
    }
}

impl Drop for RusbConnection {
    fn drop(&mut self) {
        self.close();
    }
}
