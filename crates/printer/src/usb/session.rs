//! Transfer session
//!
//! Permission handshake and the single-shot bulk write:
//! resolve → permission check → open → find bulk-out → claim → write → close.
//!
//! There is no retry anywhere. Permission requests are never issued from the
//! write path, and the connection is closed exactly once on every path after
//! a successful open.

use super::directory::DeviceDirectory;
use crate::error::{PrinterError, Result};
use common::{DeviceConnection, DeviceSource, InterfaceInfo};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout of the bulk write
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);

/// Result of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The host already records a grant
    AlreadyGranted,
    /// No grant yet; a request was handed to the host
    Requested,
}

impl AccessOutcome {
    pub fn granted(&self) -> bool {
        matches!(self, AccessOutcome::AlreadyGranted)
    }

    pub fn message(&self) -> &'static str {
        match self {
            AccessOutcome::AlreadyGranted => "Already had permission",
            AccessOutcome::Requested => "Permission requested",
        }
    }
}

/// Location of the endpoint selected for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOutEndpoint {
    /// Interface that owns the endpoint
    pub interface: u8,
    /// Endpoint address
    pub address: u8,
}

/// First bulk-out endpoint, scanning interfaces then endpoints in order
pub fn select_bulk_out(interfaces: &[InterfaceInfo]) -> Option<BulkOutEndpoint> {
    interfaces.iter().find_map(|interface| {
        interface
            .endpoints
            .iter()
            .find(|endpoint| endpoint.is_bulk_out())
            .map(|endpoint| BulkOutEndpoint {
                interface: interface.number,
                address: endpoint.address,
            })
    })
}

/// Closes the wrapped connection when dropped
struct ScopedConnection<C: DeviceConnection>(C);

impl<C: DeviceConnection> Deref for ScopedConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

impl<C: DeviceConnection> DerefMut for ScopedConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.0
    }
}

impl<C: DeviceConnection> Drop for ScopedConnection<C> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Permission handshake and bulk writes against one device source
pub struct TransferSession<S> {
    directory: DeviceDirectory<S>,
    source: Arc<S>,
    force_detach: bool,
}

impl<S: DeviceSource> TransferSession<S> {
    /// Create a session
    ///
    /// With `force_detach`, a kernel driver bound to the target interface is
    /// detached before claiming.
    pub fn new(source: Arc<S>, force_detach: bool) -> Self {
        Self {
            directory: DeviceDirectory::new(Arc::clone(&source)),
            source,
            force_detach,
        }
    }

    /// Check for a permission grant, requesting one if absent
    ///
    /// Never waits for the host's decision.
    pub fn request_access(&self, device_name: &str) -> Result<AccessOutcome> {
        let device = self.directory.resolve(device_name)?;

        if self.source.has_permission(&device) {
            debug!("Permission already granted for {}", device_name);
            return Ok(AccessOutcome::AlreadyGranted);
        }

        self.source.request_permission(&device)?;
        info!(
            "Requested permission for {} ({:04x}:{:04x})",
            device_name, device.vendor_id, device.product_id
        );
        Ok(AccessOutcome::Requested)
    }

    /// Write `data` to the device's first bulk-out endpoint
    ///
    /// Returns the byte count reported by the transfer, which may be less
    /// than `data.len()`.
    pub fn write(&self, device_name: &str, data: &[u8]) -> Result<usize> {
        let device = self.directory.resolve(device_name)?;

        if !self.source.has_permission(&device) {
            warn!("No permission for {}", device_name);
            return Err(PrinterError::PermissionDenied);
        }

        let connection = self.source.open(&device).map_err(|e| {
            warn!("Failed to open {}: {}", device_name, e);
            PrinterError::ConnectionFailed
        })?;
        let mut connection = ScopedConnection(connection);

        let endpoint = select_bulk_out(&device.interfaces).ok_or_else(|| {
            warn!("No bulk-out endpoint on {}", device_name);
            PrinterError::EndpointNotFound
        })?;
        debug!(
            "Selected endpoint {:#04x} on interface {} of {}",
            endpoint.address, endpoint.interface, device_name
        );

        connection
            .claim_interface(endpoint.interface, self.force_detach)
            .map_err(|e| {
                warn!(
                    "Failed to claim interface {} on {}: {}",
                    endpoint.interface, device_name, e
                );
                PrinterError::ClaimFailed
            })?;

        let written = connection
            .bulk_transfer(endpoint.address, data, TRANSFER_TIMEOUT)
            .map_err(|e| {
                warn!("Bulk transfer to {} failed: {}", device_name, e);
                PrinterError::TransferFailed
            })?;

        if written < data.len() {
            warn!(
                "Short write to {}: {} of {} bytes",
                device_name,
                written,
                data.len()
            );
        } else {
            debug!("Wrote {} bytes to {}", written, device_name);
        }

        Ok(written)
    }
}
