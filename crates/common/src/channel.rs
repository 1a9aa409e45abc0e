//! Permission event bridge
//!
//! Host permission decisions are asynchronous and arrive outside any command
//! call. The device source publishes requests through a [`PermissionNotifier`];
//! whatever brokers the decision (a udev helper, the application shell)
//! publishes the outcome on the same bridge. The plugin host consumes
//! [`PermissionEvents`] and forwards them to the shell.

use async_channel::{Receiver, Sender, TrySendError, bounded};
use protocol::{HostEvent, PermissionState};

/// Bridge capacity; requests beyond it are refused rather than blocking
pub const PERMISSION_CHANNEL_CAPACITY: usize = 256;

/// Permission lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionEvent {
    /// Access to a device was requested
    Requested {
        device_name: String,
        vendor_id: u16,
        product_id: u16,
    },

    /// Access was granted
    Granted { device_name: String },

    /// Access was denied
    Denied { device_name: String },
}

impl PermissionEvent {
    /// Device the event applies to
    pub fn device_name(&self) -> &str {
        match self {
            PermissionEvent::Requested { device_name, .. }
            | PermissionEvent::Granted { device_name }
            | PermissionEvent::Denied { device_name } => device_name,
        }
    }

    pub fn state(&self) -> PermissionState {
        match self {
            PermissionEvent::Requested { .. } => PermissionState::Requested,
            PermissionEvent::Granted { .. } => PermissionState::Granted,
            PermissionEvent::Denied { .. } => PermissionState::Denied,
        }
    }
}

impl From<PermissionEvent> for HostEvent {
    fn from(event: PermissionEvent) -> Self {
        let state = event.state();
        let device_name = match event {
            PermissionEvent::Requested { device_name, .. }
            | PermissionEvent::Granted { device_name }
            | PermissionEvent::Denied { device_name } => device_name,
        };
        HostEvent::Permission { device_name, state }
    }
}

/// Publishing side of the bridge
#[derive(Debug, Clone)]
pub struct PermissionNotifier {
    tx: Sender<PermissionEvent>,
}

impl PermissionNotifier {
    /// Publish an event without blocking
    pub fn notify(&self, event: PermissionEvent) -> crate::Result<()> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => crate::Error::Channel("permission bridge full".to_string()),
            TrySendError::Closed(_) => {
                crate::Error::Channel("permission bridge closed".to_string())
            }
        })
    }

    /// Publish an event, waiting for capacity
    pub async fn publish(&self, event: PermissionEvent) -> crate::Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Consuming side of the bridge
#[derive(Debug, Clone)]
pub struct PermissionEvents {
    rx: Receiver<PermissionEvent>,
}

impl PermissionEvents {
    /// Receive the next event
    ///
    /// Fails once every notifier has been dropped and the queue is drained.
    pub async fn recv(&self) -> crate::Result<PermissionEvent> {
        self.rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<PermissionEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create the permission bridge
///
/// Returns (PermissionNotifier for publishers, PermissionEvents for the host)
pub fn create_permission_bridge() -> (PermissionNotifier, PermissionEvents) {
    let (tx, rx) = bounded(PERMISSION_CHANNEL_CAPACITY);
    (PermissionNotifier { tx }, PermissionEvents { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested(name: &str) -> PermissionEvent {
        PermissionEvent::Requested {
            device_name: name.to_string(),
            vendor_id: 0x04b8,
            product_id: 0x0202,
        }
    }

    #[test]
    fn test_notify_then_try_recv() {
        let (notifier, events) = create_permission_bridge();
        notifier.notify(requested("USB001")).unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.device_name(), "USB001");
        assert_eq!(event.state(), PermissionState::Requested);
        assert!(events.try_recv().is_none());
    }

    #[test]
    fn test_notify_fails_when_full() {
        let (notifier, _events) = create_permission_bridge();
        for _ in 0..PERMISSION_CHANNEL_CAPACITY {
            notifier.notify(requested("USB001")).unwrap();
        }
        assert!(notifier.notify(requested("USB001")).is_err());
    }

    #[test]
    fn test_notify_fails_when_closed() {
        let (notifier, events) = create_permission_bridge();
        drop(events);
        assert!(notifier.notify(requested("USB001")).is_err());
    }

    #[tokio::test]
    async fn test_notify_from_broker_thread() {
        let (notifier, events) = create_permission_bridge();

        let broker = std::thread::spawn(move || {
            notifier
                .notify(PermissionEvent::Granted {
                    device_name: "USB001".to_string(),
                })
                .unwrap();
        });

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            PermissionEvent::Granted {
                device_name: "USB001".to_string()
            }
        );
        broker.join().unwrap();

        // Notifier dropped with the thread; queue is drained
        assert!(events.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_publish_waits_for_capacity() {
        let (notifier, events) = create_permission_bridge();
        for _ in 0..PERMISSION_CHANNEL_CAPACITY {
            notifier.notify(requested("USB001")).unwrap();
        }

        let broker = tokio::spawn(async move {
            notifier
                .publish(PermissionEvent::Denied {
                    device_name: "USB002".to_string(),
                })
                .await
        });

        for _ in 0..PERMISSION_CHANNEL_CAPACITY {
            assert_eq!(events.recv().await.unwrap().device_name(), "USB001");
        }
        broker.await.unwrap().unwrap();
        assert_eq!(
            events.recv().await.unwrap().state(),
            PermissionState::Denied
        );
    }

    #[tokio::test]
    async fn test_publish_fails_when_closed() {
        let (notifier, events) = create_permission_bridge();
        drop(events);
        assert!(notifier.publish(requested("USB001")).await.is_err());
    }

    #[test]
    fn test_into_host_event() {
        let event: HostEvent = PermissionEvent::Denied {
            device_name: "USB002".to_string(),
        }
        .into();
        assert_eq!(
            event,
            HostEvent::Permission {
                device_name: "USB002".to_string(),
                state: PermissionState::Denied,
            }
        );
    }
}
