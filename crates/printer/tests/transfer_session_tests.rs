//! Integration tests for the transfer session
//!
//! Covers the write path against the in-memory device source:
//! - lookup and permission checks happen before any connection
//! - endpoint selection is deterministic
//! - the connection is closed exactly once on every path after open

use common::test_utils::{FakeDevice, FakeDeviceSource, FakeTransfer, mock_keyboard, mock_printer};
use common::{EndpointInfo, InterfaceInfo, NativeDevice};
use printer::PrinterError;
use printer::usb::{AccessOutcome, TRANSFER_TIMEOUT, TransferSession};
use std::sync::Arc;

fn session(source: &FakeDeviceSource) -> TransferSession<FakeDeviceSource> {
    TransferSession::new(Arc::new(source.clone()), true)
}

mod write_path {
    use super::*;

    #[test]
    fn test_write_success() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001").permitted());

        let written = session(&source).write("USB001", &[27, 64, 72, 105]).unwrap();

        assert_eq!(written, 4);
        let writes = source.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].endpoint, 0x01);
        assert_eq!(writes[0].data, vec![27, 64, 72, 105]);
        assert_eq!(writes[0].timeout, TRANSFER_TIMEOUT);
        assert_eq!(source.closes(), 1);
    }

    #[test]
    fn test_unknown_device_makes_no_connection() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001").permitted());

        let err = session(&source).write("USB002", &[1]).unwrap_err();

        assert!(matches!(err, PrinterError::DeviceNotFound));
        assert_eq!(source.opens(), 0);
        assert_eq!(source.closes(), 0);
    }

    #[test]
    fn test_missing_permission_makes_no_connection_or_request() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001"));

        let err = session(&source).write("USB001", &[1]).unwrap_err();

        assert!(matches!(err, PrinterError::PermissionDenied));
        assert_eq!(source.opens(), 0);
        assert!(source.permission_requests().is_empty());
    }

    #[test]
    fn test_open_failure() {
        let source =
            FakeDeviceSource::new().with_device(mock_printer("USB001").permitted().failing_open());

        let err = session(&source).write("USB001", &[1]).unwrap_err();

        assert!(matches!(err, PrinterError::ConnectionFailed));
        assert_eq!(source.closes(), 0);
    }

    #[test]
    fn test_no_bulk_out_endpoint_still_closes() {
        let source = FakeDeviceSource::new().with_device(mock_keyboard("KBD").permitted());

        let err = session(&source).write("KBD", &[1]).unwrap_err();

        assert!(matches!(err, PrinterError::EndpointNotFound));
        assert_eq!(source.opens(), 1);
        assert_eq!(source.closes(), 1);
        assert!(source.claims().is_empty());
    }

    #[test]
    fn test_claim_failure_still_closes() {
        let source =
            FakeDeviceSource::new().with_device(mock_printer("USB001").permitted().failing_claim());

        let err = session(&source).write("USB001", &[1]).unwrap_err();

        assert!(matches!(err, PrinterError::ClaimFailed));
        assert!(source.writes().is_empty());
        assert_eq!(source.closes(), 1);
    }

    #[test]
    fn test_transfer_failure_still_closes() {
        let source = FakeDeviceSource::new().with_device(
            mock_printer("USB001")
                .permitted()
                .with_transfer(FakeTransfer::Fail),
        );

        let err = session(&source).write("USB001", &[1, 2]).unwrap_err();

        assert!(matches!(err, PrinterError::TransferFailed));
        assert_eq!(source.closes(), 1);
    }

    #[test]
    fn test_short_write_reported_without_retry() {
        let source = FakeDeviceSource::new().with_device(
            mock_printer("USB001")
                .permitted()
                .with_transfer(FakeTransfer::Short(3)),
        );

        let written = session(&source).write("USB001", &[0; 10]).unwrap();

        assert_eq!(written, 3);
        assert_eq!(source.writes().len(), 1);
        assert_eq!(source.closes(), 1);
    }

    #[test]
    fn test_one_close_per_call() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001").permitted());
        let session = session(&source);

        for _ in 0..5 {
            session.write("USB001", &[1]).unwrap();
        }

        assert_eq!(source.opens(), 5);
        assert_eq!(source.closes(), 5);
    }

    #[test]
    fn test_claim_uses_force_detach_setting() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001").permitted());

        TransferSession::new(Arc::new(source.clone()), false)
            .write("USB001", &[1])
            .unwrap();

        assert!(!source.claims()[0].force_detach);
    }
}

mod endpoint_selection {
    use super::*;

    fn composite_device() -> FakeDevice {
        FakeDevice::new(
            NativeDevice::new("COMPOSITE", 9, 0x1234, 0x5678)
                .with_interface(InterfaceInfo::new(0, vec![EndpointInfo::interrupt_in(1)]))
                .with_interface(InterfaceInfo::new(1, vec![EndpointInfo::bulk_in(2)]))
                .with_interface(InterfaceInfo::new(
                    2,
                    vec![EndpointInfo::bulk_out(1), EndpointInfo::bulk_in(3)],
                ))
                .with_interface(InterfaceInfo::new(3, vec![EndpointInfo::bulk_out(4)])),
        )
        .permitted()
    }

    #[test]
    fn test_first_bulk_out_is_selected_every_time() {
        let source = FakeDeviceSource::new().with_device(composite_device());
        let session = session(&source);

        for _ in 0..3 {
            session.write("COMPOSITE", &[1]).unwrap();
        }

        for claim in source.claims() {
            assert_eq!(claim.interface, 2);
        }
        for write in source.writes() {
            assert_eq!(write.endpoint, 0x01);
        }
    }
}

mod access {
    use super::*;

    #[test]
    fn test_already_granted() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001").permitted());

        let outcome = session(&source).request_access("USB001").unwrap();

        assert_eq!(outcome, AccessOutcome::AlreadyGranted);
        assert!(source.permission_requests().is_empty());
    }

    #[test]
    fn test_request_issued_when_absent() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001"));

        let outcome = session(&source).request_access("USB001").unwrap();

        assert_eq!(outcome, AccessOutcome::Requested);
        assert_eq!(source.permission_requests(), vec!["USB001".to_string()]);
        assert_eq!(source.opens(), 0);
    }

    #[test]
    fn test_caller_retries_after_grant() {
        let source = FakeDeviceSource::new().with_device(mock_printer("USB001"));
        let session = session(&source);

        assert_eq!(
            session.request_access("USB001").unwrap(),
            AccessOutcome::Requested
        );
        assert!(matches!(
            session.write("USB001", &[1]),
            Err(PrinterError::PermissionDenied)
        ));

        source.set_permission("USB001", true);

        assert_eq!(
            session.request_access("USB001").unwrap(),
            AccessOutcome::AlreadyGranted
        );
        assert_eq!(session.write("USB001", &[1]).unwrap(), 1);
    }

    #[test]
    fn test_unknown_device() {
        let source = FakeDeviceSource::new();
        assert!(matches!(
            session(&source).request_access("USB002"),
            Err(PrinterError::DeviceNotFound)
        ));
    }
}
