//! Fault Reporting Tests
//!
//! Validates that injected delivery faults surface through the
//! `SendErr`/`RecvErr` readiness bits instead of corrupting transport
//! state, and that the endpoint keeps working once the fault budget is
//! spent.

use coport::Timeout;
use coport_types::{CoportType, EventMask, IpcError};
use coproc::test_utils::with_fault_plan;
use coproc::{FaultPlan, IoFault};
use std::thread;

/// A dropped send is accepted, delivers nothing, and raises `SendErr`.
#[test]
fn test_dropped_send_raises_send_err() {
    let plan = FaultPlan::new().with_fault(IoFault::DropSends { count: 1 });

    with_fault_plan(plan, |compartment| {
        let handle = compartment.open("lossy", CoportType::Channel).unwrap();

        // The drop looks like success to the sender.
        assert_eq!(compartment.send(&handle, b"gone").unwrap(), 4);

        let observed = compartment
            .poll(
                &[(handle, EventMask::IN | EventMask::SEND_ERR)],
                Timeout::Poll,
            )
            .unwrap();
        assert!(observed[0].contains(EventMask::SEND_ERR));
        assert!(!observed[0].contains(EventMask::IN));

        // Nothing was delivered.
        let mut buf = [0u8; 4];
        assert_eq!(
            compartment.recv(&handle, &mut buf),
            Err(IpcError::WouldBlock)
        );

        // The budget is spent; the next send goes through.
        compartment.send(&handle, b"kept").unwrap();
        assert_eq!(compartment.recv(&handle, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"kept");
    });
}

/// A stalled receive fails `WouldBlock` despite queued data and raises
/// `RecvErr`; the data survives for the next receive.
#[test]
fn test_stalled_recv_raises_recv_err() {
    let plan = FaultPlan::new().with_fault(IoFault::StallRecvs { count: 1 });

    with_fault_plan(plan, |compartment| {
        let handle = compartment.open("sticky", CoportType::Carrier).unwrap();
        compartment.send(&handle, b"waiting").unwrap();

        assert_eq!(
            compartment.recv_message(&handle).err(),
            Some(IpcError::WouldBlock)
        );

        let observed = compartment
            .poll(&[(handle, EventMask::RECV_ERR)], Timeout::Poll)
            .unwrap();
        assert_eq!(observed[0], EventMask::RECV_ERR);

        // The message was never consumed by the stalled receive.
        let (msg, _) = compartment.recv_message(&handle).unwrap();
        assert_eq!(compartment.read_message(msg).unwrap().payload(), b"waiting");
        compartment.free(&handle, msg).unwrap();
    });
}

/// A blocked poller watching for faults wakes when one is injected.
#[test]
fn test_poller_woken_by_injected_fault() {
    let plan = FaultPlan::new().with_fault(IoFault::DropSends { count: 1 });

    with_fault_plan(plan, |compartment| {
        let handle = compartment.open("watched", CoportType::Channel).unwrap();

        thread::scope(|scope| {
            let poller = scope.spawn(|| {
                compartment
                    .poll(&[(handle, EventMask::SEND_ERR)], Timeout::Forever)
                    .unwrap()
            });

            thread::sleep(std::time::Duration::from_millis(20));
            compartment.send(&handle, b"dropped").unwrap();

            let observed = poller.join().unwrap();
            assert_eq!(observed[0], EventMask::SEND_ERR);
        });
    });
}

/// Fault bits accumulate alongside normal readiness.
#[test]
fn test_fault_bits_coexist_with_occupancy() {
    let plan = FaultPlan::new().with_fault(IoFault::DropSends { count: 1 });

    with_fault_plan(plan, |compartment| {
        let handle = compartment.open("mixed", CoportType::Channel).unwrap();

        compartment.send(&handle, b"dropped").unwrap();
        compartment.send(&handle, b"queued").unwrap();

        let observed = compartment
            .poll(
                &[(handle, EventMask::IN | EventMask::SEND_ERR)],
                Timeout::Poll,
            )
            .unwrap();
        assert!(observed[0].contains(EventMask::IN));
        assert!(observed[0].contains(EventMask::SEND_ERR));
    });
}
