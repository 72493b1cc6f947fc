//! Carrier Message Lifecycle Tests
//!
//! Validates the at-most-once receive / exactly-once free contract, the
//! conservative full-ring policy, and stale-reference rejection.

use coport::MsgRef;
use coport_types::{CoportType, IpcError};
use tests_ipc::test_bootstrap_small;

/// Every sent message is received at most once, in order.
#[test]
fn test_messages_received_at_most_once() {
    let (compartment, _gate) = test_bootstrap_small();
    let handle = compartment.open("z", CoportType::Carrier).unwrap();

    for i in 0u8..4 {
        compartment.send(&handle, &[i]).unwrap();
    }

    for i in 0u8..4 {
        let (msg, _) = compartment.recv_message(&handle).unwrap();
        assert_eq!(compartment.read_message(msg).unwrap().payload(), &[i]);
        compartment.free(&handle, msg).unwrap();
    }

    // Nothing left to receive.
    assert_eq!(
        compartment.recv_message(&handle).err(),
        Some(IpcError::WouldBlock)
    );
}

/// Scenario: a carrier with capacity 4 refuses the fifth queued send.
///
/// The conservative policy: a full ring fails `WouldBlock` and never
/// auto-frees a message behind a receiver.
#[test]
fn test_full_ring_refuses_send() {
    let (compartment, _gate) = test_bootstrap_small();
    let handle = compartment.open("z", CoportType::Carrier).unwrap();

    for i in 0u8..4 {
        compartment.send(&handle, &[i]).unwrap();
    }
    assert_eq!(
        compartment.send(&handle, &[4]),
        Err(IpcError::WouldBlock)
    );

    // Draining one slot makes the send succeed.
    let (msg, _) = compartment.recv_message(&handle).unwrap();
    compartment.free(&handle, msg).unwrap();
    compartment.send(&handle, &[4]).unwrap();
}

/// Freeing a message twice fails `InvalidArgument`.
#[test]
fn test_exactly_once_free() {
    let (compartment, _gate) = test_bootstrap_small();
    let handle = compartment.open("once", CoportType::Carrier).unwrap();

    compartment.send(&handle, b"msg").unwrap();
    let (msg, _) = compartment.recv_message(&handle).unwrap();
    compartment.free(&handle, msg).unwrap();
    assert_eq!(
        compartment.free(&handle, msg),
        Err(IpcError::InvalidArgument)
    );
}

/// Freeing a reference that matches no received message fails.
///
/// The reference is crafted over the wire shape, pointing at a message that
/// is still queued and was never received.
#[test]
fn test_free_of_unreceived_message_rejected() {
    let (compartment, _gate) = test_bootstrap_small();
    let handle = compartment.open("crafted", CoportType::Carrier).unwrap();
    compartment.send(&handle, b"queued").unwrap();

    let crafted: MsgRef =
        serde_json::from_str(r#"{"index":0,"generation":0,"writable":false}"#).unwrap();
    assert_eq!(
        compartment.free(&handle, crafted),
        Err(IpcError::InvalidArgument)
    );

    // The queued message is still intact.
    let (msg, _) = compartment.recv_message(&handle).unwrap();
    assert_eq!(compartment.read_message(msg).unwrap().payload(), b"queued");
    compartment.free(&handle, msg).unwrap();
}

/// A reference kept across slot reuse goes stale instead of aliasing the
/// new occupant.
#[test]
fn test_stale_reference_rejected_after_reuse() {
    let (compartment, _gate) = test_bootstrap_small();
    let handle = compartment.open("reuse", CoportType::Carrier).unwrap();

    compartment.send(&handle, b"old").unwrap();
    let (old, _) = compartment.recv_message(&handle).unwrap();
    compartment.free(&handle, old).unwrap();

    // Cycle enough messages to recycle the freed arena slot.
    for _ in 0..4 {
        compartment.send(&handle, b"new").unwrap();
        let (msg, _) = compartment.recv_message(&handle).unwrap();
        compartment.free(&handle, msg).unwrap();
    }

    assert_eq!(
        compartment.read_message(old).err(),
        Some(IpcError::InvalidArgument)
    );
    assert_eq!(
        compartment.free(&handle, old),
        Err(IpcError::InvalidArgument)
    );
}

/// The receiver's reference is read-only, and the payload survives until
/// the explicit free even as the ring keeps moving.
#[test]
fn test_receiver_reads_in_place_while_ring_advances() {
    let (compartment, _gate) = test_bootstrap_small();
    let handle = compartment.open("inplace", CoportType::Carrier).unwrap();

    compartment.send(&handle, b"held").unwrap();
    let (held, _) = compartment.recv_message(&handle).unwrap();
    assert!(!held.is_writable());

    // The ring keeps flowing while the receiver still holds `held`.
    for _ in 0..3 {
        compartment.send(&handle, b"flow").unwrap();
        let (msg, _) = compartment.recv_message(&handle).unwrap();
        compartment.free(&handle, msg).unwrap();
    }

    assert_eq!(compartment.read_message(held).unwrap().payload(), b"held");
    compartment.free(&handle, held).unwrap();
}

/// Handles attached to a message arrive with it, still sealed.
#[test]
fn test_attachments_delivered_sealed() {
    let (compartment, _gate) = test_bootstrap_small();
    let mailbox = compartment.open("mailbox", CoportType::Carrier).unwrap();
    let payload_port = compartment.open("data", CoportType::Channel).unwrap();

    compartment
        .send_with_attachments(&mailbox, b"here is a channel", vec![payload_port])
        .unwrap();

    let (msg, attachments) = compartment.recv_message(&mailbox).unwrap();
    assert_eq!(attachments, vec![payload_port]);
    assert!(attachments[0].is_sealed());

    // The attached handle is live: it reaches the channel it names.
    compartment.send(&attachments[0], b"pay").unwrap();
    let mut buf = [0u8; 3];
    assert_eq!(compartment.recv(&attachments[0], &mut buf).unwrap(), 3);

    compartment.free(&mailbox, msg).unwrap();
}
