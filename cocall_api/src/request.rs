//! Request and reply shapes for coport operations

use coport::{MsgRef, Timeout};
use coport_types::{CoportHandle, CoportType, EventMask};
use serde::{Deserialize, Serialize};

/// A coport operation, as delivered over the cocall transport
///
/// Handles travel inside the request in sealed form; the receiving
/// compartment validates and unseals them before acting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoportRequest {
    /// Resolve or create the named endpoint
    Open { name: String, transport: CoportType },
    /// Send a message (pipe, channel, or carrier without attachments)
    Send {
        handle: CoportHandle,
        payload: Vec<u8>,
    },
    /// Send a carrier message with out-of-band handle attachments
    SendMessage {
        handle: CoportHandle,
        payload: Vec<u8>,
        attachments: Vec<CoportHandle>,
    },
    /// Receive: bytes for pipe/channel, a message reference for carrier
    Recv {
        handle: CoportHandle,
        len_hint: usize,
    },
    /// Release a received carrier message
    Free {
        handle: CoportHandle,
        message: MsgRef,
    },
    /// Wait for readiness across endpoints
    Poll {
        entries: Vec<(CoportHandle, EventMask)>,
        timeout: Timeout,
    },
    /// Close the endpoint
    Close { handle: CoportHandle },
}

impl CoportRequest {
    /// Returns the operation name, for audit records
    pub fn name(&self) -> &'static str {
        match self {
            CoportRequest::Open { .. } => "Open",
            CoportRequest::Send { .. } => "Send",
            CoportRequest::SendMessage { .. } => "SendMessage",
            CoportRequest::Recv { .. } => "Recv",
            CoportRequest::Free { .. } => "Free",
            CoportRequest::Poll { .. } => "Poll",
            CoportRequest::Close { .. } => "Close",
        }
    }
}

/// The reply to a [`CoportRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoportReply {
    /// A sealed handle for the opened endpoint
    Opened { handle: CoportHandle },
    /// Bytes accepted by a send
    Sent { bytes: usize },
    /// Bytes delivered by a pipe or channel receive
    Received { payload: Vec<u8> },
    /// Read-only reference delivered by a carrier receive
    Message {
        message: MsgRef,
        attachments: Vec<CoportHandle>,
    },
    /// Observed readiness, one mask per polled entry
    Polled { observed: Vec<EventMask> },
    /// The message was freed
    Freed,
    /// The endpoint was closed
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_names() {
        let open = CoportRequest::Open {
            name: "x".to_string(),
            transport: CoportType::Channel,
        };
        assert_eq!(open.name(), "Open");

        let poll = CoportRequest::Poll {
            entries: Vec::new(),
            timeout: Timeout::Poll,
        };
        assert_eq!(poll.name(), "Poll");
    }

    #[test]
    fn test_request_serde_round_trip() {
        let request = CoportRequest::Send {
            handle: CoportHandle::unsealed(
                coport_types::HandleBounds::for_index(1),
                CoportType::Channel,
            ),
            payload: b"hello".to_vec(),
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: CoportRequest = serde_json::from_str(&json).unwrap();
        match back {
            CoportRequest::Send { payload, .. } => assert_eq!(payload, b"hello"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_reply_serde_round_trip() {
        let reply = CoportReply::Polled {
            observed: vec![EventMask::IN, EventMask::empty()],
        };
        let json = serde_json::to_string(&reply).unwrap();
        let back: CoportReply = serde_json::from_str(&json).unwrap();
        match back {
            CoportReply::Polled { observed } => {
                assert_eq!(observed, vec![EventMask::IN, EventMask::empty()]);
            }
            _ => panic!("wrong variant"),
        }
    }
}
