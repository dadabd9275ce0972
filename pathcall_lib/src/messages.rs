use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlates an in-flight call with its reply on one connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// One length-delimited frame on the wire.
///
/// The first frame of every connection must be [`Frame::Hello`]; no request
/// is routed before the peer's role identity is known. After the handshake
/// both sides may send requests and responses in either direction, so replies
/// carry the id of the request they answer and need not arrive in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    Hello {
        role: String,
    },
    Request {
        id: RequestId,
        path: String,
        params: Vec<Value>,
    },
    Response {
        id: RequestId,
        result: Result<Value, WireError>,
    },
}

/// The error half of a reply. Everything the remote endpoint can report
/// without leaking internals across the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireError {
    UnregisteredPath { path: String },
    Handler { message: String },
}

impl TryFrom<Bytes> for Frame {
    type Error = rmp_serde::decode::Error;

    fn try_from(bytes: Bytes) -> Result<Frame, Self::Error> {
        rmp_serde::from_slice(&bytes)
    }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self {
        // Frames only contain strings, integers and JSON values with string
        // keys, all of which MessagePack can represent.
        Bytes::from(rmp_serde::to_vec_named(&frame).expect("frame serialization cannot fail"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(frame: Frame) -> Frame {
        Frame::try_from(Bytes::from(frame)).expect("frame should decode")
    }

    #[test]
    fn hello_round_trip() {
        let frame = Frame::Hello {
            role: "Backend".to_string(),
        };
        assert_eq!(frame.clone(), round_trip(frame));
    }

    #[test]
    fn request_round_trip_keeps_payload_values() {
        let frame = Frame::Request {
            id: RequestId(7),
            path: "some/handler/identifier".to_string(),
            params: vec![
                json!("p1"),
                json!(17),
                json!(-17),
                json!(-17.6),
                json!(true),
                json!({ "a": 17 }),
            ],
        };
        assert_eq!(frame.clone(), round_trip(frame));
    }

    #[test]
    fn error_response_round_trip() {
        let frame = Frame::Response {
            id: RequestId(3),
            result: Err(WireError::UnregisteredPath {
                path: "api/ping".to_string(),
            }),
        };
        assert_eq!(frame.clone(), round_trip(frame));
    }
}
