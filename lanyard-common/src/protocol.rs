//! WebSocket protocol types for the Lanyard presence gateway.
//!
//! Every frame is a JSON object with a numeric `op` field. Inbound dispatches
//! also carry a `t` type string and a `d` payload.
//!
//! # Connection Flow
//!
//! 1. Client connects to the gateway WebSocket endpoint
//! 2. Gateway sends `Hello` (`op: 1`) with the heartbeat interval
//! 3. Client sends `Initialize` (`op: 2`) subscribing to one user id
//! 4. Gateway dispatches `INIT_STATE` (`op: 0`) with the full presence
//! 5. Client sends `Heartbeat` (`op: 3`) every heartbeat interval
//! 6. Gateway dispatches `PRESENCE_UPDATE` (`op: 0`) on every change
//!
//! Unknown opcodes and dispatch types decode to [`ServerFrame::Ignored`] so
//! newer gateways don't break older clients.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::PresenceSnapshot;

pub const OP_EVENT: u64 = 0;
pub const OP_HELLO: u64 = 1;
pub const OP_INITIALIZE: u64 = 2;
pub const OP_HEARTBEAT: u64 = 3;

/// Errors decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Invalid frame: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Missing payload for op {0}")]
    MissingPayload(u64),

    #[error("Invalid hello payload: {0}")]
    InvalidHello(#[source] serde_json::Error),

    #[error("Invalid {kind} payload: {source}")]
    InvalidPresence {
        kind: DispatchKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Payload of the `Hello` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Heartbeat period in milliseconds. Zero is rejected.
    pub heartbeat_interval: NonZeroU64,
}

/// Dispatch types that carry a presence snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// Full state sent right after subscribing.
    InitState,
    /// Sent whenever the tracked presence changes.
    PresenceUpdate,
}

impl DispatchKind {
    fn from_type(t: &str) -> Option<Self> {
        match t {
            "INIT_STATE" => Some(DispatchKind::InitState),
            "PRESENCE_UPDATE" => Some(DispatchKind::PresenceUpdate),
            _ => None,
        }
    }
}

impl std::fmt::Display for DispatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchKind::InitState => write!(f, "INIT_STATE"),
            DispatchKind::PresenceUpdate => write!(f, "PRESENCE_UPDATE"),
        }
    }
}

/// Frames received from the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Hello(Hello),
    Presence {
        kind: DispatchKind,
        snapshot: Box<PresenceSnapshot>,
    },
    /// Opcode or dispatch type this client does not handle.
    Ignored { op: u64, t: Option<String> },
}

#[derive(Deserialize)]
struct RawFrame {
    op: u64,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: Option<serde_json::Value>,
}

impl ServerFrame {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(text).map_err(FrameError::InvalidJson)?;

        match raw.op {
            OP_HELLO => {
                let d = raw.d.ok_or(FrameError::MissingPayload(OP_HELLO))?;
                let hello = serde_json::from_value(d).map_err(FrameError::InvalidHello)?;
                Ok(ServerFrame::Hello(hello))
            }
            OP_EVENT => {
                let Some(kind) = raw.t.as_deref().and_then(DispatchKind::from_type) else {
                    return Ok(ServerFrame::Ignored { op: raw.op, t: raw.t });
                };
                let d = raw.d.ok_or(FrameError::MissingPayload(OP_EVENT))?;
                let snapshot = serde_json::from_value(d)
                    .map_err(|source| FrameError::InvalidPresence { kind, source })?;
                Ok(ServerFrame::Presence {
                    kind,
                    snapshot: Box::new(snapshot),
                })
            }
            op => Ok(ServerFrame::Ignored { op, t: raw.t }),
        }
    }
}

/// Frames sent from the client to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Subscribe to a single user id.
    Initialize { subscribe_to_id: String },
    /// Keep-alive.
    Heartbeat,
}

#[derive(Serialize)]
struct InitializePayload<'a> {
    subscribe_to_id: &'a str,
}

#[derive(Serialize)]
struct RawClientFrame<'a> {
    op: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<InitializePayload<'a>>,
}

impl ClientFrame {
    pub fn initialize(subscribe_to_id: impl Into<String>) -> Self {
        ClientFrame::Initialize {
            subscribe_to_id: subscribe_to_id.into(),
        }
    }

    pub fn op(&self) -> u64 {
        match self {
            ClientFrame::Initialize { .. } => OP_INITIALIZE,
            ClientFrame::Heartbeat => OP_HEARTBEAT,
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for ClientFrame {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let d = match self {
            ClientFrame::Initialize { subscribe_to_id } => Some(InitializePayload { subscribe_to_id }),
            ClientFrame::Heartbeat => None,
        };
        RawClientFrame { op: self.op(), d }.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiscordStatus;

    #[test]
    fn test_decode_hello() {
        let frame = ServerFrame::decode(r#"{"op":1,"d":{"heartbeat_interval":30000}}"#).unwrap();
        match frame {
            ServerFrame::Hello(hello) => assert_eq!(hello.heartbeat_interval.get(), 30000),
            other => panic!("Expected Hello, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_hello_rejects_zero_interval() {
        let err = ServerFrame::decode(r#"{"op":1,"d":{"heartbeat_interval":0}}"#).unwrap_err();
        assert!(matches!(err, FrameError::InvalidHello(_)));
    }

    #[test]
    fn test_decode_hello_without_payload() {
        let err = ServerFrame::decode(r#"{"op":1}"#).unwrap_err();
        assert!(matches!(err, FrameError::MissingPayload(OP_HELLO)));
    }

    #[test]
    fn test_decode_init_state() {
        let text = r#"{"op":0,"seq":1,"t":"INIT_STATE","d":{"discord_status":"online","activities":[]}}"#;
        match ServerFrame::decode(text).unwrap() {
            ServerFrame::Presence { kind, snapshot } => {
                assert_eq!(kind, DispatchKind::InitState);
                assert_eq!(snapshot.discord_status, DiscordStatus::Online);
                assert!(snapshot.activities.is_empty());
            }
            other => panic!("Expected Presence, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_presence_update_keeps_activity_order() {
        let text = r#"{"op":0,"t":"PRESENCE_UPDATE","d":{
            "discord_status":"idle",
            "activities":[
                {"name":"Zeta","type":0},
                {"name":"Alpha","type":3},
                {"name":"Mid","type":5}
            ]
        }}"#;
        match ServerFrame::decode(text).unwrap() {
            ServerFrame::Presence { kind, snapshot } => {
                assert_eq!(kind, DispatchKind::PresenceUpdate);
                let names: Vec<&str> = snapshot.activities.iter().map(|a| a.name.as_str()).collect();
                assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
            }
            other => panic!("Expected Presence, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_invalid_presence_payload() {
        let text = r#"{"op":0,"t":"PRESENCE_UPDATE","d":{"discord_status":"sleeping"}}"#;
        let err = ServerFrame::decode(text).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidPresence { kind: DispatchKind::PresenceUpdate, .. }
        ));
    }

    #[test]
    fn test_decode_unknown_dispatch_and_op_are_ignored() {
        let unknown_t = ServerFrame::decode(r#"{"op":0,"t":"SOMETHING_NEW","d":{}}"#).unwrap();
        assert_eq!(
            unknown_t,
            ServerFrame::Ignored {
                op: 0,
                t: Some("SOMETHING_NEW".to_string())
            }
        );

        let unknown_op = ServerFrame::decode(r#"{"op":7}"#).unwrap();
        assert_eq!(unknown_op, ServerFrame::Ignored { op: 7, t: None });
    }

    #[test]
    fn test_decode_large_op_is_ignored() {
        let frame = ServerFrame::decode(r#"{"op":300,"t":"FUTURE","d":null}"#).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Ignored {
                op: 300,
                t: Some("FUTURE".to_string())
            }
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            ServerFrame::decode("not json").unwrap_err(),
            FrameError::InvalidJson(_)
        ));
        assert!(matches!(
            ServerFrame::decode(r#"{"d":{}}"#).unwrap_err(),
            FrameError::InvalidJson(_)
        ));
        assert!(matches!(
            ServerFrame::decode(r#"{"op":"hello"}"#).unwrap_err(),
            FrameError::InvalidJson(_)
        ));
    }

    #[test]
    fn test_encode_initialize() {
        let json = ClientFrame::initialize("896299292845817856").encode().unwrap();
        assert_eq!(json, r#"{"op":2,"d":{"subscribe_to_id":"896299292845817856"}}"#);
    }

    #[test]
    fn test_encode_heartbeat() {
        let json = ClientFrame::Heartbeat.encode().unwrap();
        assert_eq!(json, r#"{"op":3}"#);
    }
}
