//! Built-in payload types.

use serde::{Deserialize, Serialize};

use crate::kind::MessageKind;

/// A payload that travels under a fixed envelope kind.
pub trait Payload: Serialize {
    const KIND: MessageKind;
}

/// Asks the peer to report on test `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInfoRequest {
    pub id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInfoResponse {
    pub id: u32,
    pub message: String,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoMessage {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub seq: u64,
}

/// Protocol-level error reply, sent by dispatch layers that choose to answer
/// rejected frames instead of dropping them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl Payload for TestInfoRequest {
    const KIND: MessageKind = MessageKind::TestInfo;
}

impl Payload for TestInfoResponse {
    const KIND: MessageKind = MessageKind::TestInfo;
}

impl Payload for EchoMessage {
    const KIND: MessageKind = MessageKind::Echo;
}

impl Payload for Ping {
    const KIND: MessageKind = MessageKind::Ping;
}

impl Payload for ErrorResponse {
    const KIND: MessageKind = MessageKind::Error;
}
