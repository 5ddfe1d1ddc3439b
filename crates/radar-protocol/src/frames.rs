//! Frame types for the Radar live protocol.
//!
//! Frames are the unit of communication between the dashboard client and
//! the live endpoint. The same frame type is carried as JSON in text
//! messages and as MessagePack in binary messages.

use serde::{Deserialize, Serialize};

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FrameType {
    Connect = 0x01,
    Connected = 0x02,
    Event = 0x03,
    Join = 0x04,
    Leave = 0x05,
    Ping = 0x06,
    Pong = 0x07,
    Error = 0x08,
}

impl From<FrameType> for u8 {
    fn from(ft: FrameType) -> u8 {
        ft as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0x01 => Ok(FrameType::Connect),
            0x02 => Ok(FrameType::Connected),
            0x03 => Ok(FrameType::Event),
            0x04 => Ok(FrameType::Join),
            0x05 => Ok(FrameType::Leave),
            0x06 => Ok(FrameType::Ping),
            0x07 => Ok(FrameType::Pong),
            0x08 => Ok(FrameType::Error),
            _ => Err("Invalid frame type"),
        }
    }
}

/// A protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Client handshake carrying the session token.
    #[serde(rename = "connect")]
    Connect {
        /// Protocol major version spoken by the client.
        version: u8,
        /// Bearer token for the admin session.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Server confirmation of an accepted handshake.
    #[serde(rename = "connected")]
    Connected {
        /// Server-assigned connection identifier.
        connection_id: String,
        /// Negotiated protocol version.
        version: u8,
        /// Recommended heartbeat interval in milliseconds.
        #[serde(default)]
        heartbeat: u32,
    },

    /// A named server push.
    #[serde(rename = "event")]
    Event {
        /// Message name, e.g. `new_activity`.
        name: String,
        /// Message body, opaque at this layer.
        #[serde(default)]
        data: serde_json::Value,
    },

    /// Join a server-side room.
    #[serde(rename = "join")]
    Join { room: String },

    /// Leave a server-side room.
    #[serde(rename = "leave")]
    Leave { room: String },

    /// Keepalive ping.
    #[serde(rename = "ping")]
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Keepalive pong.
    #[serde(rename = "pong")]
    Pong {
        /// Echoed timestamp from ping.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Error reported by the server.
    #[serde(rename = "error")]
    Error {
        /// Error code.
        code: u16,
        /// Human-readable error message.
        message: String,
    },
}

impl Frame {
    /// Get the frame type.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Connect { .. } => FrameType::Connect,
            Frame::Connected { .. } => FrameType::Connected,
            Frame::Event { .. } => FrameType::Event,
            Frame::Join { .. } => FrameType::Join,
            Frame::Leave { .. } => FrameType::Leave,
            Frame::Ping { .. } => FrameType::Ping,
            Frame::Pong { .. } => FrameType::Pong,
            Frame::Error { .. } => FrameType::Error,
        }
    }

    /// Create a new Connect frame.
    #[must_use]
    pub fn connect(version: u8, token: Option<String>) -> Self {
        Frame::Connect { version, token }
    }

    /// Create a new Connected frame.
    #[must_use]
    pub fn connected(connection_id: impl Into<String>, version: u8, heartbeat: u32) -> Self {
        Frame::Connected {
            connection_id: connection_id.into(),
            version,
            heartbeat,
        }
    }

    /// Create a new Event frame.
    #[must_use]
    pub fn event(name: impl Into<String>, data: serde_json::Value) -> Self {
        Frame::Event {
            name: name.into(),
            data,
        }
    }

    /// Create a new Join frame.
    #[must_use]
    pub fn join(room: impl Into<String>) -> Self {
        Frame::Join { room: room.into() }
    }

    /// Create a new Leave frame.
    #[must_use]
    pub fn leave(room: impl Into<String>) -> Self {
        Frame::Leave { room: room.into() }
    }

    /// Create a new Ping frame.
    #[must_use]
    pub fn ping() -> Self {
        Frame::Ping { timestamp: None }
    }

    /// Create a new Pong frame.
    #[must_use]
    pub fn pong(timestamp: Option<u64>) -> Self {
        Frame::Pong { timestamp }
    }

    /// Create a new Error frame.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Frame::Error {
            code,
            message: message.into(),
        }
    }
}
