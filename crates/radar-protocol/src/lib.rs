//! # radar-protocol
//!
//! Wire protocol for the Radar live event stream that feeds the marketplace
//! admin dashboard.
//!
//! ## Frame Types
//!
//! - `Connect` / `Connected` - Authenticated handshake
//! - `Event` - Named server push (activity, notification, stats)
//! - `Join` / `Leave` - Server-side room membership
//! - `Ping` / `Pong` / `Error` - Keepalive and errors
//!
//! ## Example
//!
//! ```rust
//! use radar_protocol::{codec, Frame};
//! use serde_json::json;
//!
//! let frame = Frame::event("new_activity", json!({"id": "a1"}));
//!
//! let text = codec::encode_text(&frame).unwrap();
//! assert_eq!(codec::decode_text(&text).unwrap(), frame);
//! ```

pub mod codec;
pub mod events;
pub mod frames;
pub mod version;

pub use codec::{decode, decode_text, encode, encode_text, ProtocolError};
pub use frames::{Frame, FrameType};
pub use version::{Version, PROTOCOL_VERSION};
