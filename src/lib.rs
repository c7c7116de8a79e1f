//! WebSocket signaling relay.
//!
//! Clients join named meetings and everything else they send is forwarded verbatim
//! to the other members of the meeting named in the message. Used as a rendezvous
//! for WebRTC offer/answer/candidate exchange; no media passes through it.

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod relay;
pub mod room;
pub mod server;
pub mod signaling;

pub use config::RelayConfig;
pub use connection::{Connection, ConnectionId, ConnectionState};
pub use error::{AppError, Result};
pub use metrics::RelaySnapshot;
pub use relay::{Dispatch, Relay};
pub use server::RelayServer;
pub use signaling::SignalingMessage;
