//! Lanyard presence client.
//!
//! Subscribes to one Discord user's presence over the Lanyard WebSocket
//! gateway and keeps a [`PresenceStore`] current for a rendering layer.

pub mod config;
pub mod error;
pub mod gateway;
pub mod store;
pub mod test_util;
pub mod transport;

pub use config::{Config, DisplayConfig, GatewayConfig};
pub use error::{Error, Result};
pub use gateway::GatewayClient;
pub use store::{Connectivity, PresenceStore, PresenceView, StoreUpdate, Subscription};
pub use transport::{Connection, Transport, WebSocketTransport};
