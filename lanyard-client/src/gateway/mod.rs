//! Gateway WebSocket client for live presence.
//!
//! This module handles the WebSocket connection to the presence gateway,
//! including the hello/subscribe handshake, heartbeats, and reconnection with
//! exponential backoff.

mod backoff;
mod client;
mod timer;

pub use backoff::reconnect_delay;
pub use client::GatewayClient;
