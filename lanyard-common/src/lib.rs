//! Lanyard Common Types
//!
//! Shared types used by the presence client: gateway frames and the
//! decoded presence snapshot.

pub mod presence;
pub mod protocol;

pub use presence::{
    Activity, ActivityEmoji, ActivityTimestamps, ActivityType, DiscordStatus, DiscordUser,
    PresenceSnapshot, Spotify, SpotifyTimestamps,
};
pub use protocol::{ClientFrame, DispatchKind, FrameError, Hello, ServerFrame};
