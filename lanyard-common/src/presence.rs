//! Presence snapshot types.
//!
//! These mirror the `d` payload of `INIT_STATE` and `PRESENCE_UPDATE`
//! dispatches. Every field the gateway may omit carries a serde default so a
//! minimal payload still decodes.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Full presence state of the tracked user at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// High-level Discord status.
    pub discord_status: DiscordStatus,
    #[serde(default)]
    pub active_on_discord_mobile: bool,
    #[serde(default)]
    pub active_on_discord_desktop: bool,
    #[serde(default)]
    pub active_on_discord_web: bool,
    #[serde(default)]
    pub listening_to_spotify: bool,
    /// Spotify rich presence, `None` when not listening.
    #[serde(default)]
    pub spotify: Option<Spotify>,
    /// Discord user profile.
    #[serde(default)]
    pub discord_user: Option<DiscordUser>,
    /// Arbitrary key-value data set by the user.
    #[serde(default)]
    pub kv: HashMap<String, String>,
    /// Current activities in the order the gateway sent them.
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl PresenceSnapshot {
    /// Create a snapshot with the given status and nothing else.
    pub fn with_status(discord_status: DiscordStatus) -> Self {
        Self {
            discord_status,
            active_on_discord_mobile: false,
            active_on_discord_desktop: false,
            active_on_discord_web: false,
            listening_to_spotify: false,
            spotify: None,
            discord_user: None,
            kv: HashMap::new(),
            activities: vec![],
        }
    }

    /// Activities to display, in gateway order.
    ///
    /// With `hide_listening` set, `Listening` activities are skipped since the
    /// Spotify block already shows them.
    pub fn visible_activities(&self, hide_listening: bool) -> impl Iterator<Item = &Activity> {
        self.activities
            .iter()
            .filter(move |a| !(hide_listening && a.kind == ActivityType::Listening))
    }

    /// The custom status activity, if set.
    pub fn custom_status(&self) -> Option<&Activity> {
        self.activities.iter().find(|a| a.kind == ActivityType::Custom)
    }
}

/// Discord online status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscordStatus {
    Online,
    Idle,
    Dnd,
    Offline,
}

impl DiscordStatus {
    pub fn is_online(&self) -> bool {
        !matches!(self, DiscordStatus::Offline)
    }
}

impl std::fmt::Display for DiscordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscordStatus::Online => write!(f, "online"),
            DiscordStatus::Idle => write!(f, "idle"),
            DiscordStatus::Dnd => write!(f, "dnd"),
            DiscordStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Spotify listening activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spotify {
    /// Spotify track id, `None` for local files.
    #[serde(default)]
    pub track_id: Option<String>,
    pub timestamps: SpotifyTimestamps,
    pub song: String,
    pub artist: String,
    pub album: String,
    #[serde(default)]
    pub album_art_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyTimestamps {
    /// Epoch milliseconds.
    pub start: i64,
    /// Epoch milliseconds.
    pub end: i64,
}

impl Spotify {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamps.start)
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamps.end)
    }

    /// Track length.
    pub fn duration(&self) -> Duration {
        let length = self.timestamps.end.saturating_sub(self.timestamps.start);
        Duration::milliseconds(length.max(0))
    }

    /// Playback position at `now`, clamped to the track length.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = now.timestamp_millis().saturating_sub(self.timestamps.start);
        Duration::milliseconds(elapsed.max(0)).min(self.duration())
    }
}

/// Discord user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub public_flags: u64,
}

impl DiscordUser {
    /// Best name to show: display name, then global name, then username.
    pub fn preferred_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.global_name.as_deref())
            .unwrap_or(&self.username)
    }
}

/// A rich-presence activity (game, stream, custom status, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Snowflake id, or "custom" for the custom status.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub emoji: Option<ActivityEmoji>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub assets: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub timestamps: Option<ActivityTimestamps>,
    #[serde(default)]
    pub buttons: Option<Vec<String>>,
}

impl Activity {
    /// When the activity started, if the gateway reported it.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.timestamps
            .and_then(|t| t.start)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEmoji {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub animated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

/// Discord activity type.
///
/// Encoded as a number on the wire. Values this crate does not know about
/// are kept as `Unknown` rather than failing the whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ActivityType {
    Game,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
    Unknown(u8),
}

impl From<u8> for ActivityType {
    fn from(value: u8) -> Self {
        match value {
            0 => ActivityType::Game,
            1 => ActivityType::Streaming,
            2 => ActivityType::Listening,
            3 => ActivityType::Watching,
            4 => ActivityType::Custom,
            5 => ActivityType::Competing,
            other => ActivityType::Unknown(other),
        }
    }
}

impl From<ActivityType> for u8 {
    fn from(value: ActivityType) -> Self {
        match value {
            ActivityType::Game => 0,
            ActivityType::Streaming => 1,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Custom => 4,
            ActivityType::Competing => 5,
            ActivityType::Unknown(other) => other,
        }
    }
}
