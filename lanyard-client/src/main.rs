//! Lanyard watcher - logs a Discord user's live presence.

use std::env;

use chrono::{Duration, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lanyard_client::{Config, Connectivity, DisplayConfig, GatewayClient, PresenceView, WebSocketTransport};
use lanyard_common::{Activity, ActivityType, DiscordStatus, Spotify};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("lanyard-watch {}", VERSION);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Make sure lanyard.toml exists or set LANYARD__GATEWAY__SUBJECT_ID.",
            e
        )
    })?;
    tracing::info!("Watching presence of {}", config.gateway.subject_id);

    let client = GatewayClient::new(config.gateway.clone(), WebSocketTransport);

    let display_config = config.display.clone();
    let _subscription = client.subscribe(move |view| {
        tracing::info!("{}", describe(view, &display_config));
    });

    client.connect();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    client.shutdown().await;

    Ok(())
}

/// One-line summary of the current presence.
fn describe(view: &PresenceView, display: &DisplayConfig) -> String {
    let Some(snapshot) = view.snapshot.as_deref() else {
        return match view.connectivity {
            Connectivity::Connecting => "Loading...".to_string(),
            Connectivity::Open => "Waiting for presence".to_string(),
            Connectivity::Closed => "Disconnected".to_string(),
        };
    };

    let mut parts = vec![format!("● {}", status_label(snapshot.discord_status))];
    if view.connectivity == Connectivity::Connecting {
        parts.push("(reconnecting)".to_string());
    }
    parts.extend(
        snapshot
            .visible_activities(display.hide_spotify_activity)
            .map(describe_activity),
    );
    if let Some(spotify) = &snapshot.spotify {
        parts.push(describe_spotify(spotify));
    }

    parts.join(" | ")
}

fn status_label(status: DiscordStatus) -> &'static str {
    match status {
        DiscordStatus::Online => "ONLINE",
        DiscordStatus::Idle => "IDLE",
        DiscordStatus::Dnd => "DoNotDisturb",
        DiscordStatus::Offline => "OFFLINE",
    }
}

fn describe_activity(activity: &Activity) -> String {
    let headline = match activity.kind {
        ActivityType::Custom => {
            let emoji = activity.emoji.as_ref().map(|e| e.name.as_str());
            let text = activity.state.as_deref();
            return match (emoji, text) {
                (Some(emoji), Some(text)) => format!("{} {}", emoji, text),
                (None, Some(text)) => text.to_string(),
                (Some(emoji), None) => emoji.to_string(),
                (None, None) => activity.name.clone(),
            };
        }
        ActivityType::Game => format!("Playing {}", activity.name),
        ActivityType::Streaming => format!("Streaming {}", activity.name),
        ActivityType::Listening => format!("Listening to {}", activity.name),
        ActivityType::Watching => format!("Watching {}", activity.name),
        ActivityType::Competing => format!("Competing in {}", activity.name),
        ActivityType::Unknown(_) => activity.name.clone(),
    };

    match activity.details.as_deref() {
        Some(details) => format!("{}: {}", headline, details),
        None => headline,
    }
}

fn describe_spotify(spotify: &Spotify) -> String {
    format!(
        "Listening to {} by {} [{} / {}]",
        spotify.song,
        spotify.artist,
        format_duration(spotify.elapsed_at(Utc::now())),
        format_duration(spotify.duration())
    )
}

fn format_duration(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
