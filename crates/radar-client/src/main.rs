//! # radar-watch
//!
//! Follows the Radar live event stream from a terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Follow every topic with the token from the environment
//! RADAR_TOKEN=... radar-watch
//!
//! # Only stats, with a custom config
//! radar-watch --config /path/to/radar.toml --topic stats
//!
//! # Join a room once connected
//! radar-watch --room shop-42
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use radar_client::{
    metrics, ActivityFeed, Config, ConnectionState, EventChannel, LiveStats, NotificationBadge,
    SubscriptionGuard, Topic,
};
use radar_transport::WebSocketConnector;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "radar-watch", version, about = "Follow the Radar live event stream")]
struct Args {
    /// Configuration file (defaults to radar.toml, /etc/radar, ~/.config/radar)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Admin session token
    #[arg(long, env = "RADAR_TOKEN", hide_env_values = true)]
    token: String,

    /// REST API base URL; overrides the config file
    #[arg(long, env = "RADAR_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Topics to follow (activity, notification, stats); all by default
    #[arg(short, long = "topic", value_delimiter = ',')]
    topics: Vec<Topic>,

    /// Rooms to join after every successful connect
    #[arg(long = "room")]
    rooms: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "radar=info,radar_client=info,radar_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(url) = args.api_base_url.clone() {
        config.api_base_url = url;
    }

    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let channel_config = config
        .channel_config()
        .context("Invalid live endpoint configuration")?;
    let connector = Arc::new(WebSocketConnector::new(config.websocket_config()));
    let channel = EventChannel::create(channel_config, connector);

    let topics = if args.topics.is_empty() {
        Topic::ALL.to_vec()
    } else {
        args.topics.clone()
    };

    let feed = ActivityFeed::new(config.feed.capacity);
    let stats = LiveStats::new();
    let badge = NotificationBadge::new();
    let mut guards: Vec<SubscriptionGuard> = Vec::new();

    for topic in &topics {
        match topic {
            Topic::Activity => {
                guards.push(feed.attach(&channel).into_guard());
                guards.push(
                    channel
                        .subscribe_activities(|activity, name| {
                            info!(
                                message = %name,
                                id = %activity.id,
                                kind = %activity.activity_type,
                                "{}",
                                activity.description
                            );
                        })
                        .into_guard(),
                );
            }
            Topic::Notification => {
                guards.push(badge.attach(&channel).into_guard());
                guards.push(
                    channel
                        .subscribe_notifications(|notification| {
                            info!(id = %notification.id, kind = ?notification.kind, "{}", notification.title);
                        })
                        .into_guard(),
                );
            }
            Topic::Stats => {
                guards.push(stats.attach(&channel).into_guard());
                guards.push(
                    channel
                        .subscribe_stats(|update| {
                            info!(kind = %update.kind.as_str(), value = ?update.value(), "Stats update");
                        })
                        .into_guard(),
                );
            }
        }
    }

    // Log state changes and rejoin rooms after every connect.
    let mut status = channel.watch_status();
    let watcher = {
        let channel = channel.clone();
        let rooms = args.rooms.clone();
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let state = *status.borrow_and_update();
                info!(state = %state, attempts = channel.connection_status().reconnect_attempts, "Live status");
                if state == ConnectionState::Connected {
                    for room in &rooms {
                        channel.join_room(room);
                    }
                }
            }
        })
    };

    info!(endpoint = %channel.endpoint(), topics = ?topics, "Starting radar-watch");
    channel.connect(args.token.clone());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    watcher.abort();
    drop(guards);
    channel.dispose();

    info!(
        activities = feed.len(),
        unread_notifications = badge.unread(),
        stats = ?stats.snapshot(),
        dispatched = channel.dispatcher_stats().envelopes,
        "Session summary"
    );

    Ok(())
}
