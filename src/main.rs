//! Topicsync - keeps an IRC channel topic and a Discord channel topic in sync.
//!
//! Both networks are connected independently; every topic change is fed
//! through one queue into the bridge, which forwards new topics to the
//! other side and drops echoes of topics it already knows.

mod bridge;
mod common;
mod config;
mod discord;
mod irc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};

use bridge::{
    log_state_changes, AlertFormatter, ChannelBundle, ChannelPairing, ConnectionSupervisor,
    TopicBridge, Transports,
};
use common::reconnect::ReconnectConfig;
use common::Transport;
use config::{find_config_path, load_and_validate};
use discord::DiscordTransport;
use irc::IrcTransport;

/// How long shutdown waits for tasks to wind down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Topicsync v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = find_config_path().map_err(|e| {
        error!("{}", e);
        e
    })?;
    info!("Loading configuration from {}...", config_path.display());

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!(
            "Please ensure {} exists and is properly formatted.",
            config_path.display()
        );
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  IRC server: {}", config.irc_address());
    info!("  IRC nick: {}", config.irc.nick);
    info!("  IRC channel: {}", config.irc.channel);
    info!("  Discord channel: {}", config.discord.channel_id);
    info!("  Reconnect delay: {}s", config.reconnect_delay_secs);

    let pairing = ChannelPairing::from_config(&config)?;
    let alert = config.alert.as_ref().map(AlertFormatter::from_config);
    if alert.is_some() {
        info!("Topic alerts enabled");
    }

    // ============================================================
    // Transports and channels
    // ============================================================
    let irc: Arc<dyn Transport> = Arc::new(IrcTransport::new(config.irc.clone()));
    let discord: Arc<dyn Transport> = Arc::new(DiscordTransport::new(&config.discord)?);
    let transports = Transports {
        irc: irc.clone(),
        discord: discord.clone(),
    };

    let channels = ChannelBundle::new();
    let reconnect = ReconnectConfig::new(config.reconnect_delay());

    // ============================================================
    // Spawn the bridge core and one supervisor per side
    // ============================================================
    let bridge = TopicBridge::new(pairing, transports, alert);
    let mut bridge_task = tokio::spawn(bridge.run(channels.bridge.events_rx));

    let supervisors = [irc, discord].map(|transport| {
        let side = transport.side();
        let supervisor = ConnectionSupervisor::new(
            transport,
            reconnect.clone(),
            channels.bridge.events_tx.clone(),
            channels.control.shutdown_rx.clone(),
        );
        tokio::spawn(log_state_changes(side, supervisor.subscribe()));
        tokio::spawn(supervisor.run())
    });
    // The supervisors hold the only senders from here on
    drop(channels.bridge.events_tx);

    info!("Program will now run till a shutdown signal is received...");

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => true,
        _ = &mut bridge_task => false,
    };

    if !shutdown {
        warn!("Bridge task ended unexpectedly");
    }

    info!("The service is shutting down...");
    if let Err(e) = channels.control.shutdown_tx.send(true) {
        warn!("Shutdown channel closed: {}", e);
    }

    let wind_down = async {
        for supervisor in supervisors {
            if let Err(e) = supervisor.await {
                warn!("Supervisor task panicked: {}", e);
            }
        }
        if shutdown {
            if let Err(e) = bridge_task.await {
                warn!("Bridge task panicked: {}", e);
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, wind_down).await.is_err() {
        warn!("Shutdown timed out");
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Got SIGINT..."),
        _ = terminate => info!("Got SIGTERM..."),
    }
}
