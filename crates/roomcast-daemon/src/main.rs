//! # roomcast
//!
//! Daemon binary: loads settings, registers rooms and built-in methods, and
//! serves JSON-RPC over `WebSocket` until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use roomcast_rpc::handlers::register_all;
use roomcast_rpc::{App, Dispatcher, RoomRegistry, UserDirectory};
use roomcast_server::{RoomcastServer, ServerConfig};
use roomcast_settings::{RoomSettings, RoomcastSettings, ServerSettings};
use tracing::{info, warn};

/// How long in-flight connections get to wind down after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// roomcast JSON-RPC server.
#[derive(Parser, Debug)]
#[command(name = "roomcast", about = "Room-scoped JSON-RPC 2.0 over WebSocket")]
struct Cli {
    /// Settings file (defaults to `$ROOMCAST_SETTINGS` or `~/.roomcast/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Room to create, as `NAME=SECRET`. Repeatable.
    #[arg(long = "room", value_name = "NAME=SECRET", value_parser = parse_room_arg)]
    rooms: Vec<RoomSettings>,

    /// Log filter (overridden by `RUST_LOG`).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Layer command-line flags over loaded settings.
    fn apply(self, mut settings: RoomcastSettings) -> RoomcastSettings {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
        for room in self.rooms {
            settings.rooms.retain(|r| r.name != room.name);
            settings.rooms.push(room);
        }
        settings
    }
}

/// Parse a `--room NAME=SECRET` argument.
fn parse_room_arg(arg: &str) -> Result<RoomSettings, String> {
    let Some((name, secret)) = arg.split_once('=') else {
        return Err(format!("expected NAME=SECRET, got '{arg}'"));
    };
    if name.is_empty() {
        return Err("room name is empty".to_string());
    }
    if secret.is_empty() {
        return Err(format!("room '{name}' has an empty secret"));
    }
    Ok(RoomSettings {
        name: name.to_string(),
        secret: Some(secret.to_string()),
        secret_env: None,
    })
}

fn server_config(settings: &ServerSettings) -> ServerConfig {
    ServerConfig {
        host: settings.host.clone(),
        port: settings.port,
        max_connections: settings.max_connections,
        outbound_queue: settings.outbound_queue,
        ping_interval_secs: settings.ping_interval_secs,
        pong_timeout_secs: settings.pong_timeout_secs,
        max_message_size: settings.max_message_size,
    }
}

/// Wire rooms, built-in methods, and the transport from validated settings.
fn build_server(settings: &RoomcastSettings) -> Result<RoomcastServer> {
    settings.validate().context("invalid settings")?;

    let directory = UserDirectory::new();
    let rooms = Arc::new(RoomRegistry::new(Arc::clone(&directory)));
    for room in &settings.rooms {
        let Some(secret) = room.resolve_secret() else {
            bail!("room '{}' has no secret", room.name);
        };
        let _ = rooms.register_room(&room.name, &secret);
    }
    if rooms.is_empty() {
        warn!("no rooms configured; authenticate will always fail");
    }

    let mut dispatcher = Dispatcher::new();
    register_all(&mut dispatcher, Arc::clone(&rooms));
    info!(
        rooms = ?rooms.names(),
        methods = ?dispatcher.methods(),
        namespaces = ?dispatcher.namespaces(),
        "dispatcher ready"
    );

    let app = App::with_directory(dispatcher, directory);
    Ok(RoomcastServer::new(server_config(&settings.server), app))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(roomcast_settings::settings_path);
    let settings = roomcast_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("failed to load {}", settings_path.display()))?;
    let settings = args.apply(settings);

    roomcast_logging::init(&settings.logging.level, settings.logging.json);

    let mut server = build_server(&settings)?;
    match roomcast_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => warn!(error = %e, "metrics recorder not installed"),
    }

    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    info!("roomcast listening on ws://{addr}/rpc");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("shutting down");
    server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(SHUTDOWN_GRACE))
        .await;
    info!("shutdown complete");
    Ok(())
}
