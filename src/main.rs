use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use huddle::model::SlotGrid;
use huddle::portal::{Portal, PortalConfig};
use huddle::wire;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("HUDDLE_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    huddle::observability::init(metrics_port);

    let port = env_or("HUDDLE_PORT", "4160");
    let bind = env_or("HUDDLE_BIND", "0.0.0.0");
    let data_dir = env_or("HUDDLE_DATA_DIR", "./data");
    let app_name = env_or("HUDDLE_APP_NAME", "huddle");
    let max_connections: usize = env_parse("HUDDLE_MAX_CONNECTIONS", 256);

    let grid = SlotGrid::from_hours(
        env_parse("HUDDLE_OPEN_HOUR", 8.0),
        env_parse("HUDDLE_CLOSE_HOUR", 21.0),
        env_parse("HUDDLE_STEP_MINUTES", 30),
    )?;

    let admin_pins: HashSet<String> = env_or("HUDDLE_ADMIN_PINS", "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if admin_pins.is_empty() {
        tracing::warn!("HUDDLE_ADMIN_PINS is empty; admin views are unreachable");
    }

    let portal = Arc::new(Portal::open(PortalConfig {
        data_dir: PathBuf::from(&data_dir),
        grid,
        admin_pins,
        app_name,
    })?);
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("huddle listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  rooms: {}", portal.scheduler.rooms().len());
    info!("  slots: {:02}:{:02}-{:02}:{:02} step {}m",
        grid.open / 60, grid.open % 60, grid.close / 60, grid.close % 60, grid.step);
    info!("  max_connections: {max_connections}");
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(huddle::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(huddle::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(huddle::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let portal = portal.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, portal).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(huddle::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(std::time::Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }

    info!("huddle stopped");
    Ok(())
}
