use anyhow::{Context, Result};
use driftwall_core::{config::DriftwallConfig, logging, DriftDetector};
use driftwall_host::{SqliteStore, SystemLiveState, SystemTools};
use hub::{status_body, ChannelBroadcaster, DriftEvent};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::{net::TcpListener, select, signal, sync::watch};

mod hub;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(err) = run().await {
        error!("daemon exit: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    logging::init("info");
    let config_path = std::env::var("DRIFTWALL_CONFIG")
        .unwrap_or_else(|_| "/etc/driftwall/driftwall.toml".to_string());
    let config = DriftwallConfig::load(&config_path)
        .with_context(|| format!("load config {config_path}"))?;

    info!("Driftwall daemon booting (config: {config_path})");

    let tools = Arc::new(SystemTools::from_config(&config).context("locate host tools")?);
    let database = config.database_path();
    let store = Arc::new(
        SqliteStore::open(&database)
            .with_context(|| format!("open share database {}", database.display()))?,
    );
    let live = Arc::new(SystemLiveState::new(tools, store));

    let (hub, event_rx) = ChannelBroadcaster::new();
    let detector = Arc::new(DriftDetector::new(
        config.document_path(),
        config.drift_interval(),
        live,
        Arc::new(hub),
    ));
    detector.start();

    let status_handle = tokio::spawn(status_server(
        status_addr(&config)?,
        detector.clone(),
        event_rx,
    ));

    select! {
        res = status_handle => res??,
        _ = signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    if let Some(handle) = detector.stop() {
        if let Err(err) = handle.await {
            warn!("drift loop ended abnormally: {err}");
        }
    }
    Ok(())
}

/// `DRIFTWALL_STATUS_ADDR` wins over the configured address.
fn status_addr(config: &DriftwallConfig) -> Result<SocketAddr> {
    let raw = std::env::var("DRIFTWALL_STATUS_ADDR")
        .unwrap_or_else(|_| config.daemon.status_addr.clone());
    raw.parse()
        .with_context(|| format!("parse status address {raw:?}"))
}

async fn status_server(
    addr: SocketAddr,
    detector: Arc<DriftDetector>,
    event_rx: watch::Receiver<Option<DriftEvent>>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind status endpoint {addr}"))?;
    info!("status endpoint listening on http://{addr}");

    loop {
        let (mut stream, peer) = listener.accept().await?;
        let last = detector.last_result();
        let event = event_rx.borrow().clone();
        let body = status_body(last.as_ref(), event.as_ref()).to_string();
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        if let Err(err) = stream.write_all(response.as_bytes()).await {
            warn!("failed to respond to {peer}: {err}");
        }
    }
}
