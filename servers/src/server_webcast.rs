use anyhow::{Context, Result};
use lib_webcast::{connect, LogHandler, RoomDiscovery, Session};
use tokio::signal;

mod webcast_logic;
use webcast_logic::{config, logger};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), config.log_level())?;

    let session_config = config.session_config()?;
    let discovery = RoomDiscovery::new(config.discovery_options())?;
    let room = discovery
        .discover(config.live_url()?)
        .await
        .context("room discovery failed")?;

    let target = config.connect_target(room);
    let stream = connect(&target).await.context("push connection failed")?;
    let session = Session::start(target.room.room_id.clone(), stream, session_config, LogHandler);

    // Wait for a shutdown signal, or for the session to close itself
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        result = terminate() => {
            result?;
            log::info!("SIGTERM received, initiating shutdown.");
        }
        _ = session.closed() => {
            log::warn!("Session closed itself, shutting down.");
        }
    }

    session.close().await;
    log::info!("Shutdown complete.");
    Ok(())
}

#[cfg(unix)]
async fn terminate() -> Result<()> {
    let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    term_signal.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> Result<()> {
    // On non-unix platforms, just wait forever.
    std::future::pending::<()>().await;
    Ok(())
}
