use color_eyre::{eyre::eyre, Result};
use padstream::config::AppConfig;
use padstream::controller::GilrsSource;
use padstream::mqtt::{Connected, MqttLink};
use padstream::streaming::{SessionHandle, SessionStatus, StreamingSession};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = AppConfig::default_path();
    AppConfig::ensure_default_config(&config_path).await?;
    let config = AppConfig::load(&config_path).await?;
    info!("Loaded configuration from {}", config_path.display());

    let mut source =
        GilrsSource::new().map_err(|e| eyre!("Failed to open controller interface: {}", e))?;
    let device = source.select(config.device.preferred_name.as_deref());

    let session: StreamingSession<MqttLink<Connected>> = StreamingSession::new(
        config.mqtt.topic.clone(),
        config.mapping_table(),
        config.streaming,
    );
    let (handle, runner) = SessionHandle::new(session, config.device.sample_interval());

    let shutdown = CancellationToken::new();
    spawn_ctrl_c(shutdown.clone());
    spawn_status_logger(handle.subscribe(), shutdown.clone());

    match MqttLink::configure(config.mqtt.clone()).connect().await {
        Ok(link) => handle.attach(link).await?,
        Err(e) => warn!("Continuing without broker: {}", e),
    }
    handle.select_device(device.map(|d| d.id)).await?;

    if config.auto_start {
        // The runner is not polled yet, so the reply is awaited concurrently with it
        let starter = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = starter.start().await {
                warn!("Auto start failed: {}", e);
            }
        });
    }

    let mut session = runner.run(source, shutdown).await;
    if let Some(link) = session.detach_transport() {
        link.disconnect().wait_closed().await;
    }
    info!(
        "Shut down after {} sent and {} failed messages",
        session.stats().sent,
        session.stats().failed
    );
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn spawn_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });
}

/// Logs state transitions and sent messages
fn spawn_status_logger(mut status: watch::Receiver<SessionStatus>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut previous = status.borrow().clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let current = status.borrow_and_update().clone();
            if current.state != previous.state {
                info!("Session is {}", current.state);
            }
            if current.connected != previous.connected {
                info!("Broker connected: {}", current.connected);
            }
            if current.device != previous.device {
                match current.device {
                    Some(id) => info!("Streaming from gamepad {}", id),
                    None => warn!("No gamepad selected"),
                }
            }
            if current.last_message != previous.last_message {
                if let Some(message) = &current.last_message {
                    debug!("{}", message);
                }
            }
            if current.stats.last_error != previous.stats.last_error {
                if let Some(e) = &current.stats.last_error {
                    warn!("Publish failed: {}", e);
                }
            }
            previous = current;
        }
    });
}
