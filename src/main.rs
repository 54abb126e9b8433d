use notilog::serve;
use notilog::Result;
use notilog::Settings;
use notilog::SledNotificationStore;
use notilog::WatchManager;
use std::env;
use std::sync::Arc;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_observability();

    let config_path = env::args().nth(1);
    let settings = Settings::load(config_path.as_deref())?;
    let listen_addr = settings.server.listen_addr()?;

    // Bootstrap failures are fatal: the process does not start.
    let store = Arc::new(SledNotificationStore::open(&settings.storage)?);
    SledNotificationStore::start_gc(&store);

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());
    let watch_manager = Arc::new(WatchManager::new(
        Arc::clone(&store),
        settings.server.push_interval(),
        graceful_rx.clone(),
    ));

    tokio::spawn(graceful_shutdown(graceful_tx));

    serve(listen_addr, Arc::clone(&store), watch_manager, graceful_rx).await;

    store.close().await?;
    info!("exiting");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected");
        },
    }

    if graceful_tx.send(()).is_err() {
        error!("no shutdown listeners remain");
    }
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
