// Palavra entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open the preference store and read the display preference
// 4. Build the HTTP transport
// 5. Create mpsc channels and the session
// 6. Spawn the session event loop
// 7. Run the console until the user quits
// 8. Cleanup on exit

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use palavra_app::config;
use palavra_app::db::{DisplayPreference, PreferenceStore};
use palavra_app::session::{self, Session};
use palavra_app::transport::{HttpTransport, Transport};
use palavra_cli::console;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Palavra starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: backend={}, timeout={}s",
        config.api.base_url, config.api.timeout_secs
    );

    // 3. Open the preference store
    let db_path = config.preference_db_path();
    let store = PreferenceStore::open(&db_path).context("failed to open preference store")?;
    let preference = DisplayPreference::load(store)?;
    info!(
        "Preference store opened at {} (dark_mode={})",
        db_path.display(),
        preference.dark_mode()
    );

    // 4. Build the HTTP transport
    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::from_config(&config.api).context("failed to build HTTP transport")?,
    );

    // 5. Create mpsc channels and the session
    let (events_tx, events_rx) = mpsc::channel(64);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);
    let session = Session::new(transport, preference, events_tx);

    // 6. Spawn the session event loop
    let session_handle = tokio::spawn(async move {
        if let Err(e) = session::run(cmd_rx, events_rx, ui_tx, session).await {
            error!("Session loop error: {}", e);
        }
    });

    // 7. Run the console (blocks until the user quits or stdin closes)
    info!("Application ready");
    if let Err(e) = console::run(ui_rx, cmd_tx).await {
        error!("Console error: {}", e);
    }

    // 8. Cleanup: wait for the session task to finish (with timeout)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = session_handle.await;
    })
    .await;

    info!("Palavra shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by the console).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("palavra.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("palavra_app=info,palavra_cli=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
