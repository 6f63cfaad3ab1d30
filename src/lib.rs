pub mod db;
pub mod models;
pub mod scan;
pub mod settings;
mod utils;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use db::Database;
use scan::{commands::handle_line, ScanController};
use settings::SettingsStore;

pub struct AppState {
    pub db: Database,
    pub scan: ScanController,
    pub settings: SettingsStore,
}

/// Runs the JSON-lines command loop on stdin/stdout until stdin closes.
pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    info!("scanflow starting up...");

    let data_dir = settings::data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let database = Database::new(data_dir.join("scanflow.sqlite3"))?;
    let settings_store = SettingsStore::new(data_dir.join("settings.json"))?;
    let scan_controller = ScanController::new(database.clone(), settings_store.scan());

    // Bring back the session that was active when the host last exited.
    if let Some(user_id) = settings::recovery_user() {
        match scan_controller.recover(&user_id).await {
            Ok(Some(snapshot)) => warn!(
                "Recovered scan session for {user_id} in phase {}",
                snapshot.state.phase.as_str()
            ),
            Ok(None) => {}
            Err(err) => warn!("Failed to recover scan session for {user_id}: {err:#}"),
        }
    }

    let state = AppState {
        db: database,
        scan: scan_controller,
        settings: settings_store,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read command")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(&state, line).await;
        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        stdout
            .write_all(encoded.as_bytes())
            .await
            .context("failed to write response")?;
        stdout.flush().await?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}
