//! JSON command surface over the scan controller.
//!
//! Each command is one JSON object, e.g.
//! `{"command": "dispatch", "action": {"type": "ADD_IMAGE", "payload": {"image": "..."}}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    models::ScanSessionRecord,
    scan::{ScanAction, ScanController, ScanKind, ScanSnapshot},
    settings::ScanSettings,
    AppState,
};

const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ScanCommand {
    State,
    Dispatch {
        action: ScanAction,
    },
    Start {
        mode: ScanKind,
        user_id: String,
    },
    Process {
        #[serde(default)]
        credits_count: Option<u32>,
    },
    Recover {
        user_id: String,
    },
    History {
        user_id: String,
        #[serde(default)]
        limit: Option<u32>,
    },
    Settings,
    UpdateSettings {
        settings: ScanSettings,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CommandResponse {
    Ok(Value),
    Error(String),
}

impl From<Result<Value, String>> for CommandResponse {
    fn from(result: Result<Value, String>) -> Self {
        match result {
            Ok(value) => CommandResponse::Ok(value),
            Err(message) => CommandResponse::Error(message),
        }
    }
}

fn controller_from_state(state: &AppState) -> ScanController {
    state.scan.clone()
}

fn to_value<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

pub async fn get_scan_state(state: &AppState) -> Result<ScanSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.get_snapshot().await)
}

pub async fn dispatch_action(state: &AppState, action: ScanAction) -> Result<ScanSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.dispatch(action).await)
}

pub async fn start_scan(
    state: &AppState,
    mode: ScanKind,
    user_id: String,
) -> Result<ScanSnapshot, String> {
    let controller = controller_from_state(state);
    controller
        .start_session(mode, &user_id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn process_scan(
    state: &AppState,
    credits_count: Option<u32>,
) -> Result<ScanSnapshot, String> {
    let controller = controller_from_state(state);
    controller
        .begin_processing(credits_count.unwrap_or(1))
        .await
        .map_err(|e| e.to_string())
}

pub async fn recover_scan(
    state: &AppState,
    user_id: String,
) -> Result<Option<ScanSnapshot>, String> {
    let controller = controller_from_state(state);
    controller.recover(&user_id).await.map_err(|e| e.to_string())
}

pub async fn list_scan_history(
    state: &AppState,
    user_id: String,
    limit: Option<u32>,
) -> Result<Vec<ScanSessionRecord>, String> {
    let db = &state.db;
    db.list_scan_sessions(&user_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await
        .map_err(|e| e.to_string())
}

pub fn get_settings(state: &AppState) -> Result<ScanSettings, String> {
    Ok(state.settings.scan())
}

/// Persists the settings, then hands them to the controller.
pub fn update_settings(state: &AppState, settings: ScanSettings) -> Result<ScanSettings, String> {
    state
        .settings
        .update_scan(settings.clone())
        .map_err(|e| e.to_string())?;
    controller_from_state(state).update_settings(settings.clone());
    Ok(settings)
}

pub async fn handle_command(state: &AppState, command: ScanCommand) -> CommandResponse {
    let result = match command {
        ScanCommand::State => get_scan_state(state).await.and_then(to_value),
        ScanCommand::Dispatch { action } => dispatch_action(state, action).await.and_then(to_value),
        ScanCommand::Start { mode, user_id } => {
            start_scan(state, mode, user_id).await.and_then(to_value)
        }
        ScanCommand::Process { credits_count } => {
            process_scan(state, credits_count).await.and_then(to_value)
        }
        ScanCommand::Recover { user_id } => recover_scan(state, user_id).await.and_then(to_value),
        ScanCommand::History { user_id, limit } => list_scan_history(state, user_id, limit)
            .await
            .and_then(to_value),
        ScanCommand::Settings => get_settings(state).and_then(to_value),
        ScanCommand::UpdateSettings { settings } => {
            update_settings(state, settings).and_then(to_value)
        }
    };
    result.into()
}

/// Parses and runs one command line.
pub async fn handle_line(state: &AppState, line: &str) -> CommandResponse {
    match serde_json::from_str::<ScanCommand>(line) {
        Ok(command) => handle_command(state, command).await,
        Err(err) => CommandResponse::Error(format!("invalid command: {err}")),
    }
}
