use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::scan::{RestoredState, ScanState};

impl Database {
    /// Stores the latest state of an active session for crash recovery.
    /// States without a user or request id are not persisted.
    pub async fn save_snapshot(&self, state: &ScanState) -> Result<()> {
        let (Some(user_id), Some(request_id)) = (state.user_id.clone(), state.request_id.clone())
        else {
            return Ok(());
        };
        let phase = state.phase.as_str();
        let payload = serde_json::to_string(state).context("failed to serialize scan snapshot")?;
        let updated_at = Utc::now().to_rfc3339();

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO scan_snapshots (user_id, request_id, phase, payload, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                     request_id = excluded.request_id,
                     phase = excluded.phase,
                     payload = excluded.payload,
                     updated_at = excluded.updated_at",
                params![user_id, request_id, phase, payload, updated_at],
            )
            .with_context(|| "failed to upsert scan snapshot")?;
            Ok(())
        })
        .await
    }

    pub async fn load_snapshot(&self, user_id: &str) -> Result<Option<RestoredState>> {
        let user_id = user_id.to_string();
        let payload: Option<String> = self
            .execute(move |conn| {
                let payload = conn
                    .query_row(
                        "SELECT payload FROM scan_snapshots WHERE user_id = ?1",
                        params![user_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(payload)
            })
            .await?;

        payload
            .map(|raw| {
                serde_json::from_str::<RestoredState>(&raw)
                    .context("failed to deserialize scan snapshot")
            })
            .transpose()
    }

    pub async fn clear_snapshot(&self, user_id: &str) -> Result<()> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM scan_snapshots WHERE user_id = ?1",
                params![user_id],
            )
            .with_context(|| "failed to delete scan snapshot")?;
            Ok(())
        })
        .await
    }
}
