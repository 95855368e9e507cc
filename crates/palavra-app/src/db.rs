// SQLite persistence for the display preference.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use tracing::warn;

/// Key under which the dark/light preference is stored.
pub const DARK_MODE_KEY: &str = "dark_mode";

/// Dark mode is on until the user says otherwise.
pub const DEFAULT_DARK_MODE: bool = true;

/// SQLite-backed key-value store for durable display preferences.
///
/// This is the only state that survives a restart; everything the session
/// orchestrator tracks lives in memory.
pub struct PreferenceStore {
    conn: Mutex<Connection>,
}

impl PreferenceStore {
    /// Open (or create) the store at `path` and ensure the table exists.
    /// Pass `":memory:"` for an ephemeral store (useful for tests).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path != Path::new(":memory:") {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create preference directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open preference store at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS preferences (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );
            ",
        )
        .context("failed to create preference schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("preference store mutex poisoned"))
    }

    /// Persist a JSON value under `key`, replacing any previous value.
    pub fn save(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn()?;
        let json_str =
            serde_json::to_string(value).context("failed to serialize preference value")?;
        conn.execute(
            "INSERT OR REPLACE INTO preferences (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save preference")?;
        Ok(())
    }

    /// Load the JSON value stored under `key`, or `None` if never saved.
    pub fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT value FROM preferences WHERE key = ?1")
            .context("failed to prepare preference query")?;

        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query preferences")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read preference row")?;
                let value: serde_json::Value = serde_json::from_str(&json_str)
                    .context("failed to deserialize preference value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Read the dark-mode flag. Missing or malformed values fall back to
    /// [`DEFAULT_DARK_MODE`].
    pub fn load_dark_mode(&self) -> Result<bool> {
        match self.load(DARK_MODE_KEY)? {
            Some(serde_json::Value::Bool(flag)) => Ok(flag),
            Some(other) => {
                warn!("ignoring non-boolean {DARK_MODE_KEY} preference: {other}");
                Ok(DEFAULT_DARK_MODE)
            }
            None => Ok(DEFAULT_DARK_MODE),
        }
    }

    pub fn save_dark_mode(&self, dark_mode: bool) -> Result<()> {
        self.save(DARK_MODE_KEY, &serde_json::Value::Bool(dark_mode))
    }
}

// ---------------------------------------------------------------------------
// DisplayPreference
// ---------------------------------------------------------------------------

/// The dark/light flag with its store: read once at startup, written back on
/// every change.
pub struct DisplayPreference {
    dark_mode: bool,
    store: PreferenceStore,
}

impl DisplayPreference {
    pub fn load(store: PreferenceStore) -> Result<Self> {
        let dark_mode = store
            .load_dark_mode()
            .context("failed to load display preference")?;
        Ok(Self { dark_mode, store })
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    /// Flip the flag and persist it. A failed write is logged; the in-memory
    /// value still changes so the display stays responsive.
    pub fn toggle(&mut self) -> bool {
        self.dark_mode = !self.dark_mode;
        if let Err(e) = self.store.save_dark_mode(self.dark_mode) {
            warn!("Failed to persist display preference: {:#}", e);
        }
        self.dark_mode
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
