//! Persisted per-app volume preferences.
//!
//! Keyed SQLite table: package identifier -> volume level + mute flag.
//! Lives in the daemon, not the tracking core: the engine observes and
//! reports sessions, it never persists anything itself.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

const SCHEMA_VERSION: i32 = 1;

/// Upper bound for stored volume levels, in percent.
pub const MAX_VOLUME: u8 = 100;

/// One stored preference row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumePreference {
    pub package: String,
    /// Volume in percent, clamped to 0-100 on write.
    pub volume_level: u8,
    pub muted: bool,
}

pub struct PrefsStore {
    conn: Connection,
}

impl PrefsStore {
    /// Open the preference database at `path`, bootstrapping the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn =
            Connection::open(path).with_context(|| format!("open prefs db {:?}", path))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory prefs db")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert or overwrite the preference for a package.
    pub fn upsert(&self, pref: &VolumePreference) -> Result<()> {
        let volume = pref.volume_level.min(MAX_VOLUME);
        self.conn
            .execute(
                "INSERT INTO app_volume_preferences (package, volume_level, muted)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(package) DO UPDATE SET volume_level = ?2, muted = ?3",
                params![pref.package, volume, pref.muted],
            )
            .with_context(|| format!("upsert preference for {}", pref.package))?;
        Ok(())
    }

    /// Stored preference for one package, if any.
    pub fn get(&self, package: &str) -> Result<Option<VolumePreference>> {
        self.conn
            .query_row(
                "SELECT package, volume_level, muted FROM app_volume_preferences WHERE package = ?1",
                params![package],
                map_pref_row,
            )
            .optional()
            .with_context(|| format!("read preference for {package}"))
    }

    /// All stored preferences, ordered by package.
    pub fn list(&self) -> Result<Vec<VolumePreference>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT package, volume_level, muted FROM app_volume_preferences ORDER BY package",
            )
            .context("prepare preference listing")?;
        let rows = stmt.query_map([], map_pref_row).context("list preferences")?;
        let mut prefs = Vec::new();
        for row in rows {
            prefs.push(row.context("read preference row")?);
        }
        Ok(prefs)
    }

    /// Remove the stored preference for a package.
    ///
    /// Returns `true` when a row was deleted.
    pub fn delete(&self, package: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM app_volume_preferences WHERE package = ?1",
                params![package],
            )
            .with_context(|| format!("delete preference for {package}"))?;
        Ok(changed > 0)
    }
}

fn map_pref_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VolumePreference> {
    let volume: i64 = row.get(1)?;
    Ok(VolumePreference {
        package: row.get(0)?,
        volume_level: volume.clamp(0, MAX_VOLUME as i64) as u8,
        muted: row.get(2)?,
    })
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS app_volume_preferences (
            package TEXT PRIMARY KEY,
            volume_level INTEGER NOT NULL,
            muted INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .context("create prefs schema")?;

    let version_raw: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if version_raw.is_none() {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )
        .context("insert schema version")?;
    }
    Ok(())
}
