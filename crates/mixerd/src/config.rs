use std::path::PathBuf;

/// Runtime settings for the tracking daemon.
#[derive(Clone, Debug)]
pub struct TrackConfig {
    /// Session manifest consumed by the file-backed source.
    pub manifest: PathBuf,
    /// Per-app volume preference database.
    pub prefs_db: PathBuf,
    /// Dump wire-encoded snapshot entries to stdout after each refresh.
    pub emit_wire: bool,
}
