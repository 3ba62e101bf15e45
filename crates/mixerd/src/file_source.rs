//! File-backed session source.
//!
//! Stands in for the platform session facility: the live session set is a
//! JSON manifest (an array of raw session records) and the asynchronous
//! change signal comes from a filesystem watcher on the manifest path.
//! An unreadable manifest maps to `PermissionDenied`; everything else
//! transient (missing file, parse failure) maps to `Unavailable`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use mixer_types::RawSessionRecord;
use session_tracker::source::{ChangeHandler, SessionSource, SourceError, SourceSignal};

pub struct FileSessionSource {
    path: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileSessionSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            watcher: Mutex::new(None),
        }
    }
}

impl SessionSource for FileSessionSource {
    fn fetch_active_sessions(&self) -> Result<Vec<RawSessionRecord>, SourceError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|err| map_io_error(&err))?;
        parse_manifest(&raw)
    }

    fn subscribe(&self, handler: ChangeHandler) -> Result<(), SourceError> {
        let manifest_name = self.path.file_name().map(|name| name.to_os_string());
        let mut watcher =
            notify::recommended_watcher(move |event: notify::Result<notify::Event>| match event {
                Ok(event) => {
                    let touches_manifest = event
                        .paths
                        .iter()
                        .any(|path| path.file_name() == manifest_name.as_deref());
                    let is_change =
                        event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove();
                    if touches_manifest && is_change {
                        handler(SourceSignal::Invalidated);
                    }
                }
                Err(err) => tracing::warn!(error = %err, "session manifest watch error"),
            })
            .map_err(|err| map_watch_error(&err))?;

        // Watch the parent directory: editors and atomic writers replace
        // the manifest by rename, which a file-level watch would miss.
        let watch_root = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher
            .watch(watch_root, RecursiveMode::NonRecursive)
            .map_err(|err| map_watch_error(&err))?;

        let mut guard = self.watcher.lock().unwrap_or_else(|err| err.into_inner());
        *guard = Some(watcher);
        Ok(())
    }

    fn unsubscribe(&self) {
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .take();
        drop(watcher);
    }
}

fn parse_manifest(raw: &str) -> Result<Vec<RawSessionRecord>, SourceError> {
    serde_json::from_str(raw).map_err(|err| SourceError::Unavailable {
        reason: format!("parse session manifest: {err}"),
    })
}

fn map_io_error(err: &io::Error) -> SourceError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        SourceError::PermissionDenied
    } else {
        SourceError::Unavailable {
            reason: err.to_string(),
        }
    }
}

fn map_watch_error(err: &notify::Error) -> SourceError {
    match &err.kind {
        notify::ErrorKind::Io(io_err) if io_err.kind() == io::ErrorKind::PermissionDenied => {
            SourceError::PermissionDenied
        }
        _ => SourceError::Unavailable {
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn parse_manifest_accepts_record_array() {
        let raw = r#"[
            {"package": "com.spotify", "token": "t1", "state_code": 3},
            {"package": "com.youtube", "token": "t2", "state_code": 2}
        ]"#;
        let records = parse_manifest(raw).expect("parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].package, "com.spotify");
        assert_eq!(records[1].state_code, 2);
    }

    #[test]
    fn parse_manifest_rejects_garbage_as_unavailable() {
        let err = parse_manifest("not json").expect_err("should fail");
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[test]
    fn io_permission_errors_map_to_permission_denied() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(
            map_io_error(&denied),
            SourceError::PermissionDenied
        ));

        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(
            map_io_error(&missing),
            SourceError::Unavailable { .. }
        ));
    }

    #[test]
    fn fetch_missing_manifest_is_unavailable_not_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = FileSessionSource::new(dir.path().join("missing.json"));
        let err = source
            .fetch_active_sessions()
            .expect_err("missing manifest should fail");
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[test]
    fn fetch_reads_live_session_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        std::fs::write(
            &path,
            r#"[{"package": "com.a", "token": "t1", "state_code": 3}]"#,
        )
        .expect("write manifest");

        let source = FileSessionSource::new(path);
        let records = source.fetch_active_sessions().expect("fetch");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].package, "com.a");
    }

    #[test]
    fn subscribe_signals_on_manifest_change() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "[]").expect("write manifest");

        let source = FileSessionSource::new(path.clone());
        let (tx, rx) = crossbeam_channel::unbounded();
        let handler: ChangeHandler = Arc::new(move |signal| {
            let _ = tx.send(signal);
        });
        source.subscribe(handler).expect("subscribe");

        std::fs::write(
            &path,
            r#"[{"package": "com.a", "token": "t1", "state_code": 3}]"#,
        )
        .expect("rewrite manifest");

        let signal = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("change signal");
        assert!(matches!(signal, SourceSignal::Invalidated));

        source.unsubscribe();
        source.unsubscribe();
    }
}
