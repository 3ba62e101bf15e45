//! Daemon runtime wiring.
//!
//! Connects the file-backed session source, the tracking controller, the
//! preference store, and the snapshot reporter.

use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;

use mixer_types::wire;
use session_tracker::registry::{SessionRegistry, SessionSnapshot};
use session_tracker::tracker::TrackingController;

use crate::config::TrackConfig;
use crate::file_source::FileSessionSource;
use crate::prefs::PrefsStore;

/// Run the tracking daemon until tracking stops.
pub fn run_track(config: TrackConfig, install_ctrlc: bool) -> Result<()> {
    let prefs = PrefsStore::open(&config.prefs_db)?;
    let source = Arc::new(FileSessionSource::new(config.manifest.clone()));
    let registry = Arc::new(SessionRegistry::new());
    let controller = TrackingController::shared(source, registry);

    if install_ctrlc {
        let controller_for_signal = controller.clone();
        let _ = ctrlc::set_handler(move || {
            controller_for_signal.stop();
        });
    }

    let (snapshot_tx, snapshot_rx) = unbounded::<SessionSnapshot>();
    controller
        .start(Box::new(move |snapshot| {
            let _ = snapshot_tx.send(snapshot);
        }))
        .with_context(|| format!("start tracking sessions from {:?}", config.manifest))?;

    tracing::info!(manifest = ?config.manifest, "tracking media sessions");

    // The sink owns the only sender; when stop() drops it the loop ends.
    for snapshot in snapshot_rx.iter() {
        report_snapshot(&snapshot, &prefs, config.emit_wire);
    }

    Ok(())
}

fn report_snapshot(snapshot: &SessionSnapshot, prefs: &PrefsStore, emit_wire: bool) {
    if snapshot.is_empty() {
        tracing::info!("no active media sessions");
    } else {
        let mut entries: Vec<_> = snapshot.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (package, info) in entries {
            match prefs.get(package).ok().flatten() {
                Some(pref) => tracing::info!(
                    package = %package,
                    state = %info.playback_state,
                    playing = info.is_playing,
                    volume = pref.volume_level,
                    muted = pref.muted,
                    "session"
                ),
                None => tracing::info!(
                    package = %package,
                    state = %info.playback_state,
                    playing = info.is_playing,
                    "session"
                ),
            }
        }
    }

    if emit_wire {
        for entry in wire::encode_snapshot(snapshot) {
            println!("{entry}");
        }
    }
}
