//! In-memory media session registry.
//!
//! Holds the current session snapshot and computes the added/removed
//! delta on every refresh. Refresh builds a fresh map and swaps the
//! shared reference wholesale, so concurrent readers observe either the
//! pre- or post-refresh snapshot in full, never a mix.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use mixer_types::{RawSessionRecord, SessionInfo, SessionMap};

/// Immutable view of the full session set at one instant.
pub type SessionSnapshot = Arc<SessionMap>;

/// Outcome of one refresh cycle.
///
/// Entries present in both generations are not listed separately: the
/// source provides full replacement semantics, so any successful refresh
/// counts as a change and consumers receive the whole snapshot.
#[derive(Clone, Debug)]
pub struct RefreshResult {
    /// The complete post-refresh session map.
    pub snapshot: SessionSnapshot,
    /// Packages present now that were absent before.
    pub added: BTreeSet<String>,
    /// Packages present before that are absent now.
    pub removed: BTreeSet<String>,
}

/// Concurrency-safe store of `package -> SessionInfo`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    current: Mutex<SessionSnapshot>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with the normalized contents of `raw` and
    /// report the delta against the previous snapshot.
    ///
    /// The input is the full live set as reported by the source. Records
    /// sharing a package identifier collapse to the last one in
    /// iteration order. Records with a blank package identifier are
    /// skipped individually and never fail the whole refresh. This call
    /// is a pure in-memory transform; it performs no I/O.
    pub fn refresh<I>(&self, raw: I) -> RefreshResult
    where
        I: IntoIterator<Item = RawSessionRecord>,
    {
        let mut next = SessionMap::new();
        for record in raw {
            if record.package.trim().is_empty() {
                tracing::warn!(
                    token = %record.token,
                    "skipping session record with blank package identifier"
                );
                continue;
            }
            let info = SessionInfo::from_record(&record);
            next.insert(info.package.clone(), info);
        }
        let next = Arc::new(next);

        let previous = {
            let mut current = self.current.lock().unwrap_or_else(|err| err.into_inner());
            std::mem::replace(&mut *current, next.clone())
        };

        let added = next
            .keys()
            .filter(|package| !previous.contains_key(*package))
            .cloned()
            .collect();
        let removed = previous
            .keys()
            .filter(|package| !next.contains_key(*package))
            .cloned()
            .collect();

        RefreshResult {
            snapshot: next,
            added,
            removed,
        }
    }

    /// The current session map. Safe to call from any thread while a
    /// refresh is in progress.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.current
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    /// Session info for one package, if present.
    pub fn get(&self, package: &str) -> Option<SessionInfo> {
        self.snapshot().get(package).cloned()
    }

    /// Whether a package currently has an active session.
    pub fn contains(&self, package: &str) -> bool {
        self.snapshot().contains_key(package)
    }

    /// Packages whose session is currently playing, in unspecified order.
    pub fn playing_packages(&self) -> Vec<String> {
        self.snapshot()
            .values()
            .filter(|info| info.is_playing)
            .map(|info| info.package.clone())
            .collect()
    }

    /// Reset to the empty map.
    pub fn clear(&self) {
        let mut current = self.current.lock().unwrap_or_else(|err| err.into_inner());
        *current = Arc::new(SessionMap::new());
    }
}
