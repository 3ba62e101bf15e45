//! Tracking lifecycle orchestration.
//!
//! Bridges the session source's subscribe-plus-signal model to registry
//! refreshes and snapshot notifications. The controller never polls on a
//! timer: it fetches once at start (a session may already be active
//! before the subscription lands) and then refreshes only on source
//! change signals.

use std::sync::{Arc, Mutex};

use crate::registry::{RefreshResult, SessionRegistry, SessionSnapshot};
use crate::source::{ChangeHandler, SessionSource, SourceError, SourceSignal};

/// Handler receiving the full post-refresh snapshot.
///
/// Invoked exactly once per successful refresh cycle while tracking is
/// active. Always receives the complete current session map, never a
/// diff.
pub type SnapshotHandler = Box<dyn Fn(SessionSnapshot) + Send + Sync>;

/// Lifecycle state of the tracking controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingState {
    /// Not subscribed; registry empty. Initial and terminal state.
    Stopped,
    /// Subscribing and performing the first fetch.
    Starting,
    /// Subscribed; change signals drive refreshes.
    Tracking,
}

struct Lifecycle {
    state: TrackingState,
    sink: Option<SnapshotHandler>,
}

/// Orchestrates start/stop of session tracking.
///
/// `start`/`stop` are serialized against each other by an outer control
/// mutex that also covers the subscribe/unsubscribe pair; the inner
/// lifecycle mutex orders change-signal handling against state
/// transitions. Registry reads stay lock-free beneath both.
pub struct TrackingController {
    source: Arc<dyn SessionSource>,
    registry: Arc<SessionRegistry>,
    control: Mutex<()>,
    lifecycle: Mutex<Lifecycle>,
}

impl TrackingController {
    /// Create a shared controller over the given collaborators.
    pub fn shared(source: Arc<dyn SessionSource>, registry: Arc<SessionRegistry>) -> Arc<Self> {
        Arc::new(Self {
            source,
            registry,
            control: Mutex::new(()),
            lifecycle: Mutex::new(Lifecycle {
                state: TrackingState::Stopped,
                sink: None,
            }),
        })
    }

    /// The registry backing this controller.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TrackingState {
        self.lifecycle
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .state
    }

    /// Begin tracking: subscribe to the source, perform the first fetch,
    /// and deliver the initial snapshot to `sink`.
    ///
    /// Idempotent: when already starting or tracking this is a no-op and
    /// the existing subscription and sink are kept. On subscription or
    /// first-fetch failure the controller reports the error and returns
    /// to [`TrackingState::Stopped`]; the caller may retry later (for
    /// example after the user grants access). No retry is attempted here.
    pub fn start(self: &Arc<Self>, sink: SnapshotHandler) -> Result<(), SourceError> {
        let _control = self.control.lock().unwrap_or_else(|err| err.into_inner());

        {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|err| err.into_inner());
            if lifecycle.state != TrackingState::Stopped {
                tracing::debug!(state = ?lifecycle.state, "start ignored; tracking already active");
                return Ok(());
            }
            lifecycle.state = TrackingState::Starting;
            lifecycle.sink = Some(sink);
        }

        let weak = Arc::downgrade(self);
        let handler: ChangeHandler = Arc::new(move |signal| {
            if let Some(controller) = weak.upgrade() {
                controller.on_source_changed(signal);
            }
        });

        if let Err(err) = self.source.subscribe(handler) {
            self.abort_start();
            tracing::error!(error = %err, "failed to subscribe to session source");
            return Err(err);
        }

        let records = match self.source.fetch_active_sessions() {
            Ok(records) => records,
            Err(err) => {
                self.source.unsubscribe();
                self.abort_start();
                tracing::error!(error = %err, "initial session fetch failed");
                return Err(err);
            }
        };

        let session_count = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|err| err.into_inner());
            let result = self.registry.refresh(records);
            log_delta(&result);
            lifecycle.state = TrackingState::Tracking;
            if let Some(sink) = lifecycle.sink.as_ref() {
                sink(result.snapshot.clone());
            }
            result.snapshot.len()
        };
        tracing::info!(sessions = session_count, "started tracking media sessions");
        Ok(())
    }

    /// Stop tracking: unsubscribe, clear the registry, drop the sink.
    ///
    /// Valid from any state and idempotent. A refresh in flight when this
    /// runs may still deliver its notification, but the registry is
    /// cleared before `stop` returns.
    pub fn stop(&self) {
        let _control = self.control.lock().unwrap_or_else(|err| err.into_inner());

        let was_active = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|err| err.into_inner());
            let was_active = lifecycle.state != TrackingState::Stopped;
            lifecycle.state = TrackingState::Stopped;
            lifecycle.sink = None;
            was_active
        };

        // Torn down outside the lifecycle lock so a change handler blocked
        // on it can observe Stopped and bail out before the source joins
        // its signal thread.
        self.source.unsubscribe();
        self.registry.clear();

        if was_active {
            tracing::info!("stopped tracking media sessions");
        }
    }

    /// Handle one change signal from the source.
    ///
    /// Only meaningful while tracking; signals received in any other
    /// state are ignored. A fetch failure skips this cycle only: the
    /// prior snapshot stays in place and no notification is emitted.
    fn on_source_changed(&self, signal: SourceSignal) {
        let lifecycle = self.lifecycle.lock().unwrap_or_else(|err| err.into_inner());
        if lifecycle.state != TrackingState::Tracking {
            tracing::debug!(state = ?lifecycle.state, "change signal ignored while not tracking");
            return;
        }

        let records = match signal {
            SourceSignal::Sessions(records) => records,
            SourceSignal::Invalidated => match self.source.fetch_active_sessions() {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(error = %err, "session fetch failed; keeping previous snapshot");
                    return;
                }
            },
        };

        let result = self.registry.refresh(records);
        log_delta(&result);
        if let Some(sink) = lifecycle.sink.as_ref() {
            sink(result.snapshot.clone());
        }
    }

    fn abort_start(&self) {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|err| err.into_inner());
        lifecycle.state = TrackingState::Stopped;
        lifecycle.sink = None;
    }
}

fn log_delta(result: &RefreshResult) {
    for package in &result.added {
        tracing::debug!(package = %package, "session added");
    }
    for package in &result.removed {
        tracing::debug!(package = %package, "session removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixer_types::RawSessionRecord;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockSource {
        fetch_results: Mutex<VecDeque<Result<Vec<RawSessionRecord>, SourceError>>>,
        handler: Mutex<Option<ChangeHandler>>,
        subscribe_calls: AtomicUsize,
        unsubscribe_calls: AtomicUsize,
        deny_subscribe: AtomicBool,
    }

    impl MockSource {
        fn push_fetch(&self, result: Result<Vec<RawSessionRecord>, SourceError>) {
            self.fetch_results
                .lock()
                .expect("fetch results")
                .push_back(result);
        }

        fn fire(&self, signal: SourceSignal) {
            let handler = self.handler.lock().expect("handler").clone();
            if let Some(handler) = handler {
                handler(signal);
            }
        }
    }

    impl SessionSource for MockSource {
        fn fetch_active_sessions(&self) -> Result<Vec<RawSessionRecord>, SourceError> {
            self.fetch_results
                .lock()
                .expect("fetch results")
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn subscribe(&self, handler: ChangeHandler) -> Result<(), SourceError> {
            if self.deny_subscribe.load(Ordering::SeqCst) {
                return Err(SourceError::PermissionDenied);
            }
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            *self.handler.lock().expect("handler") = Some(handler);
            Ok(())
        }

        fn unsubscribe(&self) {
            self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
            *self.handler.lock().expect("handler") = None;
        }
    }

    fn record(package: &str, token: &str, state_code: i32) -> RawSessionRecord {
        RawSessionRecord {
            package: package.to_string(),
            token: token.to_string(),
            state_code,
        }
    }

    fn recording_sink() -> (SnapshotHandler, Arc<Mutex<Vec<SessionSnapshot>>>) {
        let seen: Arc<Mutex<Vec<SessionSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: SnapshotHandler =
            Box::new(move |snapshot| sink_seen.lock().expect("seen").push(snapshot));
        (sink, seen)
    }

    fn controller_over(source: &Arc<MockSource>) -> Arc<TrackingController> {
        TrackingController::shared(source.clone(), Arc::new(SessionRegistry::new()))
    }

    #[test]
    fn start_fetches_and_delivers_initial_snapshot() {
        let source = Arc::new(MockSource::default());
        source.push_fetch(Ok(vec![record("com.spotify", "t1", 3)]));
        let controller = controller_over(&source);
        let (sink, seen) = recording_sink();

        controller.start(sink).expect("start");

        assert_eq!(controller.state(), TrackingState::Tracking);
        assert_eq!(source.subscribe_calls.load(Ordering::SeqCst), 1);
        let seen = seen.lock().expect("seen");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains_key("com.spotify"));
    }

    #[test]
    fn start_twice_subscribes_once() {
        let source = Arc::new(MockSource::default());
        let controller = controller_over(&source);
        let (first_sink, _) = recording_sink();
        let (second_sink, second_seen) = recording_sink();

        controller.start(first_sink).expect("first start");
        controller.start(second_sink).expect("second start");

        assert_eq!(source.subscribe_calls.load(Ordering::SeqCst), 1);
        assert!(second_seen.lock().expect("seen").is_empty());
    }

    #[test]
    fn subscribe_denied_returns_to_stopped() {
        let source = Arc::new(MockSource::default());
        source.deny_subscribe.store(true, Ordering::SeqCst);
        let controller = controller_over(&source);
        let (sink, seen) = recording_sink();

        let err = controller.start(sink).expect_err("start should fail");

        assert!(matches!(err, SourceError::PermissionDenied));
        assert_eq!(controller.state(), TrackingState::Stopped);
        assert!(seen.lock().expect("seen").is_empty());
    }

    #[test]
    fn initial_fetch_failure_aborts_start() {
        let source = Arc::new(MockSource::default());
        source.push_fetch(Err(SourceError::Unavailable {
            reason: "boom".to_string(),
        }));
        let controller = controller_over(&source);
        let (sink, seen) = recording_sink();

        let err = controller.start(sink).expect_err("start should fail");

        assert!(matches!(err, SourceError::Unavailable { .. }));
        assert_eq!(controller.state(), TrackingState::Stopped);
        assert_eq!(source.unsubscribe_calls.load(Ordering::SeqCst), 1);
        assert!(seen.lock().expect("seen").is_empty());
        assert!(controller.registry().snapshot().is_empty());
    }

    #[test]
    fn change_signal_with_payload_refreshes_and_notifies() {
        let source = Arc::new(MockSource::default());
        let controller = controller_over(&source);
        let (sink, seen) = recording_sink();
        controller.start(sink).expect("start");

        source.fire(SourceSignal::Sessions(vec![record("com.a", "t1", 2)]));

        let seen = seen.lock().expect("seen");
        assert_eq!(seen.len(), 2);
        assert!(seen[1].contains_key("com.a"));
        assert!(!seen[1].get("com.a").expect("a").is_playing);
    }

    #[test]
    fn invalidation_signal_refetches() {
        let source = Arc::new(MockSource::default());
        let controller = controller_over(&source);
        let (sink, seen) = recording_sink();
        controller.start(sink).expect("start");

        source.push_fetch(Ok(vec![record("com.b", "t2", 3)]));
        source.fire(SourceSignal::Invalidated);

        let seen = seen.lock().expect("seen");
        assert_eq!(seen.len(), 2);
        assert!(seen[1].get("com.b").expect("b").is_playing);
    }

    #[test]
    fn fetch_failure_during_change_cycle_keeps_snapshot_and_emits_nothing() {
        let source = Arc::new(MockSource::default());
        source.push_fetch(Ok(vec![record("com.a", "t1", 3)]));
        let controller = controller_over(&source);
        let (sink, seen) = recording_sink();
        controller.start(sink).expect("start");

        source.push_fetch(Err(SourceError::Unavailable {
            reason: "transient".to_string(),
        }));
        source.fire(SourceSignal::Invalidated);

        assert_eq!(seen.lock().expect("seen").len(), 1);
        let snapshot = controller.registry().snapshot();
        assert!(snapshot.get("com.a").expect("a").is_playing);
    }

    #[test]
    fn signals_after_stop_are_ignored() {
        let source = Arc::new(MockSource::default());
        let controller = controller_over(&source);
        let (sink, seen) = recording_sink();
        controller.start(sink).expect("start");

        // Keep the handler alive past unsubscribe, as a source thread
        // might during teardown.
        let handler = source
            .handler
            .lock()
            .expect("handler")
            .clone()
            .expect("subscribed");
        controller.stop();
        handler(SourceSignal::Sessions(vec![record("com.late", "t9", 3)]));

        assert_eq!(seen.lock().expect("seen").len(), 1);
        assert!(controller.registry().snapshot().is_empty());
    }

    #[test]
    fn stop_clears_registry_and_is_idempotent() {
        let source = Arc::new(MockSource::default());
        source.push_fetch(Ok(vec![record("com.a", "t1", 3)]));
        let controller = controller_over(&source);
        let (sink, _) = recording_sink();
        controller.start(sink).expect("start");
        assert!(!controller.registry().snapshot().is_empty());

        controller.stop();
        assert_eq!(controller.state(), TrackingState::Stopped);
        assert!(controller.registry().snapshot().is_empty());

        controller.stop();
        assert_eq!(controller.state(), TrackingState::Stopped);
    }

    #[test]
    fn stop_without_start_is_a_noop() {
        let source = Arc::new(MockSource::default());
        let controller = controller_over(&source);

        controller.stop();

        assert_eq!(controller.state(), TrackingState::Stopped);
    }
}
