//! Session source abstraction.
//!
//! The platform facility that enumerates live media sessions and signals
//! when the active set changes. Implementations are supplied to the
//! tracking controller at construction time; nothing here is reached
//! through ambient or global lookup.

use std::sync::Arc;

use mixer_types::RawSessionRecord;
use thiserror::Error;

/// Failure conditions reported by a session source.
///
/// An empty successful fetch means zero active sessions and is distinct
/// from every variant here; callers must never conflate the two.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The host has not granted the access needed to enumerate or
    /// subscribe to sessions. Retryable once access is granted.
    #[error("session access not granted")]
    PermissionDenied,

    /// Transient failure fetching the current set or registering the
    /// change subscription.
    #[error("session source unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Payload delivered with a source change signal.
#[derive(Clone, Debug)]
pub enum SourceSignal {
    /// The source delivered the full current set along with the signal.
    Sessions(Vec<RawSessionRecord>),
    /// The live set changed; the current set must be re-fetched.
    Invalidated,
}

/// Handler registered with [`SessionSource::subscribe`].
///
/// Invoked on a thread owned by the source whenever the active set
/// changes. The signal is always about the *entire* current set, never
/// an incremental update.
pub type ChangeHandler = Arc<dyn Fn(SourceSignal) + Send + Sync>;

/// A facility that enumerates currently active media sessions and can
/// signal when the active set changes.
pub trait SessionSource: Send + Sync {
    /// Report the complete live session set.
    fn fetch_active_sessions(&self) -> Result<Vec<RawSessionRecord>, SourceError>;

    /// Register the change handler. At most one handler is active at a
    /// time; subscribing again replaces the previous registration.
    fn subscribe(&self, handler: ChangeHandler) -> Result<(), SourceError>;

    /// Deregister the change handler. Not being subscribed is a no-op,
    /// not an error.
    fn unsubscribe(&self);
}
