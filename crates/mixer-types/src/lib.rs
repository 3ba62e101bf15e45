//! Shared value types for the volume mixer.
//!
//! Defines the session data model exchanged between the tracking engine,
//! the daemon, and UI consumers, plus the line-oriented wire encoding.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw playback-state codes as reported by the platform session facility.
///
/// Codes outside the known range normalize to [`PlaybackState::Unknown`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    None,
    Stopped,
    Paused,
    Playing,
    FastForwarding,
    Rewinding,
    Buffering,
    Error,
    Connecting,
    SkippingPrev,
    SkippingNext,
    SkippingQueueItem,
    /// Unrecognized platform code, preserved verbatim.
    Unknown(i32),
}

impl PlaybackState {
    /// Normalize a raw platform state code.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Stopped,
            2 => Self::Paused,
            3 => Self::Playing,
            4 => Self::FastForwarding,
            5 => Self::Rewinding,
            6 => Self::Buffering,
            7 => Self::Error,
            8 => Self::Connecting,
            9 => Self::SkippingPrev,
            10 => Self::SkippingNext,
            11 => Self::SkippingQueueItem,
            other => Self::Unknown(other),
        }
    }

    /// The raw platform code this state normalizes from.
    pub fn raw(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Stopped => 1,
            Self::Paused => 2,
            Self::Playing => 3,
            Self::FastForwarding => 4,
            Self::Rewinding => 5,
            Self::Buffering => 6,
            Self::Error => 7,
            Self::Connecting => 8,
            Self::SkippingPrev => 9,
            Self::SkippingNext => 10,
            Self::SkippingQueueItem => 11,
            Self::Unknown(code) => *code,
        }
    }

    /// `true` only for [`PlaybackState::Playing`].
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Playing => write!(f, "PLAYING"),
            Self::FastForwarding => write!(f, "FAST_FORWARDING"),
            Self::Rewinding => write!(f, "REWINDING"),
            Self::Buffering => write!(f, "BUFFERING"),
            Self::Error => write!(f, "ERROR"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::SkippingPrev => write!(f, "SKIPPING_PREV"),
            Self::SkippingNext => write!(f, "SKIPPING_NEXT"),
            Self::SkippingQueueItem => write!(f, "SKIPPING_QUEUE_ITEM"),
            Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/// One session as reported by a session source, before normalization.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawSessionRecord {
    /// Stable identifier of the owning application.
    pub package: String,
    /// Opaque identifier of this session instance. Not stable across
    /// reconnects.
    pub token: String,
    /// Raw platform playback-state code.
    pub state_code: i32,
}

/// Immutable snapshot of one session's identity and playback state.
///
/// Created fresh on every refresh cycle and superseded, never mutated,
/// on the next. `is_playing` is always derived from `playback_state`;
/// construct via [`SessionInfo::new`] to keep the two consistent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionInfo {
    /// Owning application package identifier; the dedup key.
    pub package: String,
    /// Opaque session instance token.
    pub token: String,
    /// Normalized playback state.
    pub playback_state: PlaybackState,
    /// Derived: `playback_state == Playing`.
    pub is_playing: bool,
}

impl SessionInfo {
    /// Build a session snapshot, deriving `is_playing` from the state.
    pub fn new(package: impl Into<String>, token: impl Into<String>, state: PlaybackState) -> Self {
        Self {
            package: package.into(),
            token: token.into(),
            playback_state: state,
            is_playing: state.is_playing(),
        }
    }

    /// Normalize a raw source record.
    pub fn from_record(record: &RawSessionRecord) -> Self {
        Self::new(
            record.package.clone(),
            record.token.clone(),
            PlaybackState::from_raw(record.state_code),
        )
    }
}

/// Line-oriented wire encoding consumed by UI collaborators.
///
/// Each entry is `<package>:<is_playing>`. Package identifiers may
/// themselves contain colons, so decoding splits on the *last* colon.
pub mod wire {
    use super::SessionInfo;
    use std::collections::HashMap;

    /// Encode one session entry.
    pub fn encode_entry(package: &str, is_playing: bool) -> String {
        format!("{package}:{is_playing}")
    }

    /// Encode a full snapshot, ordered by package for stable output.
    pub fn encode_snapshot(sessions: &HashMap<String, SessionInfo>) -> Vec<String> {
        let mut entries: Vec<String> = sessions
            .values()
            .map(|info| encode_entry(&info.package, info.is_playing))
            .collect();
        entries.sort();
        entries
    }

    /// Decode one entry back into `(package, is_playing)`.
    ///
    /// Returns `None` for entries without a colon, with an empty package,
    /// or with a trailing segment that is not `true`/`false`.
    pub fn decode_entry(entry: &str) -> Option<(String, bool)> {
        let (package, playing) = entry.rsplit_once(':')?;
        if package.is_empty() {
            return None;
        }
        let playing = match playing {
            "true" => true,
            "false" => false,
            _ => return None,
        };
        Some((package.to_string(), playing))
    }
}

/// Convenience alias for the full session map keyed by package.
pub type SessionMap = HashMap<String, SessionInfo>;
