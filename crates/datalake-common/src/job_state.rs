//! Remote job states and terminal outcomes
//!
//! Remote services report job progress as strings. [`JobState::normalize`] is
//! the only place those strings are turned into a [`JobState`]; anything it
//! does not recognize is rejected instead of being passed through.

use serde::Serialize;
use thiserror::Error;

/// State of a remotely executed job (e.g. a Glue crawler run)
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive, serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Start has not been requested yet
    #[default]
    NotStarted,
    /// Job is running
    Running,
    /// Job finished its work and is shutting down
    Stopping,
    /// Job is idle after a successful run
    Ready,
    /// Last run failed
    Failed,
    /// Job stopped in a state that is neither success nor failure
    Unknown,
}

/// A status string that does not map to any [`JobState`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized job state '{0}'")]
pub struct UnrecognizedState(pub String);

impl JobState {
    /// Map a raw remote status string to a state.
    ///
    /// Matching ignores ASCII case and surrounding whitespace.
    pub fn normalize(raw: &str) -> Result<Self, UnrecognizedState> {
        raw.trim()
            .parse()
            .map_err(|_| UnrecognizedState(raw.to_string()))
    }

    /// Job is still making progress toward a terminal state
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }
}

/// How a polled job ended, as observed by the caller
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOutcome {
    /// Job reached the ready state
    Ready,
    /// Job reported failure
    Failed,
    /// Job stopped in an unexpected state
    Unknown,
    /// Polling budget ran out while the job was still in progress.
    /// The remote job is left running.
    #[strum(serialize = "TIMEOUT")]
    #[serde(rename = "TIMEOUT")]
    TimedOut,
}

impl JobOutcome {
    /// Outcome for a terminal state, `None` for states that keep polling
    pub fn from_state(state: JobState) -> Option<Self> {
        match state {
            JobState::Ready => Some(Self::Ready),
            JobState::Failed => Some(Self::Failed),
            JobState::Unknown => Some(Self::Unknown),
            JobState::NotStarted | JobState::Running | JobState::Stopping => None,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Ready)
    }
}
