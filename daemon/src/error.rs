use thiserror::Error;

use crate::haptics::PulseKind;

/// Why the time to the next alarm could not be determined.
///
/// Every variant ends the cycle with a single corrective pulse; none is fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmError {
    #[error("no alarm is set")]
    NoAlarmSet,

    #[error("permission to read alarms is required")]
    PermissionRequired,

    #[error("alarm query failed: {0}")]
    QueryFailed(String),

    #[error("cannot parse alarm time '{input}': {reason}")]
    TimeParse { input: String, reason: String },
}

impl AlarmError {
    /// The single pulse played in place of a countdown.
    pub fn corrective_pulse(&self) -> PulseKind {
        match self {
            AlarmError::NoAlarmSet
            | AlarmError::PermissionRequired
            | AlarmError::QueryFailed(_) => PulseKind::Light,
            AlarmError::TimeParse { .. } => PulseKind::Strong,
        }
    }
}
