// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tokio::time::Instant;

/// The reachability of the backend as last determined by the monitor.
///
/// ```text
/// Unknown ──► Probing ──► Available ◄──────────────┐
///                │            │                    │
///                ▼            ▼ (failed re-check)  │
///          ColdStarting ◄── Probing                │
///                │                                 │
///                ├─────────────────────────────────┘
///                ▼
///           Unavailable ── probe() ──► Probing
/// ```
///
/// A failed re-check of an available backend never moves straight to
/// [`Unavailable`][AvailabilityState::Unavailable]; only repeated failures inside one
/// cold-start sequence do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum AvailabilityState {
    /// The backend has not been checked yet.
    #[default]
    Unknown,

    /// The first check of a sequence is running.
    Probing,

    /// The backend did not answer yet and is expected to be waking up.
    ColdStarting {
        /// The number of failed checks so far in this sequence, starting at 1.
        attempt: u32,
        /// The number of checks after which the backend is declared unavailable.
        max_attempts: u32,
    },

    /// The backend answered the last check.
    Available {
        /// When the last successful check completed.
        last_success_at: Instant,
    },

    /// The backend failed every check of the last sequence.
    Unavailable {
        /// The number of consecutive failed checks.
        failed_attempts: u32,
    },
}

impl AvailabilityState {
    /// Returns `true` if the backend answered the last check.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    /// Returns `true` while a check sequence is running.
    ///
    /// A user interface shows this as "warming up" rather than "down".
    #[must_use]
    pub fn is_warming_up(&self) -> bool {
        matches!(self, Self::Probing | Self::ColdStarting { .. })
    }

    /// Returns `true` if the last check sequence failed.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns `true` for the outcomes of a check sequence, available or unavailable.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.is_available() || self.is_unavailable()
    }

    /// Returns the snake-case name of the state, as used in log events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Probing => "probing",
            Self::ColdStarting { .. } => "cold_starting",
            Self::Available { .. } => "available",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}
