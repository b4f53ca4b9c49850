//! Inverter startup handshake stages.
//!
//! ```text
//!            HV lost (from any stage)
//!   ┌──────────────────────────────────────────────┐
//!   ▼                                              │
//! ┌──────┐ inverter ┌────────────────┐ pedal < 5 % ┌─────────────────┐
//! │ Idle │ disabled │ LockoutCleared │ + RTD held  │ EnableRequested │
//! │  0   │─────────▶│       3        │────────────▶│        4        │
//! └──────┘          └────────────────┘             └────────┬────────┘
//!                          ▲ inverter disabled              │ inverter enabled
//!                          │                                ▼
//!                   ┌──────┴──┐   inverter enabled  ┌──────────────┐
//!                   │ Driving │◀────────────────────│ ReadyToDrive │
//!                   │    6    │                     │      5       │
//!                   └─────────┘                     └──────────────┘
//! ```
//!
//! Discriminants keep the stage numbers used on the dashboard and in logs.

/// Startup stage of one inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum StartupStage {
    /// HV absent or inverter not yet reporting.
    #[default]
    Idle = 0,
    /// Lockout cleared, waiting for the ready-to-drive request.
    LockoutCleared = 3,
    /// Enable commanded, waiting for the inverter to confirm.
    EnableRequested = 4,
    /// Enable confirmed this cycle; ready-to-drive alert fired.
    ReadyToDrive = 5,
    /// Driving.
    Driving = 6,
}

impl StartupStage {
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Explicit transition table.  Anything not listed is rejected.
    pub fn can_transition(self, next: Self) -> bool {
        use StartupStage::{Driving, EnableRequested, Idle, LockoutCleared, ReadyToDrive};
        matches!(
            (self, next),
            (_, Idle)
                | (_, LockoutCleared)
                | (LockoutCleared, EnableRequested)
                | (EnableRequested, ReadyToDrive)
                | (ReadyToDrive | Driving, Driving)
        )
    }

    /// Stages in which the inverter must not be commanded on.
    pub fn forces_inverter_disabled(self) -> bool {
        self < Self::EnableRequested
    }
}

/// One-shot outputs of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupEvent {
    /// The inverter confirmed enable: sound the ready-to-drive alert.
    ReadyToDriveAlert,
}
