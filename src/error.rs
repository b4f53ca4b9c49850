//! Unified error types for the VCU core.
//!
//! A single `Error` enum that every subsystem converts into, so the control
//! loop handles failures uniformly.  Safety conditions are **not** errors:
//! they are reported through the [`SafetyFault`] / [`SafetyWarning`]
//! bitmasks owned by the safety checker and never abort a cycle.

use core::fmt;

use heapless::Vec;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor reading could not be mapped to a percentage.
    Sensor(SensorError),
    /// Configuration is invalid or could not be decoded.
    Config(ConfigError),
    /// The bus transport rejected a frame.
    Can(CanError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Can(e) => write!(f, "can: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// `spec_min == spec_max`: the percent mapping is undefined.
    ZeroSpan,
    /// The raw sample is NaN or infinite.
    NonFinite,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSpan => write!(f, "calibration span is zero"),
            Self::NonFinite => write!(f, "raw sample is not finite"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A sensor calibration has `spec_min == spec_max`.
    ZeroSpan(&'static str),
    /// A value is outside its allowed range.
    ValidationFailed(&'static str),
    /// The stored blob could not be decoded.
    Decode,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSpan(name) => write!(f, "{name}: zero calibration span"),
            Self::ValidationFailed(what) => write!(f, "validation failed: {what}"),
            Self::Decode => write!(f, "could not decode configuration"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// CAN errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanError {
    /// Transmit queue is full.
    TxQueueFull,
    /// The controller is bus-off.
    BusOff,
}

impl fmt::Display for CanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TxQueueFull => write!(f, "transmit queue full"),
            Self::BusOff => write!(f, "bus off"),
        }
    }
}

impl From<CanError> for Error {
    fn from(e: CanError) -> Self {
        Self::Can(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Fault-class safety conditions.  Any set bit blocks torque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SafetyFault {
    /// An accelerator sensor failed power or signal init at startup.
    TpsInitFailed = 1 << 0,
    /// The brake pressure sensor failed power or signal init at startup.
    BpsInitFailed = 1 << 1,
    /// An accelerator sensor has a zero calibration span.
    TpsNotCalibrated = 1 << 2,
    /// The brake pressure sensor has a zero calibration span.
    BpsNotCalibrated = 1 << 3,
    /// TPS0 outside its calibrated range (open/short suspected).
    Tps0OutOfRange = 1 << 4,
    /// TPS1 outside its calibrated range (open/short suspected).
    Tps1OutOfRange = 1 << 5,
    /// BPS0 outside its calibrated range (open/short suspected).
    BpsOutOfRange = 1 << 6,
    /// Redundant accelerator sensors disagree for too long.
    TpsOutOfSync = 1 << 7,
    /// Accelerator and brake applied together.
    TpsBpsImplausible = 1 << 8,
    /// Battery pack above its maximum temperature.
    PackOverTemperature = 1 << 9,
    /// Power draw beyond the fault ceiling.
    PowerDrawExceeded = 1 << 10,
    /// The RTD button, HVIL sense or LV supply input failed init.
    SwitchInitFailed = 1 << 11,
    /// A wheel speed, wheel position or steering sensor failed init.
    ChassisInitFailed = 1 << 12,
}

impl SafetyFault {
    pub const ALL: [Self; 13] = [
        Self::TpsInitFailed,
        Self::BpsInitFailed,
        Self::TpsNotCalibrated,
        Self::BpsNotCalibrated,
        Self::Tps0OutOfRange,
        Self::Tps1OutOfRange,
        Self::BpsOutOfRange,
        Self::TpsOutOfSync,
        Self::TpsBpsImplausible,
        Self::PackOverTemperature,
        Self::PowerDrawExceeded,
        Self::SwitchInitFailed,
        Self::ChassisInitFailed,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u32 {
        self as u32
    }

    /// Split a fault bitmask into its named faults.
    pub fn decompose(mask: u32) -> Vec<Self, 16> {
        Self::ALL
            .iter()
            .copied()
            .filter(|f| mask & f.mask() != 0)
            .collect()
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TpsInitFailed => write!(f, "TPS init failed"),
            Self::BpsInitFailed => write!(f, "BPS init failed"),
            Self::TpsNotCalibrated => write!(f, "TPS not calibrated"),
            Self::BpsNotCalibrated => write!(f, "BPS not calibrated"),
            Self::Tps0OutOfRange => write!(f, "TPS0 out of range"),
            Self::Tps1OutOfRange => write!(f, "TPS1 out of range"),
            Self::BpsOutOfRange => write!(f, "BPS out of range"),
            Self::TpsOutOfSync => write!(f, "TPS out of sync"),
            Self::TpsBpsImplausible => write!(f, "TPS/BPS implausible"),
            Self::PackOverTemperature => write!(f, "pack over temperature"),
            Self::PowerDrawExceeded => write!(f, "power draw exceeded"),
            Self::SwitchInitFailed => write!(f, "switch input init failed"),
            Self::ChassisInitFailed => write!(f, "chassis sensor init failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Safety warnings
// ---------------------------------------------------------------------------

/// Warning-class conditions.  Observable, but never block torque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SafetyWarning {
    /// Accelerator sensors disagree, still inside the debounce window.
    TpsOutOfSync = 1 << 0,
    /// HV interlock termination sense reads low (HV absent).
    HvilTerminationLost = 1 << 1,
    /// 12 V supply below its warning threshold.
    LvBatteryLow = 1 << 2,
    /// Power draw above the configured ceiling; torque is being limited.
    PowerDrawHigh = 1 << 3,
    /// An analog pedal input did not deliver a fresh sample this cycle.
    SensorStale = 1 << 4,
}

impl SafetyWarning {
    /// Return the bitmask for this warning.
    pub const fn mask(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for SafetyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TpsOutOfSync => write!(f, "TPS disagreement"),
            Self::HvilTerminationLost => write!(f, "HVIL termination lost"),
            Self::LvBatteryLow => write!(f, "LV battery low"),
            Self::PowerDrawHigh => write!(f, "power draw high"),
            Self::SensorStale => write!(f, "sensor sample stale"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
