//! Outbound application events.
//!
//! The [`VcuService`](super::service::VcuService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.

use crate::can::codec::InverterStatus;
use crate::error::CanError;
use crate::mcm::StartupStage;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started.
    Started,

    /// The inverter startup handshake moved.
    StageChanged { from: StartupStage, to: StartupStage },

    /// Inverter confirmed enable; the alert was sounded.
    ReadyToDrive,

    /// The HV relay changed state (true = closed).
    RelayChanged(bool),

    /// New safety faults were raised (carries the full fault mask).
    FaultDetected(u32),

    /// All safety faults have been cleared.
    FaultCleared,

    /// The transport refused the command frame.
    TransmitFailed(CanError),

    /// Telemetry snapshot, published every `telemetry_interval_us`.
    Telemetry(TelemetryData),
}

/// A point-in-time snapshot for the dashboard or data logger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryData {
    pub stage: StartupStage,
    pub inverter_status: InverterStatus,
    pub relay_closed: bool,
    pub pedal_travel: f32,
    pub brake_percent: f32,
    /// Torque in the last command (dNm).
    pub torque_command: i16,
    pub motor_rpm: i16,
    pub motor_temp_c: i16,
    pub dc_voltage: i32,
    pub dc_current: i32,
    pub faults: u32,
    pub warnings: u32,
    /// Mean normalised wheel speed, 0.0 - 1.0.
    pub wheel_speed: f32,
}
