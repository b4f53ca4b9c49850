//! Port traits: the boundary between the control core and the vehicle.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ VcuService (domain)
//! ```
//!
//! Driven adapters (ADC/GPIO acquisition, relay output, CAN controller,
//! clock, event sinks) implement these traits.  The
//! [`VcuService`](super::service::VcuService) consumes them via generics,
//! so the core never touches hardware directly.

use crate::bms::BmsReadings;
use crate::can::CanFrame;
use crate::error::CanError;
use crate::sensors::VcuSensors;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port, called once at the start of every cycle.
pub trait SensorPort {
    /// Refresh every input with this cycle's `(raw, fresh)` sample, or the
    /// level for digital inputs.  Init failures are recorded on the
    /// sensors once at startup, not here.
    fn acquire(&mut self, sensors: &mut VcuSensors);

    /// Latest pack summary.  Adapters without a BMS link keep the default,
    /// which the battery checks treat as "no data".
    fn bms(&mut self) -> BmsReadings {
        BmsReadings::default()
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the outputs the control loop owns.
pub trait ActuatorPort {
    /// Drive the inverter HV relay (true = closed).
    fn set_relay(&mut self, closed: bool);

    /// Sound the ready-to-drive alert.  Called once per handshake.
    fn sound_rtd_alert(&mut self);
}

// ───────────────────────────────────────────────────────────────
// CAN port (driven adapter: domain ↔ bus)
// ───────────────────────────────────────────────────────────────

/// Frame transport.  Queueing, priorities and retries belong to the
/// adapter.
pub trait CanPort {
    fn transmit(&mut self, frame: &CanFrame) -> Result<(), CanError>;

    /// Next received frame, `None` once the receive queue is empty.
    fn receive(&mut self) -> Option<CanFrame>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source for every duration-based check.
pub trait Clock {
    /// Microseconds since an arbitrary fixed origin.  Never decreases.
    fn now_us(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (dashboard, logger,
/// telemetry radio).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
