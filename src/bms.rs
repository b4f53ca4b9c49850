//! Battery-pack readings consumed by the battery safety checks.
//!
//! The BMS link itself lives outside this crate; the control loop copies the
//! latest pack summary in here once per cycle.

/// Latest pack summary reported by the battery management system.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BmsReadings {
    /// Hottest cell temperature (°C).
    pub pack_temp_max_c: f32,
    /// Pack voltage (V).
    pub pack_voltage_v: f32,
    /// Pack current (A), positive while discharging.
    pub pack_current_a: f32,
    /// False until the first summary arrives, and after it goes stale.
    pub valid: bool,
}

impl BmsReadings {
    pub fn new(pack_temp_max_c: f32, pack_voltage_v: f32, pack_current_a: f32) -> Self {
        Self {
            pack_temp_max_c,
            pack_voltage_v,
            pack_current_a,
            valid: true,
        }
    }

    /// Discharge power (W); `None` without a valid summary.
    pub fn power_w(&self) -> Option<f32> {
        self.valid.then(|| self.pack_voltage_v * self.pack_current_a)
    }
}
