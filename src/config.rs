//! System configuration parameters
//!
//! All calibration bounds and tunables for the VCU core.  Values are
//! supplied at construction; this crate never reads or writes storage
//! itself, it only decodes a blob handed to it.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Calibrated bounds for one analog input.  `spec_min` maps to 0 %,
/// `spec_max` to 100 %; an inverted sensor simply has `spec_min > spec_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorCalibration {
    pub spec_min: f32,
    pub spec_max: f32,
}

impl SensorCalibration {
    pub const fn new(spec_min: f32, spec_max: f32) -> Self {
        Self { spec_min, spec_max }
    }

    /// True if the span is usable for the percent mapping.
    pub fn has_span(&self) -> bool {
        self.spec_max - self.spec_min != 0.0
    }
}

/// Sensor calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    pub tps0: SensorCalibration,
    /// Second accelerator sensor, wired inverted relative to TPS0.
    pub tps1: SensorCalibration,
    pub bps0: SensorCalibration,
    /// Wheel speed pulse frequency (Hz), shared by all four corners.
    pub wss: SensorCalibration,
    /// Wheel position (shock pot) output (mV), shared by all four corners.
    pub wps: SensorCalibration,
    /// Steering angle sensor output (mV), full left to full right.
    pub sas: SensorCalibration,
}

/// Inverter / torque parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorConfig {
    /// First message id of the inverter's broadcast block.
    pub can_base_id: u16,
    /// Maximum drive torque in deci-Newton-meters (100 = 10.0 Nm).
    pub torque_max_dnm: i16,
    /// Maximum regen as a fraction of `torque_max_dnm` (0.0 - 1.0).
    pub regen_fraction: f32,
    /// Regen applied at zero pedal, as a fraction of maximum regen.
    pub zero_pedal_regen_fraction: f32,
    /// Brake pressure percent at which maximum regen is reached.
    pub bps_percent_for_max_regen: f32,
}

/// Safety checker thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Allowed excursion beyond 0 % / 100 % before a sensor is out of range.
    pub out_of_range_tolerance: f32,
    /// Time a sensor must stay out of range before the fault sets, and in
    /// range before it clears (µs).
    pub out_of_range_debounce_us: u64,
    /// Maximum allowed difference between TPS0 and TPS1 percents.
    pub tps_desync_tolerance: f32,
    /// Disagreement longer than this is a fault (µs).
    pub tps_desync_debounce_us: u64,
    /// Accelerator travel above which braking is implausible.
    pub implausibility_tps_enter: f32,
    /// Accelerator travel below which the implausibility latch releases.
    pub implausibility_tps_exit: f32,
    /// Travel must stay below the exit threshold this long to clear (µs).
    pub implausibility_clear_us: u64,
    /// Brake pressure percent that counts as "brake applied".
    pub implausibility_bps_threshold: f32,
    /// LV battery warning threshold (mV).
    pub lv_battery_low_mv: f32,
    /// Maximum battery pack temperature (Celsius).
    pub pack_temp_max_c: f32,
    /// Power ceiling; above it torque is limited and a warning raised (W).
    pub power_ceiling_w: f32,
    /// Multiple of the ceiling at which the power draw becomes a fault.
    pub power_fault_ratio: f32,
}

/// Timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Control loop period (µs).
    pub control_loop_interval_us: u64,
    /// Resend the command frame at least this often even if unchanged (µs).
    pub command_heartbeat_us: u64,
    /// Time after HV loss after which the relay opens regardless of torque (µs).
    pub hvil_relay_timeout_us: u64,
    /// Period of the telemetry snapshot event (µs).
    pub telemetry_interval_us: u64,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcuConfig {
    pub sensors: SensorsConfig,
    pub motor: MotorConfig,
    pub safety: SafetyConfig,
    pub timing: TimingConfig,
}

impl Default for VcuConfig {
    fn default() -> Self {
        Self {
            sensors: SensorsConfig {
                // Pulse-width pedal sensors: 5 % .. 95 % of a 1 ms period.
                tps0: SensorCalibration::new(0.001 * 0.05, 0.001 * 0.95),
                tps1: SensorCalibration::new(0.001 * 0.95, 0.001 * 0.05),
                bps0: SensorCalibration::new(1.0, 10_000.0),
                wss: SensorCalibration::new(0.0, 1_000.0),
                wps: SensorCalibration::new(500.0, 4_500.0),
                sas: SensorCalibration::new(500.0, 4_500.0),
            },
            motor: MotorConfig {
                can_base_id: 0xA0,
                torque_max_dnm: 1000, // 100 Nm
                regen_fraction: 0.2,
                zero_pedal_regen_fraction: 0.1,
                bps_percent_for_max_regen: 0.5,
            },
            safety: SafetyConfig {
                out_of_range_tolerance: 0.05,
                out_of_range_debounce_us: 100_000,
                tps_desync_tolerance: 0.10,
                tps_desync_debounce_us: 100_000,
                implausibility_tps_enter: 0.25,
                implausibility_tps_exit: 0.05,
                implausibility_clear_us: 100_000,
                implausibility_bps_threshold: 0.05,
                lv_battery_low_mv: 11_500.0,
                pack_temp_max_c: 60.0,
                power_ceiling_w: 80_000.0,
                power_fault_ratio: 1.1,
            },
            timing: TimingConfig {
                control_loop_interval_us: 125_000, // 8 Hz
                command_heartbeat_us: 250_000,
                hvil_relay_timeout_us: 2_000_000,
                telemetry_interval_us: 1_000_000,
            },
        }
    }
}

impl VcuConfig {
    /// Reject configurations that would make the core unsafe or undefined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sensors;
        let cals = [
            ("tps0", s.tps0),
            ("tps1", s.tps1),
            ("bps0", s.bps0),
            ("wss", s.wss),
            ("wps", s.wps),
            ("sas", s.sas),
        ];
        for (name, cal) in cals {
            if !cal.has_span() {
                return Err(ConfigError::ZeroSpan(name));
            }
        }

        let m = &self.motor;
        if m.torque_max_dnm <= 0 {
            return Err(ConfigError::ValidationFailed("torque_max_dnm must be positive"));
        }
        if !(0.0..=1.0).contains(&m.regen_fraction) {
            return Err(ConfigError::ValidationFailed("regen_fraction outside 0..1"));
        }
        if !(0.0..=1.0).contains(&m.zero_pedal_regen_fraction) {
            return Err(ConfigError::ValidationFailed(
                "zero_pedal_regen_fraction outside 0..1",
            ));
        }
        if m.bps_percent_for_max_regen <= 0.0 || m.bps_percent_for_max_regen > 1.0 {
            return Err(ConfigError::ValidationFailed(
                "bps_percent_for_max_regen outside (0, 1]",
            ));
        }

        let sf = &self.safety;
        if sf.implausibility_tps_exit >= sf.implausibility_tps_enter {
            return Err(ConfigError::ValidationFailed(
                "implausibility exit threshold must be below enter threshold",
            ));
        }
        if sf.out_of_range_tolerance < 0.0 || sf.tps_desync_tolerance <= 0.0 {
            return Err(ConfigError::ValidationFailed("negative sensor tolerance"));
        }
        if sf.power_ceiling_w <= 0.0 || sf.power_fault_ratio < 1.0 {
            return Err(ConfigError::ValidationFailed("invalid power ceiling"));
        }

        if self.timing.control_loop_interval_us == 0 {
            return Err(ConfigError::ValidationFailed("control loop interval is zero"));
        }
        Ok(())
    }

    /// Decode a postcard blob handed over by the storage layer.
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)?;
        config.validated()
    }

    /// Decode a JSON document (bench tooling / provisioning).
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|_| ConfigError::Decode)?;
        config.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if let Err(e) = self.validate() {
            warn!("Rejected configuration: {e}");
            return Err(e);
        }
        Ok(self)
    }
}
