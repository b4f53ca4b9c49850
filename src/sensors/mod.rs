//! Sensor subsystem: the uniform [`Sensor`] container and the
//! aggregating [`VcuSensors`] hub.
//!
//! Every physical input (pedal travel, brake pressure, wheel speed and
//! position, steering angle, digital switches, the LV supply) is a
//! `Sensor`.  The acquisition step outside this crate
//! writes `(raw_value, fresh)` into each one per cycle; everything else
//! only reads them.

pub mod chassis;
pub mod pedals;

use log::{error, warn};

use crate::config::{SensorCalibration, SensorsConfig};
use crate::error::{ConfigError, SensorError};
pub use chassis::Corners;
pub use pedals::{BrakePressureSensor, TorqueEncoder};

/// Map `value` onto the `[min, max]` span as a fraction.
///
/// An inverted span (`min > max`) still yields 0 at `min` and 1 at `max`
/// because the sign of the denominator flips with it.  With `clamp` the
/// result is limited to `[0, 1]`; without it, excursions are returned as
/// is so callers can detect open/short conditions.  A NaN or infinite
/// `value` is rejected rather than clamped into range.
pub fn get_percent(value: f32, min: f32, max: f32, clamp: bool) -> Result<f32, SensorError> {
    let span = max - min;
    if span == 0.0 {
        return Err(SensorError::ZeroSpan);
    }
    if !value.is_finite() {
        return Err(SensorError::NonFinite);
    }
    let percent = (value - min) / span;
    Ok(if clamp { percent.clamp(0.0, 1.0) } else { percent })
}

// ---------------------------------------------------------------------------
// Init error flags
// ---------------------------------------------------------------------------

/// Startup init failures recorded for a sensor.  Latched forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitErrors(u8);

impl InitErrors {
    pub const NONE: Self = Self(0);
    pub const POWER_INIT_FAILED: Self = Self(0b01);
    pub const SIGNAL_INIT_FAILED: Self = Self(0b10);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

// ---------------------------------------------------------------------------
// Sensor
// ---------------------------------------------------------------------------

/// One physical input (analog, frequency, or digital).
#[derive(Debug, Clone, Default)]
pub struct Sensor {
    raw_value: f32,
    spec_min: f32,
    spec_max: f32,
    fresh: bool,
    init_errors: InitErrors,
}

impl Sensor {
    /// An uncalibrated sensor: both bounds zero, so `percent` fails until
    /// [`calibrate`](Self::calibrate) is called.
    pub const fn new() -> Self {
        Self {
            raw_value: 0.0,
            spec_min: 0.0,
            spec_max: 0.0,
            fresh: false,
            init_errors: InitErrors::NONE,
        }
    }

    /// Fix the calibration bounds.  A zero span is rejected here so the
    /// runtime never has to divide by it.
    pub fn calibrate(&mut self, spec_min: f32, spec_max: f32) -> Result<(), ConfigError> {
        if spec_max - spec_min == 0.0 {
            error!("Sensor calibration rejected: zero span at {spec_min}");
            return Err(ConfigError::ZeroSpan("sensor"));
        }
        self.spec_min = spec_min;
        self.spec_max = spec_max;
        Ok(())
    }

    /// Apply a calibration from configuration.
    pub fn with_calibration(cal: SensorCalibration) -> Result<Self, ConfigError> {
        let mut sensor = Self::new();
        sensor.calibrate(cal.spec_min, cal.spec_max)?;
        Ok(sensor)
    }

    /// Record an init failure.  Called once at startup by the peripheral layer.
    pub fn record_init_error(&mut self, err: InitErrors) {
        if !err.is_empty() {
            warn!("Sensor init error recorded: {:#04b}", err.0);
        }
        self.init_errors.insert(err);
    }

    /// Acquisition step for analog and frequency inputs.
    pub fn update(&mut self, raw_value: f32, fresh: bool) {
        self.raw_value = raw_value;
        self.fresh = fresh;
    }

    /// Acquisition step for digital inputs.
    pub fn update_digital(&mut self, high: bool) {
        self.raw_value = if high { 1.0 } else { 0.0 };
        self.fresh = true;
    }

    /// Fraction of calibrated travel.  See [`get_percent`].
    pub fn percent(&self, clamp: bool) -> Result<f32, SensorError> {
        get_percent(self.raw_value, self.spec_min, self.spec_max, clamp)
    }

    pub fn raw_value(&self) -> f32 {
        self.raw_value
    }

    /// Digital reading: true if the input is high.
    pub fn is_high(&self) -> bool {
        self.raw_value != 0.0
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn is_calibrated(&self) -> bool {
        self.spec_max - self.spec_min != 0.0
    }

    pub fn init_errors(&self) -> InitErrors {
        self.init_errors
    }

    pub fn spec_min(&self) -> f32 {
        self.spec_min
    }

    pub fn spec_max(&self) -> f32 {
        self.spec_max
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Owns every input the control loop needs.  Constructed once; the
/// acquisition port refreshes it every cycle.
#[derive(Debug, Clone)]
pub struct VcuSensors {
    pub tps: TorqueEncoder,
    pub bps: BrakePressureSensor,
    /// Ready-to-drive button.  Wired to ground with a pull-up, so
    /// pressed reads low.
    pub rtd_button: Sensor,
    /// HV interlock termination sense: high = HV present.
    pub hvil_term_sense: Sensor,
    /// LV supply voltage in millivolts.
    pub lv_battery: Sensor,
    /// Wheel speed sensors (pulse frequency, Hz).
    pub wss: Corners,
    /// Wheel position sensors (shock pots, mV).
    pub wps: Corners,
    /// Steering angle sensor (mV); 50 % is straight ahead.
    pub sas: Sensor,
}

impl VcuSensors {
    pub fn new(config: &SensorsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            tps: TorqueEncoder::new(
                Sensor::with_calibration(config.tps0)?,
                Sensor::with_calibration(config.tps1)?,
            ),
            bps: BrakePressureSensor::new(Sensor::with_calibration(config.bps0)?),
            rtd_button: Sensor::new(),
            hvil_term_sense: Sensor::new(),
            lv_battery: Sensor::new(),
            wss: Corners::with_calibration(config.wss)?,
            wps: Corners::with_calibration(config.wps)?,
            sas: Sensor::with_calibration(config.sas)?,
        })
    }

    /// Inputs outside the pedals whose init failures block torque.
    pub fn switches(&self) -> [&Sensor; 3] {
        [&self.rtd_button, &self.hvil_term_sense, &self.lv_battery]
    }

    /// Mean normalised wheel speed across all four corners.
    pub fn wheel_speed(&self) -> f32 {
        self.wss.normalized().iter().sum::<f32>() / 4.0
    }

    /// True while the driver holds the ready-to-drive button.
    pub fn rtd_requested(&self) -> bool {
        self.rtd_button.is_fresh() && !self.rtd_button.is_high()
    }

    pub fn hv_present(&self) -> bool {
        self.hvil_term_sense.is_high()
    }
}
