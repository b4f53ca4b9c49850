//! Chassis inputs: wheel speed and wheel position at each corner.
//!
//! None of these feed the torque command.  They share the pedal mapping
//! so traction and logging layers see the same normalised 0..1 values.

use super::Sensor;
use crate::config::SensorCalibration;
use crate::error::ConfigError;

/// One sensor per wheel.
#[derive(Debug, Clone, Default)]
pub struct Corners {
    pub fl: Sensor,
    pub fr: Sensor,
    pub rl: Sensor,
    pub rr: Sensor,
}

impl Corners {
    /// All four corners share one calibration.
    pub fn with_calibration(cal: SensorCalibration) -> Result<Self, ConfigError> {
        Ok(Self {
            fl: Sensor::with_calibration(cal)?,
            fr: Sensor::with_calibration(cal)?,
            rl: Sensor::with_calibration(cal)?,
            rr: Sensor::with_calibration(cal)?,
        })
    }

    /// Front-left, front-right, rear-left, rear-right.
    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        [&self.fl, &self.fr, &self.rl, &self.rr].into_iter()
    }

    /// Clamped fraction per corner, same order as [`iter`](Self::iter).
    /// Unusable readings count as zero.
    pub fn normalized(&self) -> [f32; 4] {
        [&self.fl, &self.fr, &self.rl, &self.rr].map(|s| s.percent(true).unwrap_or(0.0))
    }

    pub fn has_init_errors(&self) -> bool {
        self.iter().any(|s| !s.init_errors().is_empty())
    }
}
