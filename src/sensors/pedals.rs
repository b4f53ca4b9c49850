//! Pedal inputs built on top of [`Sensor`].
//!
//! The accelerator uses two redundant travel sensors wired in opposite
//! directions; the brake uses a single pressure transducer.

use super::Sensor;

/// Dual accelerator travel sensor.
#[derive(Debug, Clone)]
pub struct TorqueEncoder {
    pub tps0: Sensor,
    pub tps1: Sensor,
}

impl TorqueEncoder {
    pub fn new(tps0: Sensor, tps1: Sensor) -> Self {
        Self { tps0, tps1 }
    }

    /// Clamped travel of each sensor, or `None` if either is uncalibrated.
    pub fn percents(&self) -> Option<(f32, f32)> {
        let p0 = self.tps0.percent(true).ok()?;
        let p1 = self.tps1.percent(true).ok()?;
        Some((p0, p1))
    }

    /// Pedal travel as the mean of both sensors.  An uncalibrated pair
    /// reads as released so it can never request drive torque.
    pub fn travel_percent(&self) -> f32 {
        self.percents().map_or(0.0, |(p0, p1)| (p0 + p1) / 2.0)
    }

    pub fn is_fresh(&self) -> bool {
        self.tps0.is_fresh() && self.tps1.is_fresh()
    }
}

/// Brake pressure sensor.
#[derive(Debug, Clone)]
pub struct BrakePressureSensor {
    pub bps0: Sensor,
}

impl BrakePressureSensor {
    pub fn new(bps0: Sensor) -> Self {
        Self { bps0 }
    }

    /// Clamped brake pressure fraction; 0.0 when uncalibrated.
    pub fn percent(&self) -> f32 {
        self.bps0.percent(true).unwrap_or(0.0)
    }

    /// A reading the torque synthesis may trust.
    pub fn is_valid(&self) -> bool {
        self.bps0.is_calibrated() && self.bps0.is_fresh() && self.bps0.init_errors().is_empty()
    }
}
