//! Safety checker.
//!
//! Runs **every cycle after command synthesis and before transmission**.
//! It re-evaluates every check against the current sensor readings and a
//! little retained history (debounce timers, the implausibility latch) and
//! accumulates two bitmasks:
//!
//! - `faults`: any set bit blocks torque.  [`SafetyChecker::all_safe`] is
//!   exactly `faults == 0`.
//! - `warnings`: observable conditions that never block torque by
//!   themselves.
//!
//! ## Fault lifecycle
//!
//! 1. Init failures latch permanently; nothing clears them.
//! 2. Calibration and out-of-range faults follow the readings, but only
//!    after the condition has held (or been absent) for a full debounce
//!    window, so one good sample never clears a fault.
//! 3. Accelerator desync is a warning immediately and a fault once it
//!    outlasts its window.
//! 4. Accel/brake implausibility latches until accelerator travel has
//!    stayed below the exit threshold for its clear window, whatever the
//!    brake does.
//!
//! [`SafetyChecker::gate_torque`] is the only gate between the candidate
//! torque and the command frame.

pub mod condition;

use log::{error, info, warn};

use crate::bms::BmsReadings;
use crate::config::SafetyConfig;
use crate::error::{SafetyFault, SafetyWarning, SensorError};
use crate::mcm::MotorController;
use crate::sensors::{BrakePressureSensor, Sensor, TorqueEncoder, VcuSensors};
use condition::DebouncedCondition;

/// Safety checker.
#[derive(Debug, Clone)]
pub struct SafetyChecker {
    /// Latched fault bitmask ([`SafetyFault`]).
    faults: u32,
    /// Warning bitmask ([`SafetyWarning`]).
    warnings: u32,

    out_of_range_tolerance: f32,
    tps_desync_tolerance: f32,
    implausibility_tps_enter: f32,
    implausibility_tps_exit: f32,
    implausibility_bps_threshold: f32,
    lv_battery_low_mv: f32,
    pack_temp_max_c: f32,
    power_ceiling_w: f32,
    power_fault_ratio: f32,

    tps0_range: DebouncedCondition,
    tps1_range: DebouncedCondition,
    bps_range: DebouncedCondition,
    tps_desync: DebouncedCondition,
    implausible: DebouncedCondition,

    torque_max: i16,
    /// Drive torque cap from the last power-draw check.
    power_torque_limit: i16,
}

impl SafetyChecker {
    pub fn new(config: &SafetyConfig, torque_max_dnm: i16) -> Self {
        Self {
            faults: 0,
            warnings: 0,
            out_of_range_tolerance: config.out_of_range_tolerance,
            tps_desync_tolerance: config.tps_desync_tolerance,
            implausibility_tps_enter: config.implausibility_tps_enter,
            implausibility_tps_exit: config.implausibility_tps_exit,
            implausibility_bps_threshold: config.implausibility_bps_threshold,
            lv_battery_low_mv: config.lv_battery_low_mv,
            pack_temp_max_c: config.pack_temp_max_c,
            power_ceiling_w: config.power_ceiling_w,
            power_fault_ratio: config.power_fault_ratio,
            tps0_range: DebouncedCondition::symmetric(config.out_of_range_debounce_us),
            tps1_range: DebouncedCondition::symmetric(config.out_of_range_debounce_us),
            bps_range: DebouncedCondition::symmetric(config.out_of_range_debounce_us),
            tps_desync: DebouncedCondition::symmetric(config.tps_desync_debounce_us),
            implausible: DebouncedCondition::new(0, config.implausibility_clear_us),
            torque_max: torque_max_dnm,
            power_torque_limit: torque_max_dnm,
        }
    }

    /// Re-evaluate every sensor check for this cycle.
    pub fn update(
        &mut self,
        tps: &TorqueEncoder,
        bps: &BrakePressureSensor,
        hvil_term_sense: &Sensor,
        lv_battery: &Sensor,
        now_us: u64,
    ) {
        // ── Init errors (permanent) ───────────────────────────────
        if !tps.tps0.init_errors().is_empty() || !tps.tps1.init_errors().is_empty() {
            self.latch_fault(SafetyFault::TpsInitFailed);
        }
        if !bps.bps0.init_errors().is_empty() {
            self.latch_fault(SafetyFault::BpsInitFailed);
        }
        if !hvil_term_sense.init_errors().is_empty() || !lv_battery.init_errors().is_empty() {
            self.latch_fault(SafetyFault::SwitchInitFailed);
        }

        // ── Calibration ───────────────────────────────────────────
        self.eval_fault(
            SafetyFault::TpsNotCalibrated,
            !tps.tps0.is_calibrated() || !tps.tps1.is_calibrated(),
        );
        self.eval_fault(SafetyFault::BpsNotCalibrated, !bps.bps0.is_calibrated());

        // ── Out of range (open / short) ───────────────────────────
        let tol = self.out_of_range_tolerance;
        let raw = out_of_range(&tps.tps0, tol);
        let tps0_bad = self.tps0_range.update(raw, now_us);
        self.eval_fault(SafetyFault::Tps0OutOfRange, tps0_bad);

        let raw = out_of_range(&tps.tps1, tol);
        let tps1_bad = self.tps1_range.update(raw, now_us);
        self.eval_fault(SafetyFault::Tps1OutOfRange, tps1_bad);

        let raw = out_of_range(&bps.bps0, tol);
        let bps_bad = self.bps_range.update(raw, now_us);
        self.eval_fault(SafetyFault::BpsOutOfRange, bps_bad);

        // ── Redundant accelerator desync ──────────────────────────
        let disagree = tps
            .percents()
            .is_some_and(|(p0, p1)| (p0 - p1).abs() > self.tps_desync_tolerance);
        self.eval_warning(SafetyWarning::TpsOutOfSync, disagree);
        let desynced = self.tps_desync.update(disagree, now_us);
        self.eval_fault(SafetyFault::TpsOutOfSync, desynced);

        // ── Accelerator / brake implausibility ────────────────────
        let travel = tps.travel_percent();
        let raw = if self.implausible.is_active() {
            travel >= self.implausibility_tps_exit
        } else {
            travel >= self.implausibility_tps_enter
                && bps.percent() >= self.implausibility_bps_threshold
        };
        let implausible = self.implausible.update(raw, now_us);
        self.eval_fault(SafetyFault::TpsBpsImplausible, implausible);

        // ── Observability only ────────────────────────────────────
        self.eval_warning(SafetyWarning::HvilTerminationLost, !hvil_term_sense.is_high());
        self.eval_warning(
            SafetyWarning::LvBatteryLow,
            lv_battery.is_fresh() && lv_battery.raw_value() < self.lv_battery_low_mv,
        );
        self.eval_warning(
            SafetyWarning::SensorStale,
            !tps.is_fresh() || !bps.bps0.is_fresh(),
        );
    }

    /// Latch init failures recorded anywhere in the hub, including inputs
    /// [`update`](Self::update) is not handed.
    pub fn check_init_errors(&mut self, sensors: &VcuSensors) {
        if !sensors.tps.tps0.init_errors().is_empty() || !sensors.tps.tps1.init_errors().is_empty()
        {
            self.latch_fault(SafetyFault::TpsInitFailed);
        }
        if !sensors.bps.bps0.init_errors().is_empty() {
            self.latch_fault(SafetyFault::BpsInitFailed);
        }
        if sensors.switches().iter().any(|s| !s.init_errors().is_empty()) {
            self.latch_fault(SafetyFault::SwitchInitFailed);
        }
        if sensors.wss.has_init_errors()
            || sensors.wps.has_init_errors()
            || !sensors.sas.init_errors().is_empty()
        {
            self.latch_fault(SafetyFault::ChassisInitFailed);
        }
    }

    /// Pack over-temperature fault.  Without a valid BMS summary the last
    /// verdict stands.
    pub fn check_battery_pack_temp(&mut self, bms: &BmsReadings) {
        if !bms.valid {
            return;
        }
        self.eval_fault(
            SafetyFault::PackOverTemperature,
            bms.pack_temp_max_c > self.pack_temp_max_c,
        );
    }

    /// Check DC power draw against the ceiling and return the drive torque
    /// limit (dNm) for this cycle.
    ///
    /// The larger of the inverter's bus power and the pack power is used.
    /// Above the ceiling the limit scales down with the excess and a
    /// warning is raised; above `ceiling * fault_ratio` it is a fault.
    pub fn check_power_draw(&mut self, bms: &BmsReadings, mcm: &MotorController) -> i16 {
        let power = (mcm.power_w() as f32).max(bms.power_w().unwrap_or(0.0));
        let ceiling = self.power_ceiling_w;

        self.eval_warning(SafetyWarning::PowerDrawHigh, power > ceiling);
        self.eval_fault(
            SafetyFault::PowerDrawExceeded,
            power > ceiling * self.power_fault_ratio,
        );

        self.power_torque_limit = if power > ceiling {
            (f32::from(self.torque_max) * ceiling / power).round() as i16
        } else {
            self.torque_max
        };
        self.power_torque_limit
    }

    /// The torque allowed for `candidate` this cycle.  Zero while any fault
    /// is latched or HV is absent; otherwise drive torque is capped by the
    /// power limit.  Regen passes through.
    pub fn gate_torque(&self, candidate: i16, hv_present: bool) -> i16 {
        if !self.all_safe() || !hv_present {
            0
        } else {
            candidate.min(self.power_torque_limit)
        }
    }

    /// Apply [`gate_torque`](Self::gate_torque) to the torque already
    /// stored in `mcm`.
    pub fn reduce_torque(&self, mcm: &mut MotorController, hv_present: bool) {
        mcm.set_torque(self.gate_torque(mcm.torque_command(), hv_present));
    }

    /// True when no fault is latched.  Warnings never count.
    pub fn all_safe(&self) -> bool {
        self.faults == 0
    }

    pub fn faults(&self) -> u32 {
        self.faults
    }

    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    pub fn has_warning(&self, warning: SafetyWarning) -> bool {
        self.warnings & warning.mask() != 0
    }

    pub fn power_torque_limit(&self) -> i16 {
        self.power_torque_limit
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }

    /// Set a fault bit that nothing clears.
    fn latch_fault(&mut self, fault: SafetyFault) {
        if self.faults & fault.mask() == 0 {
            error!("SAFETY FAULT LATCHED: {fault}");
        }
        self.faults |= fault.mask();
    }

    fn eval_warning(&mut self, warning: SafetyWarning, condition: bool) {
        if condition {
            if self.warnings & warning.mask() == 0 {
                warn!("safety warning: {warning}");
            }
            self.warnings |= warning.mask();
        } else {
            self.warnings &= !warning.mask();
        }
    }
}

/// Unclamped percent outside `[-tol, 1 + tol]`, or a non-finite sample.
/// Uncalibrated sensors are reported by the calibration check instead.
fn out_of_range(sensor: &Sensor, tol: f32) -> bool {
    match sensor.percent(false) {
        Ok(p) => p < -tol || p > 1.0 + tol,
        Err(SensorError::NonFinite) => true,
        Err(SensorError::ZeroSpan) => false,
    }
}
