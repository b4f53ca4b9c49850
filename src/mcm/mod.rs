//! Motor controller model: one instance per inverter.
//!
//! Owns the command state sent to the inverter, the telemetry decoded from
//! it, the startup handshake ([`StartupStage`]) and the HV relay.  Each
//! control cycle the loop calls, in order:
//!
//! 1. [`MotorController::relay_control`] with the HV interlock sense,
//! 2. [`MotorController::power_management`] to advance the handshake,
//! 3. [`MotorController::plan_commands`] for the candidate torque.
//!
//! The torque produced here is only a candidate: the control loop passes
//! it through the safety checker and stores the result with
//! [`MotorController::set_torque`] once per cycle.
//!
//! All torque values are deci-Newton-meters (100 = 10.0 Nm).  Positive is
//! drive, negative is regen.

pub mod startup;

use log::{debug, info, warn};

use crate::can::CanFrame;
use crate::can::codec::{self, InverterCommand, Telemetry};
pub use crate::can::codec::{Direction, InverterStatus, LockoutStatus, Status};
use crate::config::{MotorConfig, TimingConfig};
use crate::sensors::{BrakePressureSensor, TorqueEncoder, get_percent};
pub use startup::{StartupEvent, StartupStage};

/// Pedal travel below which the inverter may be enabled.
pub const RTD_MAX_PEDAL_TRAVEL: f32 = 0.05;

const DEFAULT_REGEN_FRACTION: f32 = 0.2;
const DEFAULT_ZERO_PEDAL_REGEN_FRACTION: f32 = 0.1;
const DEFAULT_BPS_PERCENT_FOR_MAX_REGEN: f32 = 0.5;
const DEFAULT_HVIL_RELAY_TIMEOUT_US: u64 = 2_000_000;

// ---------------------------------------------------------------------------
// Command policy
// ---------------------------------------------------------------------------

/// Supplies the direction and discharge commands each cycle.
pub trait CommandPolicy {
    fn direction(&self) -> Direction;
    fn discharge(&self) -> Status;
}

/// Forward only, discharge off.  Reverse is not supported by the vehicle.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPolicy;

impl CommandPolicy for FixedPolicy {
    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn discharge(&self) -> Status {
        Status::Disabled
    }
}

// ---------------------------------------------------------------------------
// MotorController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MotorController {
    can_base_id: u16,

    // -- Commands --
    torque_command: i16,
    torque_limit: i16,
    direction: Direction,
    discharge_command: Status,
    inverter_command: Status,
    /// Command changes since the last transmitted frame.
    update_count: u16,
    last_sent_us: u64,

    // -- Telemetry (written only by `apply_telemetry`) --
    motor_temp: i16,
    dc_voltage: i32,
    dc_current: i32,
    motor_rpm: i16,
    commanded_torque_feedback: i16,
    lockout_status: LockoutStatus,
    inverter_status: InverterStatus,
    fault_history: [u8; 8],

    // -- Startup / relay --
    startup_stage: StartupStage,
    relay_state: bool,
    previous_hvil_state: bool,
    hvil_lost_at_us: Option<u64>,
    hvil_relay_timeout_us: u64,

    // -- Configuration --
    torque_max: i16,
    torque_max_regen: i16,
    regen_at_zero_pedal: i16,
    bps_percent_for_max_regen: f32,
}

impl MotorController {
    /// New controller with the default regen fractions and relay timeout.
    pub fn new(can_base_id: u16, initial_direction: Direction, torque_max_dnm: i16) -> Self {
        Self::build(
            can_base_id,
            initial_direction,
            torque_max_dnm,
            DEFAULT_REGEN_FRACTION,
            DEFAULT_ZERO_PEDAL_REGEN_FRACTION,
            DEFAULT_BPS_PERCENT_FOR_MAX_REGEN,
            DEFAULT_HVIL_RELAY_TIMEOUT_US,
        )
    }

    pub fn from_config(motor: &MotorConfig, timing: &TimingConfig) -> Self {
        Self::build(
            motor.can_base_id,
            Direction::Forward,
            motor.torque_max_dnm,
            motor.regen_fraction,
            motor.zero_pedal_regen_fraction,
            motor.bps_percent_for_max_regen,
            timing.hvil_relay_timeout_us,
        )
    }

    fn build(
        can_base_id: u16,
        direction: Direction,
        torque_max: i16,
        regen_fraction: f32,
        zero_pedal_regen_fraction: f32,
        bps_percent_for_max_regen: f32,
        hvil_relay_timeout_us: u64,
    ) -> Self {
        let torque_max = torque_max.max(0);
        let torque_max_regen = (f32::from(torque_max) * -regen_fraction.abs()).round() as i16;
        let regen_at_zero_pedal =
            (f32::from(torque_max_regen) * zero_pedal_regen_fraction.abs()).round() as i16;

        Self {
            can_base_id,
            torque_command: 0,
            torque_limit: 0,
            direction,
            discharge_command: Status::Disabled,
            inverter_command: Status::Disabled,
            update_count: 0,
            last_sent_us: 0,
            motor_temp: 0,
            dc_voltage: 0,
            dc_current: 0,
            motor_rpm: 0,
            commanded_torque_feedback: 0,
            lockout_status: LockoutStatus::Unknown,
            inverter_status: InverterStatus::Unknown,
            fault_history: [0; 8],
            startup_stage: StartupStage::Idle,
            relay_state: false,
            previous_hvil_state: false,
            hvil_lost_at_us: None,
            hvil_relay_timeout_us,
            torque_max,
            torque_max_regen,
            regen_at_zero_pedal,
            bps_percent_for_max_regen,
        }
    }

    // ── Control cycle ─────────────────────────────────────────

    /// Candidate torque from pedal positions, using the fixed policy, stored
    /// as the torque command.
    pub fn calculate_commands(&mut self, tps: &TorqueEncoder, bps: &BrakePressureSensor) {
        self.calculate_commands_with(tps, bps, &FixedPolicy);
    }

    pub fn calculate_commands_with(
        &mut self,
        tps: &TorqueEncoder,
        bps: &BrakePressureSensor,
        policy: &impl CommandPolicy,
    ) {
        let torque = self.plan_commands_with(tps, bps, policy);
        self.set_torque(torque);
    }

    /// Apply the fixed policy and return the candidate torque without
    /// storing it.
    pub fn plan_commands(&mut self, tps: &TorqueEncoder, bps: &BrakePressureSensor) -> i16 {
        self.plan_commands_with(tps, bps, &FixedPolicy)
    }

    /// Apply `policy` for direction and discharge and return the candidate
    /// torque (dNm).  The torque command itself is left untouched.
    ///
    /// Braking takes priority: with any valid brake pressure the pedal is
    /// ignored and regen is commanded.
    pub fn plan_commands_with(
        &mut self,
        tps: &TorqueEncoder,
        bps: &BrakePressureSensor,
        policy: &impl CommandPolicy,
    ) -> i16 {
        self.set_discharge(policy.discharge());
        self.set_direction(policy.direction());

        let regen_at_zero = f32::from(self.regen_at_zero_pedal);
        let brake = bps.percent();
        let torque = if bps.is_valid() && brake > 0.0 {
            let regen_travel =
                get_percent(brake, 0.0, self.bps_percent_for_max_regen, true).unwrap_or(0.0);
            f32::from(self.torque_max_regen) * regen_travel + regen_at_zero
        } else {
            let travel = tps.travel_percent().clamp(0.0, 1.0);
            (f32::from(self.torque_max) - regen_at_zero) * travel + regen_at_zero
        };

        let limit = f32::from(self.torque_max);
        torque.round().clamp(-limit, limit) as i16
    }

    /// Drive the inverter relay from the HV interlock sense.
    ///
    /// With HV present the relay is closed every cycle.  When HV is lost
    /// the relay stays closed until the inverter reports zero torque or
    /// the loss has lasted longer than the relay timeout; the safety
    /// checker holds torque at zero meanwhile.
    ///
    /// Returns the relay state to apply to the output.
    pub fn relay_control(&mut self, hvil_present: bool, now_us: u64) -> bool {
        if hvil_present {
            if !self.relay_state {
                info!("MCM relay closed (HV present)");
            }
            self.relay_state = true;
            self.hvil_lost_at_us = None;
        } else {
            if self.previous_hvil_state || self.hvil_lost_at_us.is_none() {
                self.hvil_lost_at_us = Some(now_us);
            }

            if self.relay_state {
                let lost_for = now_us.saturating_sub(self.hvil_lost_at_us.unwrap_or(now_us));
                if self.commanded_torque_feedback == 0 || lost_for > self.hvil_relay_timeout_us {
                    info!(
                        "MCM relay opened after HV loss ({} us, feedback {} Nm)",
                        lost_for, self.commanded_torque_feedback
                    );
                    self.relay_state = false;
                }
            }
            self.set_startup_stage(StartupStage::Idle);
        }

        self.previous_hvil_state = hvil_present;
        self.relay_state
    }

    /// Advance the startup handshake.  Returns the ready-to-drive alert on
    /// the cycle the inverter first confirms enable.
    ///
    /// Without HV the handshake is held at `Idle` with the inverter
    /// disabled, whatever the inverter reports.
    pub fn power_management(
        &mut self,
        hv_present: bool,
        pedal_travel: f32,
        rtd_requested: bool,
    ) -> Option<StartupEvent> {
        if !hv_present {
            self.set_startup_stage(StartupStage::Idle);
            self.set_inverter(Status::Disabled);
            return None;
        }
        if self.startup_stage.forces_inverter_disabled() {
            self.set_inverter(Status::Disabled);
        }

        match self.inverter_status {
            InverterStatus::Disabled => {
                if self.startup_stage != StartupStage::EnableRequested {
                    self.set_startup_stage(StartupStage::LockoutCleared);
                }
                if self.startup_stage == StartupStage::LockoutCleared
                    && pedal_travel < RTD_MAX_PEDAL_TRAVEL
                    && rtd_requested
                {
                    self.set_inverter(Status::Enabled);
                    self.set_startup_stage(StartupStage::EnableRequested);
                }
                None
            }
            InverterStatus::Enabled => {
                if self.startup_stage == StartupStage::EnableRequested {
                    self.set_startup_stage(StartupStage::ReadyToDrive);
                    Some(StartupEvent::ReadyToDriveAlert)
                } else {
                    self.set_startup_stage(StartupStage::Driving);
                    None
                }
            }
            InverterStatus::Unknown => None,
        }
    }

    /// Apply a transition from the startup table.  Transitions not in the
    /// table are ignored and logged; returns whether the stage is `next`.
    pub fn set_startup_stage(&mut self, next: StartupStage) -> bool {
        if self.startup_stage == next {
            return true;
        }
        if !self.startup_stage.can_transition(next) {
            warn!(
                "MCM startup transition rejected: {} -> {}",
                self.startup_stage.number(),
                next.number()
            );
            return false;
        }
        info!(
            "MCM startup stage: {} -> {}",
            self.startup_stage.number(),
            next.number()
        );
        self.startup_stage = next;
        true
    }

    // ── Telemetry ─────────────────────────────────────────────

    /// Decode a received frame into telemetry.  Returns `false` for frames
    /// that carry nothing for this controller.
    pub fn parse_can_message(&mut self, frame: &CanFrame) -> bool {
        match codec::decode(self.can_base_id, frame) {
            Some(t) => {
                self.apply_telemetry(t);
                true
            }
            None => false,
        }
    }

    pub fn apply_telemetry(&mut self, telemetry: Telemetry) {
        match telemetry {
            Telemetry::MotorTemperature(c) => self.motor_temp = c,
            Telemetry::MotorSpeed(rpm) => self.motor_rpm = rpm,
            Telemetry::DcCurrent(a) => self.dc_current = a,
            Telemetry::DcVoltage(v) => self.dc_voltage = v,
            Telemetry::InternalStates { inverter, lockout } => {
                if inverter != self.inverter_status {
                    debug!("Inverter status {:?} -> {:?}", self.inverter_status, inverter);
                }
                self.inverter_status = inverter;
                self.lockout_status = lockout;
            }
            Telemetry::FaultCodes(codes) => {
                for (history, code) in self.fault_history.iter_mut().zip(codes) {
                    *history |= code;
                }
            }
            Telemetry::CommandedTorque(nm) => self.commanded_torque_feedback = nm,
        }
    }

    // ── Command setters (count only real changes) ─────────────

    pub fn set_torque(&mut self, torque_dnm: i16) {
        self.note_change(self.torque_command != torque_dnm);
        self.torque_command = torque_dnm;
    }

    pub fn set_torque_limit(&mut self, limit_dnm: i16) {
        self.note_change(self.torque_limit != limit_dnm);
        self.torque_limit = limit_dnm;
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.note_change(self.direction != direction);
        self.direction = direction;
    }

    pub fn set_discharge(&mut self, discharge: Status) {
        self.note_change(self.discharge_command != discharge);
        self.discharge_command = discharge;
    }

    pub fn set_inverter(&mut self, inverter: Status) {
        self.note_change(self.inverter_command != inverter);
        self.inverter_command = inverter;
    }

    fn note_change(&mut self, changed: bool) {
        if changed {
            self.update_count = self.update_count.saturating_add(1);
        }
    }

    // ── Transmission bookkeeping ──────────────────────────────

    /// Send when a command changed or the heartbeat period has elapsed.
    pub fn should_send(&self, now_us: u64, heartbeat_us: u64) -> bool {
        self.update_count > 0 || now_us.saturating_sub(self.last_sent_us) >= heartbeat_us
    }

    pub fn mark_sent(&mut self, now_us: u64) {
        self.update_count = 0;
        self.last_sent_us = now_us;
    }

    pub fn time_since_last_sent(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.last_sent_us)
    }

    pub fn command(&self) -> InverterCommand {
        InverterCommand {
            torque_dnm: self.torque_command,
            torque_limit_dnm: self.torque_limit,
            direction: self.direction,
            inverter: self.inverter_command,
            discharge: self.discharge_command,
        }
    }

    /// Outbound command frame, `None` if the base id leaves no room for it.
    pub fn command_frame(&self) -> Option<CanFrame> {
        codec::encode_command(self.can_base_id, &self.command())
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn can_base_id(&self) -> u16 {
        self.can_base_id
    }

    pub fn torque_command(&self) -> i16 {
        self.torque_command
    }

    pub fn torque_limit(&self) -> i16 {
        self.torque_limit
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn discharge_command(&self) -> Status {
        self.discharge_command
    }

    pub fn inverter_command(&self) -> Status {
        self.inverter_command
    }

    pub fn update_count(&self) -> u16 {
        self.update_count
    }

    pub fn torque_max(&self) -> i16 {
        self.torque_max
    }

    pub fn torque_max_regen(&self) -> i16 {
        self.torque_max_regen
    }

    pub fn regen_at_zero_pedal(&self) -> i16 {
        self.regen_at_zero_pedal
    }

    pub fn motor_temp(&self) -> i16 {
        self.motor_temp
    }

    pub fn dc_voltage(&self) -> i32 {
        self.dc_voltage
    }

    pub fn dc_current(&self) -> i32 {
        self.dc_current
    }

    pub fn motor_rpm(&self) -> i16 {
        self.motor_rpm
    }

    pub fn commanded_torque_feedback(&self) -> i16 {
        self.commanded_torque_feedback
    }

    pub fn inverter_status(&self) -> InverterStatus {
        self.inverter_status
    }

    pub fn lockout_status(&self) -> LockoutStatus {
        self.lockout_status
    }

    pub fn fault_history(&self) -> [u8; 8] {
        self.fault_history
    }

    pub fn startup_stage(&self) -> StartupStage {
        self.startup_stage
    }

    pub fn relay_state(&self) -> bool {
        self.relay_state
    }

    /// DC bus power (W).
    pub fn power_w(&self) -> i64 {
        i64::from(self.dc_voltage) * i64::from(self.dc_current)
    }
}
