//! Vehicle control service: the control loop.
//!
//! [`VcuService`] owns the sensors, the motor controller and the safety
//! checker.  All I/O flows through port traits injected at call sites,
//! making the whole loop testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │        VcuService        │
//! ActuatorPort ◀──│  MCM · Safety · Sensors  │◀──▶ CanPort
//!                 └──────────────────────────┘
//! ```

use log::{info, warn};

use crate::bms::BmsReadings;
use crate::config::{TimingConfig, VcuConfig};
use crate::error::ConfigError;
use crate::mcm::{MotorController, StartupEvent};
use crate::safety::SafetyChecker;
use crate::sensors::VcuSensors;

use super::events::{AppEvent, TelemetryData};
use super::ports::{ActuatorPort, CanPort, Clock, EventSink, SensorPort};

/// Upper bound on frames drained from the receive queue per cycle.
pub const MAX_RX_FRAMES_PER_TICK: usize = 32;

// ───────────────────────────────────────────────────────────────
// VcuService
// ───────────────────────────────────────────────────────────────

pub struct VcuService {
    sensors: VcuSensors,
    mcm: MotorController,
    safety: SafetyChecker,
    bms: BmsReadings,
    timing: TimingConfig,
    tick_count: u64,
    /// Fault mask at the end of the previous tick.
    last_faults: u32,
    last_telemetry_us: Option<u64>,
}

impl VcuService {
    /// Validate the configuration and build every owned component.
    pub fn new(config: VcuConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let sensors = VcuSensors::new(&config.sensors)?;
        let mcm = MotorController::from_config(&config.motor, &config.timing);
        let safety = SafetyChecker::new(&config.safety, config.motor.torque_max_dnm);

        Ok(Self {
            sensors,
            mcm,
            safety,
            bms: BmsReadings::default(),
            timing: config.timing,
            tick_count: 0,
            last_faults: 0,
            last_telemetry_us: None,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        info!(
            "VcuService started (inverter base {:#05x}, {} us cycle)",
            self.mcm.can_base_id(),
            self.timing.control_loop_interval_us
        );
        sink.emit(&AppEvent::Started);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle:
    /// sensors → CAN rx → relay → handshake → torque → safety → CAN tx.
    ///
    /// The torque command is written once per cycle, after the safety
    /// verdict, so an unchanged gated command never counts as an update.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], avoiding a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        can: &mut impl CanPort,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        let now = clock.now_us();
        let prev_stage = self.mcm.startup_stage();
        let prev_relay = self.mcm.relay_state();

        // 1. Acquire inputs
        hw.acquire(&mut self.sensors);
        self.bms = hw.bms();

        // 2. Drain inverter telemetry
        for _ in 0..MAX_RX_FRAMES_PER_TICK {
            let Some(frame) = can.receive() else { break };
            self.mcm.parse_can_message(&frame);
        }

        // 3. HV relay
        let hv_present = self.sensors.hv_present();
        let relay = self.mcm.relay_control(hv_present, now);
        hw.set_relay(relay);

        // 4. Startup handshake
        let alert = self.mcm.power_management(
            hv_present,
            self.sensors.tps.travel_percent(),
            self.sensors.rtd_requested(),
        );
        if let Some(StartupEvent::ReadyToDriveAlert) = alert {
            info!("Ready to drive");
            hw.sound_rtd_alert();
            sink.emit(&AppEvent::ReadyToDrive);
        }

        // 5. Candidate torque
        let candidate = self.mcm.plan_commands(&self.sensors.tps, &self.sensors.bps);

        // 6. Safety
        self.safety.check_init_errors(&self.sensors);
        self.safety.update(
            &self.sensors.tps,
            &self.sensors.bps,
            &self.sensors.hvil_term_sense,
            &self.sensors.lv_battery,
            now,
        );
        self.safety.check_battery_pack_temp(&self.bms);
        self.safety.check_power_draw(&self.bms, &self.mcm);
        let torque = self.safety.gate_torque(candidate, hv_present);
        self.mcm.set_torque(torque);

        // 7. Command frame
        if self.mcm.should_send(now, self.timing.command_heartbeat_us) {
            self.transmit_command(can, now, sink);
        }

        // 8. Report changes
        let stage = self.mcm.startup_stage();
        if stage != prev_stage {
            sink.emit(&AppEvent::StageChanged {
                from: prev_stage,
                to: stage,
            });
        }
        if relay != prev_relay {
            sink.emit(&AppEvent::RelayChanged(relay));
        }
        self.report_faults(sink);
        self.publish_telemetry(now, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn build_telemetry(&self) -> TelemetryData {
        TelemetryData {
            stage: self.mcm.startup_stage(),
            inverter_status: self.mcm.inverter_status(),
            relay_closed: self.mcm.relay_state(),
            pedal_travel: self.sensors.tps.travel_percent(),
            brake_percent: self.sensors.bps.percent(),
            torque_command: self.mcm.torque_command(),
            motor_rpm: self.mcm.motor_rpm(),
            motor_temp_c: self.mcm.motor_temp(),
            dc_voltage: self.mcm.dc_voltage(),
            dc_current: self.mcm.dc_current(),
            faults: self.safety.faults(),
            warnings: self.safety.warnings(),
            wheel_speed: self.sensors.wheel_speed(),
        }
    }

    pub fn motor_controller(&self) -> &MotorController {
        &self.mcm
    }

    pub fn safety(&self) -> &SafetyChecker {
        &self.safety
    }

    pub fn sensors(&self) -> &VcuSensors {
        &self.sensors
    }

    /// Mutable access for the startup code that records init failures.
    pub fn sensors_mut(&mut self) -> &mut VcuSensors {
        &mut self.sensors
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Polling period the runtime should honour.
    pub fn loop_interval_us(&self) -> u64 {
        self.timing.control_loop_interval_us
    }

    // ── Internal ──────────────────────────────────────────────

    fn transmit_command(&mut self, can: &mut impl CanPort, now: u64, sink: &mut impl EventSink) {
        let Some(frame) = self.mcm.command_frame() else {
            warn!("No command id for inverter base {:#05x}", self.mcm.can_base_id());
            return;
        };
        match can.transmit(&frame) {
            Ok(()) => self.mcm.mark_sent(now),
            Err(e) => {
                // Pending changes stay counted so the next tick retries.
                warn!("Command frame not sent: {e}");
                sink.emit(&AppEvent::TransmitFailed(e));
            }
        }
    }

    fn report_faults(&mut self, sink: &mut impl EventSink) {
        let faults = self.safety.faults();
        if faults & !self.last_faults != 0 {
            warn!("Safety fault! flags=0b{:013b}", faults);
            sink.emit(&AppEvent::FaultDetected(faults));
        } else if faults == 0 && self.last_faults != 0 {
            sink.emit(&AppEvent::FaultCleared);
        }
        self.last_faults = faults;
    }

    fn publish_telemetry(&mut self, now: u64, sink: &mut impl EventSink) {
        let due = self
            .last_telemetry_us
            .is_none_or(|last| now.saturating_sub(last) >= self.timing.telemetry_interval_us);
        if due {
            sink.emit(&AppEvent::Telemetry(self.build_telemetry()));
            self.last_telemetry_us = Some(now);
        }
    }
}
