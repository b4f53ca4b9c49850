//! Integration tests: VcuService → MotorController / SafetyChecker → CAN.

use vcu::app::events::AppEvent;
use vcu::app::service::VcuService;
use vcu::can::InverterMessage;
use vcu::can::codec::Status;
use vcu::config::VcuConfig;
use vcu::error::{CanError, SafetyFault, SafetyWarning};
use vcu::mcm::StartupStage;
use vcu::sensors::InitErrors;

use crate::mock_hw::{EventLog, MockBus, MockClock, MockVehicle};

const CYCLE_US: u64 = 125_000;

struct Rig {
    app: VcuService,
    hw: MockVehicle,
    bus: MockBus,
    clock: MockClock,
    log: EventLog,
}

impl Rig {
    fn new() -> Self {
        let mut app = VcuService::new(VcuConfig::default()).unwrap();
        let mut log = EventLog::default();
        app.start(&mut log);
        Self {
            app,
            hw: MockVehicle::new(),
            bus: MockBus::new(),
            clock: MockClock::default(),
            log,
        }
    }

    /// Run one cycle at the current time, then advance the clock.
    fn tick(&mut self) {
        self.tick_after(CYCLE_US);
    }

    fn tick_after(&mut self, us: u64) {
        self.app.tick(&mut self.hw, &mut self.bus, &self.clock, &mut self.log);
        self.clock.advance(us);
    }

    fn stage(&self) -> StartupStage {
        self.app.motor_controller().startup_stage()
    }

    /// Walk the handshake up to the ready-to-drive alert.
    fn drive_to_ready(&mut self) {
        self.tick();
        assert_eq!(self.stage(), StartupStage::Idle);

        self.bus.inverter_enabled(false);
        self.tick();
        assert_eq!(self.stage(), StartupStage::LockoutCleared);

        self.hw.rtd_pressed = true;
        self.tick();
        self.hw.rtd_pressed = false;
        assert_eq!(self.stage(), StartupStage::EnableRequested);

        self.bus.inverter_enabled(true);
        self.tick();
        assert_eq!(self.stage(), StartupStage::ReadyToDrive);
    }

    fn drive(&mut self, pedal: f32) {
        self.drive_to_ready();
        self.hw.pedal = pedal;
        self.tick();
        assert_eq!(self.stage(), StartupStage::Driving);
    }
}

#[test]
fn handshake_reaches_driving_and_commands_pedal_torque() {
    let mut rig = Rig::new();
    rig.drive_to_ready();

    assert_eq!(rig.hw.alerts, 1);
    assert!(rig.hw.relay.is_closed());
    let cmd = rig.bus.last_command().unwrap();
    assert_eq!(cmd.inverter, Status::Enabled);
    // Zero pedal regen: -10 % of -20 % of 1000 dNm.
    assert_eq!(cmd.torque_dnm, -20);

    rig.hw.pedal = 0.5;
    rig.tick();
    assert_eq!(rig.stage(), StartupStage::Driving);
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, 490);

    for _ in 0..5 {
        rig.tick();
    }
    assert_eq!(rig.hw.alerts, 1);
    assert_eq!(rig.log.count(|e| *e == AppEvent::ReadyToDrive), 1);
    assert_eq!(rig.log.events.first(), Some(&AppEvent::Started));
    assert_eq!(
        rig.log.count(|e| matches!(
            e,
            AppEvent::StageChanged {
                to: StartupStage::Driving,
                ..
            }
        )),
        1
    );
}

#[test]
fn pedal_held_blocks_enable_request() {
    let mut rig = Rig::new();
    rig.tick();
    rig.bus.inverter_enabled(false);
    rig.hw.pedal = 0.2;
    rig.hw.rtd_pressed = true;

    for _ in 0..8 {
        rig.tick();
        assert_eq!(rig.stage(), StartupStage::LockoutCleared);
    }
    assert_eq!(rig.bus.last_command().unwrap().inverter, Status::Disabled);
    assert_eq!(rig.hw.alerts, 0);
}

#[test]
fn accel_and_brake_together_zero_the_command() {
    let mut rig = Rig::new();
    rig.drive(0.5);

    rig.hw.pedal = 0.6;
    rig.hw.brake = 0.3;
    rig.tick();
    assert!(!rig.app.safety().all_safe());
    assert!(rig.app.safety().has_fault(SafetyFault::TpsBpsImplausible));
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, 0);
    assert_eq!(
        rig.log.count(|e| matches!(e, AppEvent::FaultDetected(_))),
        1
    );

    // Pedal released: the latch holds for one more cycle, then clears and
    // zero-pedal regen resumes.
    rig.hw.pedal = 0.0;
    rig.hw.brake = 0.0;
    rig.tick();
    assert!(rig.app.safety().has_fault(SafetyFault::TpsBpsImplausible));
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, 0);
    rig.tick();
    assert!(rig.app.safety().all_safe());
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, -20);
    assert_eq!(rig.log.count(|e| *e == AppEvent::FaultCleared), 1);
}

#[test]
fn hv_loss_holds_relay_while_inverter_produces_torque() {
    let mut rig = Rig::new();
    rig.drive(0.5);
    rig.bus.inverter_torque(49);
    rig.tick();

    rig.hw.hv_present = false;
    rig.tick();
    assert!(rig.hw.relay.is_closed());
    assert_eq!(rig.stage(), StartupStage::Idle);
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, 0);
    assert!(rig.app.safety().has_warning(SafetyWarning::HvilTerminationLost));

    // Still inside the 2 s window.
    for _ in 0..16 {
        rig.tick();
        assert!(rig.hw.relay.is_closed());
    }
    rig.tick();
    assert!(!rig.hw.relay.is_closed());
    assert_eq!(rig.log.count(|e| *e == AppEvent::RelayChanged(false)), 1);
}

#[test]
fn hv_loss_opens_relay_once_inverter_reports_zero_torque() {
    let mut rig = Rig::new();
    rig.drive(0.5);
    rig.bus.inverter_torque(49);
    rig.tick();

    rig.hw.hv_present = false;
    rig.tick();
    assert!(rig.hw.relay.is_closed());

    rig.bus.inverter_torque(0);
    rig.tick();
    assert!(!rig.hw.relay.is_closed());
}

#[test]
fn failed_transmit_is_retried_next_cycle() {
    let mut rig = Rig::new();
    rig.bus.fail_next = Some(CanError::BusOff);
    rig.tick();
    assert!(rig.bus.tx.is_empty());
    assert_eq!(rig.log.count(|e| *e == AppEvent::TransmitFailed(CanError::BusOff)), 1);

    rig.tick();
    assert_eq!(rig.bus.tx.len(), 1);
}

#[test]
fn unchanged_command_is_resent_on_heartbeat() {
    let mut rig = Rig::new();
    rig.tick();
    assert_eq!(rig.bus.tx.len(), 1);
    rig.tick();
    assert_eq!(rig.bus.tx.len(), 1);
    rig.tick();
    assert_eq!(rig.bus.tx.len(), 2);
    assert!(rig.bus.tx.iter().all(|f| f.raw_id() == 0xC0));
}

#[test]
fn telemetry_frames_reach_the_snapshot() {
    let mut rig = Rig::new();
    rig.bus.inverter_says(InverterMessage::VoltageInfo, [0x64, 0, 0, 0, 0, 0, 0, 0]);
    rig.bus.inverter_says(InverterMessage::MotorPosition, [0, 0, 0xE8, 0x03, 0, 0, 0, 0]);
    // Foreign and unwired ids are ignored.
    rig.bus.rx.push_back(vcu::can::CanFrame::standard(0x300, [0xFF; 8]).unwrap());
    rig.bus.inverter_says(InverterMessage::FluxInfo, [0xFF; 8]);
    rig.tick();

    let t = rig.app.build_telemetry();
    assert_eq!(t.dc_voltage, 10);
    assert_eq!(t.motor_rpm, 1000);
    assert!(rig.bus.rx.is_empty());
}

#[test]
fn power_draw_above_ceiling_limits_drive_torque() {
    let mut rig = Rig::new();
    rig.drive(1.0);
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, 1000);

    // 380 V * 220 A = 83.6 kW against an 80 kW ceiling.
    rig.hw.bms.pack_current_a = 220.0;
    rig.tick();
    assert!(rig.app.safety().all_safe());
    assert!(rig.app.safety().has_warning(SafetyWarning::PowerDrawHigh));
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, 957);
}

#[test]
fn hot_pack_blocks_torque() {
    let mut rig = Rig::new();
    rig.drive(1.0);

    rig.hw.bms.pack_temp_max_c = 65.0;
    rig.tick();
    assert!(rig.app.safety().has_fault(SafetyFault::PackOverTemperature));
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, 0);
}

#[test]
fn hv_absent_command_goes_out_on_heartbeat_only() {
    let mut rig = Rig::new();
    rig.hw.hv_present = false;

    // 100 cycles 10 ms apart: heartbeats fall at 250, 500 and 750 ms.
    for _ in 0..100 {
        rig.tick_after(10_000);
    }
    assert_eq!(rig.bus.tx.len(), 3);
    assert!(rig.bus.tx.iter().all(|f| {
        let cmd = vcu::can::codec::decode_command(0xA0, f).unwrap();
        cmd.torque_dnm == 0 && cmd.inverter == Status::Disabled
    }));
}

#[test]
fn faulted_command_goes_out_on_heartbeat_only() {
    let mut rig = Rig::new();
    rig.drive(0.5);

    rig.hw.pedal = 0.6;
    rig.hw.brake = 0.3;
    rig.tick_after(10_000);
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, 0);
    let sent = rig.bus.tx.len();

    for _ in 0..99 {
        rig.tick_after(10_000);
    }
    assert!(rig.app.safety().has_fault(SafetyFault::TpsBpsImplausible));
    assert_eq!(rig.bus.tx.len() - sent, 3);
}

#[test]
fn handshake_stays_idle_without_hv() {
    let mut rig = Rig::new();
    rig.hw.hv_present = false;
    rig.bus.inverter_enabled(false);
    rig.hw.rtd_pressed = true;

    for _ in 0..4 {
        rig.tick();
        assert_eq!(rig.stage(), StartupStage::Idle);
        assert_eq!(rig.app.motor_controller().inverter_command(), Status::Disabled);
    }
    assert!(!rig.hw.relay.is_closed());
    assert_eq!(rig.hw.alerts, 0);

    // HV restored with the button still held: the handshake proceeds.
    rig.hw.hv_present = true;
    rig.tick();
    assert_eq!(rig.stage(), StartupStage::EnableRequested);
    assert!(rig.hw.relay.is_closed());
}

#[test]
fn telemetry_snapshot_published_each_interval() {
    let mut rig = Rig::new();
    rig.hw.wheel_hz = 250.0;

    // 17 cycles span 0 .. 2 s; snapshots at 0, 1 and 2 s.
    for _ in 0..17 {
        rig.tick();
    }
    let snapshots: Vec<_> = rig
        .log
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Telemetry(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(snapshots.len(), 3);
    assert!((snapshots[2].wheel_speed - 0.25).abs() < 1e-6);
    assert_eq!(snapshots[2].stage, StartupStage::Idle);
}

#[test]
fn switch_init_error_blocks_torque_for_good() {
    let mut rig = Rig::new();
    rig.app
        .sensors_mut()
        .hvil_term_sense
        .record_init_error(InitErrors::SIGNAL_INIT_FAILED);
    rig.drive(0.5);

    assert!(rig.app.safety().has_fault(SafetyFault::SwitchInitFailed));
    assert_eq!(rig.bus.last_command().unwrap().torque_dnm, 0);
    for _ in 0..8 {
        rig.tick();
    }
    assert!(!rig.app.safety().all_safe());
}
