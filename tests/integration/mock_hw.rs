//! Mock vehicle adapters for integration tests.
//!
//! `MockVehicle` turns pedal positions into raw samples on the default
//! calibration and drives a real [`McmRelay`] over a fake pin.  `MockBus`
//! plays the inverter side of the CAN link.

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use vcu::app::events::AppEvent;
use vcu::app::ports::{ActuatorPort, CanPort, Clock, EventSink, SensorPort};
use vcu::bms::BmsReadings;
use vcu::can::codec::{self, InverterCommand};
use vcu::can::{CanFrame, InverterMessage};
use vcu::drivers::McmRelay;
use vcu::error::CanError;
use vcu::sensors::VcuSensors;

pub const BASE: u16 = 0xA0;

// ── Relay pin ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPin {
    pub high: bool,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        Ok(())
    }
}

// ── MockVehicle ───────────────────────────────────────────────

pub struct MockVehicle {
    /// Accelerator travel, 0.0 - 1.0.
    pub pedal: f32,
    /// Brake pressure fraction, 0.0 - 1.0.
    pub brake: f32,
    pub rtd_pressed: bool,
    pub hv_present: bool,
    pub lv_mv: f32,
    /// Wheel speed pulse frequency, same at every corner (Hz).
    pub wheel_hz: f32,
    pub bms: BmsReadings,
    pub relay: McmRelay<MockPin>,
    pub alerts: u32,
}

#[allow(dead_code)]
impl MockVehicle {
    pub fn new() -> Self {
        Self {
            pedal: 0.0,
            brake: 0.0,
            rtd_pressed: false,
            hv_present: true,
            lv_mv: 12_800.0,
            wheel_hz: 0.0,
            bms: BmsReadings::new(35.0, 380.0, 0.0),
            relay: McmRelay::new(MockPin::default()).unwrap(),
            alerts: 0,
        }
    }
}

impl SensorPort for MockVehicle {
    fn acquire(&mut self, sensors: &mut VcuSensors) {
        // Default calibration: pulse widths 50 us .. 950 us, TPS1 inverted.
        let span = 0.001 * 0.90;
        sensors.tps.tps0.update(0.001 * 0.05 + self.pedal * span, true);
        sensors.tps.tps1.update(0.001 * 0.95 - self.pedal * span, true);
        sensors.bps.bps0.update(1.0 + self.brake * 9_999.0, true);
        // Active low.
        sensors.rtd_button.update_digital(!self.rtd_pressed);
        sensors.hvil_term_sense.update_digital(self.hv_present);
        sensors.lv_battery.update(self.lv_mv, true);
        for wss in [
            &mut sensors.wss.fl,
            &mut sensors.wss.fr,
            &mut sensors.wss.rl,
            &mut sensors.wss.rr,
        ] {
            wss.update(self.wheel_hz, true);
        }
    }

    fn bms(&mut self) -> BmsReadings {
        self.bms
    }
}

impl ActuatorPort for MockVehicle {
    fn set_relay(&mut self, closed: bool) {
        self.relay.apply(closed).unwrap();
    }

    fn sound_rtd_alert(&mut self) {
        self.alerts += 1;
    }
}

// ── MockBus ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBus {
    pub rx: VecDeque<CanFrame>,
    pub tx: Vec<CanFrame>,
    pub fail_next: Option<CanError>,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inverter broadcast.
    pub fn inverter_says(&mut self, msg: InverterMessage, data: [u8; 8]) {
        let frame = CanFrame::standard(BASE + msg.offset(), data).unwrap();
        self.rx.push_back(frame);
    }

    pub fn inverter_enabled(&mut self, enabled: bool) {
        let mut data = [0u8; 8];
        data[6] = u8::from(enabled);
        self.inverter_says(InverterMessage::InternalStates, data);
    }

    /// Torque the inverter reports it is producing (Nm).
    pub fn inverter_torque(&mut self, nm: i16) {
        let raw = (nm * 10).to_le_bytes();
        self.inverter_says(InverterMessage::TorqueTimer, [raw[0], raw[1], 0, 0, 0, 0, 0, 0]);
    }

    pub fn last_command(&self) -> Option<InverterCommand> {
        self.tx.last().and_then(|f| codec::decode_command(BASE, f))
    }
}

impl CanPort for MockBus {
    fn transmit(&mut self, frame: &CanFrame) -> Result<(), CanError> {
        if let Some(e) = self.fail_next.take() {
            return Err(e);
        }
        self.tx.push(*frame);
        Ok(())
    }

    fn receive(&mut self) -> Option<CanFrame> {
        self.rx.pop_front()
    }
}

// ── Clock / events ────────────────────────────────────────────

#[derive(Default)]
pub struct MockClock {
    pub now: Cell<u64>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn advance(&self, us: u64) {
        self.now.set(self.now.get() + us);
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.now.get()
    }
}

#[derive(Default)]
pub struct EventLog {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl EventLog {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
