//! Fuzz target: inverter frame decoding.
//!
//! Splits the input into a base id, a frame id and a payload of up to
//! 8 bytes, then pushes the frame through the codec and a live motor
//! controller.  Neither may panic, and the controller must ignore any
//! frame the codec rejects.
//!
//! cargo fuzz run fuzz_can_decode

#![no_main]

use embedded_can::{Frame, StandardId};
use libfuzzer_sys::fuzz_target;
use vcu::can::CanFrame;
use vcu::can::codec;
use vcu::mcm::{Direction, MotorController};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let base = u16::from_le_bytes([data[0], data[1]]) & 0x7FF;
    let raw_id = u16::from_le_bytes([data[2], data[3]]) & 0x7FF;
    let payload = &data[4..data.len().min(12)];

    let Some(id) = StandardId::new(raw_id) else {
        return;
    };
    let Some(frame) = <CanFrame as Frame>::new(id, payload) else {
        return;
    };

    let decoded = codec::decode(base, &frame);
    let mut mcm = MotorController::new(base, Direction::Forward, 1000);
    assert_eq!(mcm.parse_can_message(&frame), decoded.is_some());

    // Command frames decode only at their own id.
    let _ = codec::decode_command(base, &frame);
});
