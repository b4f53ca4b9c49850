//! Stateless translation between inverter frames and typed fields.
//!
//! Multi-byte fields are little-endian 16-bit words (`hi << 8 | lo`).
//! Temperatures, currents, voltages and torque are sent in deci-units and
//! divided by 10 on decode.
//!
//! Command message layout (base + 0x20):
//! ```text
//! ┌──────────┬──────────┬───────────┬──────────────────┬─────────────┐
//! │ 0..=1    │ 2..=3    │ 4         │ 5                │ 6..=7       │
//! │ torque   │ speed    │ direction │ b0 enable        │ torque limit│
//! │ dNm LE   │ (0)      │ 1 = fwd   │ b1 discharge     │ dNm LE      │
//! └──────────┴──────────┴───────────┴──────────────────┴─────────────┘
//! ```

use embedded_can::Frame;

use super::{COMMAND_OFFSET, CanFrame, FRAME_LEN, InverterMessage};

/// Enable / disable command value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    Enabled,
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// Inverter enable state as reported by the inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InverterStatus {
    #[default]
    Unknown,
    Enabled,
    Disabled,
}

/// Inverter enable lockout as reported by the inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockoutStatus {
    #[default]
    Unknown,
    Locked,
    Unlocked,
}

/// A decoded telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Telemetry {
    /// Motor temperature (°C).
    MotorTemperature(i16),
    /// Motor speed (rpm).
    MotorSpeed(i16),
    /// DC bus current (A).
    DcCurrent(i32),
    /// DC bus voltage (V).
    DcVoltage(i32),
    /// Enable state and lockout, both packed in byte 6.
    InternalStates {
        inverter: InverterStatus,
        lockout: LockoutStatus,
    },
    /// Raw POST and run fault words.
    FaultCodes([u8; FRAME_LEN]),
    /// Torque the inverter is currently commanding (Nm).
    CommandedTorque(i16),
}

/// Command fields packed into the outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InverterCommand {
    pub torque_dnm: i16,
    pub torque_limit_dnm: i16,
    pub direction: Direction,
    pub inverter: Status,
    pub discharge: Status,
}

const ENABLE_STATE_BIT: u8 = 1 << 0;
const LOCKOUT_BIT: u8 = 1 << 7;
const CMD_ENABLE_BIT: u8 = 1 << 0;
const CMD_DISCHARGE_BIT: u8 = 1 << 1;

fn word(data: &[u8], lo: usize) -> i16 {
    i16::from_le_bytes([data[lo], data[lo + 1]])
}

/// Decode a frame addressed to the inverter at `base_id`.
///
/// Unknown ids, messages with no wired field and short frames return
/// `None`; they are not errors.
pub fn decode(base_id: u16, frame: &CanFrame) -> Option<Telemetry> {
    let msg = InverterMessage::from_id(base_id, frame.raw_id())?;
    let data = frame.data();
    if data.len() < FRAME_LEN {
        return None;
    }

    match msg {
        InverterMessage::Temperatures3 => Some(Telemetry::MotorTemperature(word(data, 4) / 10)),
        InverterMessage::MotorPosition => Some(Telemetry::MotorSpeed(word(data, 2))),
        InverterMessage::CurrentInfo => Some(Telemetry::DcCurrent(i32::from(word(data, 6)) / 10)),
        InverterMessage::VoltageInfo => Some(Telemetry::DcVoltage(i32::from(word(data, 0)) / 10)),
        InverterMessage::InternalStates => {
            let flags = data[6];
            let inverter = if flags & ENABLE_STATE_BIT != 0 {
                InverterStatus::Enabled
            } else {
                InverterStatus::Disabled
            };
            let lockout = if flags & LOCKOUT_BIT != 0 {
                LockoutStatus::Locked
            } else {
                LockoutStatus::Unlocked
            };
            Some(Telemetry::InternalStates { inverter, lockout })
        }
        InverterMessage::FaultCodes => {
            let mut codes = [0u8; FRAME_LEN];
            codes.copy_from_slice(data);
            Some(Telemetry::FaultCodes(codes))
        }
        InverterMessage::TorqueTimer => Some(Telemetry::CommandedTorque(word(data, 0) / 10)),
        // Not wired to telemetry yet.
        InverterMessage::Temperatures1
        | InverterMessage::Temperatures2
        | InverterMessage::AnalogInputs
        | InverterMessage::DigitalInputs
        | InverterMessage::FluxInfo
        | InverterMessage::InternalVoltages => None,
    }
}

/// Build the command frame for the inverter at `base_id`.
pub fn encode_command(base_id: u16, cmd: &InverterCommand) -> Option<CanFrame> {
    let mut data = [0u8; FRAME_LEN];
    data[0..2].copy_from_slice(&cmd.torque_dnm.to_le_bytes());
    // Bytes 2..=3: speed command, unused in torque mode.
    data[4] = match cmd.direction {
        Direction::Forward => 1,
        Direction::Reverse => 0,
    };
    if cmd.inverter == Status::Enabled {
        data[5] |= CMD_ENABLE_BIT;
    }
    if cmd.discharge == Status::Enabled {
        data[5] |= CMD_DISCHARGE_BIT;
    }
    data[6..8].copy_from_slice(&cmd.torque_limit_dnm.to_le_bytes());

    CanFrame::standard(base_id.checked_add(COMMAND_OFFSET)?, data)
}

/// Inverse of [`encode_command`], used by bench tools and inverter mocks.
pub fn decode_command(base_id: u16, frame: &CanFrame) -> Option<InverterCommand> {
    if frame.raw_id() != base_id.checked_add(COMMAND_OFFSET)? || frame.dlc() < FRAME_LEN {
        return None;
    }
    let data = frame.data();
    let status = |bit: u8| {
        if data[5] & bit != 0 {
            Status::Enabled
        } else {
            Status::Disabled
        }
    };
    Some(InverterCommand {
        torque_dnm: word(data, 0),
        torque_limit_dnm: word(data, 6),
        direction: if data[4] == 0 {
            Direction::Reverse
        } else {
            Direction::Forward
        },
        inverter: status(CMD_ENABLE_BIT),
        discharge: status(CMD_DISCHARGE_BIT),
    })
}
