//! CAN frames exchanged with the motor inverter.
//!
//! The inverter broadcasts a block of 8-byte telemetry messages starting
//! at its base id and listens for one command message.  Ids are always
//! expressed as an offset from the controller's `can_base_id`:
//!
//! ```text
//!  base + 0x00 ..= 0x0C   inverter → VCU   telemetry (see InverterMessage)
//!  base + 0x20            VCU → inverter   command
//! ```
//!
//! [`CanFrame`] implements [`embedded_can::Frame`] so any HAL transport
//! can carry it.

pub mod codec;

use embedded_can::{Frame, Id, StandardId};

/// Payload length of every inverter message.
pub const FRAME_LEN: usize = 8;

/// Offset of the command message from the base id.
pub const COMMAND_OFFSET: u16 = 0x20;

/// A standard-id data frame with up to 8 payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: StandardId,
    dlc: u8,
    data: [u8; FRAME_LEN],
}

impl CanFrame {
    /// Full 8-byte frame with a raw 11-bit id.  `None` if the id does not fit.
    pub fn standard(raw_id: u16, data: [u8; FRAME_LEN]) -> Option<Self> {
        Some(Self {
            id: StandardId::new(raw_id)?,
            dlc: FRAME_LEN as u8,
            data,
        })
    }

    /// Raw 11-bit identifier.
    pub fn raw_id(&self) -> u16 {
        self.id.as_raw()
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let Id::Standard(id) = id.into() else {
            return None;
        };
        if data.len() > FRAME_LEN {
            return None;
        }
        let mut buf = [0u8; FRAME_LEN];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            dlc: data.len() as u8,
            data: buf,
        })
    }

    /// Remote frames are not used on this bus.
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        Id::Standard(self.id)
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}

// ---------------------------------------------------------------------------
// Inverter message table
// ---------------------------------------------------------------------------

/// Telemetry messages broadcast by the inverter, by offset from base id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InverterMessage {
    Temperatures1 = 0x00,
    Temperatures2 = 0x01,
    Temperatures3 = 0x02,
    AnalogInputs = 0x03,
    DigitalInputs = 0x04,
    MotorPosition = 0x05,
    CurrentInfo = 0x06,
    VoltageInfo = 0x07,
    FluxInfo = 0x08,
    InternalVoltages = 0x09,
    InternalStates = 0x0A,
    FaultCodes = 0x0B,
    TorqueTimer = 0x0C,
}

impl InverterMessage {
    /// Identify a received id relative to `base_id`.
    pub fn from_id(base_id: u16, id: u16) -> Option<Self> {
        Self::from_offset(id.checked_sub(base_id)?)
    }

    pub fn from_offset(offset: u16) -> Option<Self> {
        Some(match offset {
            0x00 => Self::Temperatures1,
            0x01 => Self::Temperatures2,
            0x02 => Self::Temperatures3,
            0x03 => Self::AnalogInputs,
            0x04 => Self::DigitalInputs,
            0x05 => Self::MotorPosition,
            0x06 => Self::CurrentInfo,
            0x07 => Self::VoltageInfo,
            0x08 => Self::FluxInfo,
            0x09 => Self::InternalVoltages,
            0x0A => Self::InternalStates,
            0x0B => Self::FaultCodes,
            0x0C => Self::TorqueTimer,
            _ => return None,
        })
    }

    pub const fn offset(self) -> u16 {
        self as u16
    }
}
