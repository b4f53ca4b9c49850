//! Vehicle control unit core.
//!
//! Pedal sensing, the motor inverter model (startup handshake, HV relay,
//! torque synthesis), the inverter CAN codec and the safety checker, wired
//! together by the [`app::service::VcuService`] control loop.  Hardware is
//! reached only through the port traits in [`app::ports`], so everything
//! here runs on the host for testing.

#![deny(unused_must_use)]

pub mod app;
pub mod bms;
pub mod can;
pub mod config;
pub mod drivers;
pub mod error;
pub mod mcm;
pub mod safety;
pub mod sensors;

pub use error::{Error, Result};
