//! Application core: the control loop, zero I/O.
//!
//! Orchestrates sensors, the motor controller and the safety checker once
//! per cycle.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
