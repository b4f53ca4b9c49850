//! Actuator drivers.

pub mod relay;

pub use relay::{McmRelay, RelayState};
