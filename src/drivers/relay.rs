//! Inverter HV relay driver.
//!
//! The relay coil is driven from one GPIO (high = closed).  The motor
//! controller decides the relay state each cycle; this driver only applies
//! it and remembers what was last written.
//!
//! On target the pin is a HAL GPIO; on host/test any
//! [`embedded_hal::digital::OutputPin`] will do.

use embedded_hal::digital::{OutputPin, PinState};
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Open,
    Closed,
    /// The last pin write failed; the physical state is unknown.
    Faulted,
}

pub struct McmRelay<P> {
    pin: P,
    state: RelayState,
}

impl<P: OutputPin> McmRelay<P> {
    /// Take the pin and drive it low so the relay starts open.
    pub fn new(mut pin: P) -> Result<Self, P::Error> {
        pin.set_low()?;
        Ok(Self {
            pin,
            state: RelayState::Open,
        })
    }

    /// Write the commanded state.  The pin is driven every call so a
    /// glitched output is restored on the next cycle.
    pub fn apply(&mut self, closed: bool) -> Result<(), P::Error> {
        let next = if closed { RelayState::Closed } else { RelayState::Open };
        if let Err(e) = self.pin.set_state(PinState::from(closed)) {
            warn!("MCM relay write failed (wanted {next:?})");
            self.state = RelayState::Faulted;
            return Err(e);
        }
        if self.state != next {
            info!("MCM relay {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        Ok(())
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == RelayState::Closed
    }

    /// Give the pin back, e.g. to reconfigure it on shutdown.
    pub fn release(self) -> P {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    #[derive(Default)]
    struct MockPin {
        high: bool,
        writes: u32,
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    struct BrokenPin;

    impl ErrorType for BrokenPin {
        type Error = ErrorKind;
    }

    impl OutputPin for BrokenPin {
        fn set_low(&mut self) -> Result<(), ErrorKind> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), ErrorKind> {
            Err(ErrorKind::Other)
        }
    }

    #[test]
    fn starts_open_and_follows_command() {
        let mut relay = McmRelay::new(MockPin::default()).unwrap();
        assert_eq!(relay.state(), RelayState::Open);

        relay.apply(true).unwrap();
        assert!(relay.is_closed());
        relay.apply(true).unwrap();
        relay.apply(false).unwrap();
        assert_eq!(relay.state(), RelayState::Open);

        let pin = relay.release();
        assert!(!pin.high);
        assert_eq!(pin.writes, 4);
    }

    #[test]
    fn write_failure_marks_relay_faulted() {
        let mut relay = McmRelay::new(BrokenPin).unwrap();
        assert_eq!(relay.apply(true), Err(ErrorKind::Other));
        assert_eq!(relay.state(), RelayState::Faulted);
        relay.apply(false).unwrap();
        assert_eq!(relay.state(), RelayState::Open);
    }
}
