//! Time-debounced boolean conditions.
//!
//! A raw condition must hold continuously for `set_after_us` before the
//! debounced output turns on, and be absent continuously for
//! `clear_after_us` before it turns off again.  A zero window follows the
//! raw input immediately.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebouncedCondition {
    active: bool,
    /// Start of the current disagreement between raw input and output.
    pending_since: Option<u64>,
    set_after_us: u64,
    clear_after_us: u64,
}

impl DebouncedCondition {
    pub const fn new(set_after_us: u64, clear_after_us: u64) -> Self {
        Self {
            active: false,
            pending_since: None,
            set_after_us,
            clear_after_us,
        }
    }

    /// Same window for setting and clearing.
    pub const fn symmetric(window_us: u64) -> Self {
        Self::new(window_us, window_us)
    }

    /// Feed this cycle's raw condition; returns the debounced state.
    pub fn update(&mut self, raw: bool, now_us: u64) -> bool {
        if raw == self.active {
            self.pending_since = None;
            return self.active;
        }

        let since = *self.pending_since.get_or_insert(now_us);
        let window = if raw { self.set_after_us } else { self.clear_after_us };
        if now_us.saturating_sub(since) >= window {
            self.active = raw;
            self.pending_since = None;
        }
        self.active
    }

    /// True while the raw input disagrees with the output.
    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.pending_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_only_after_window() {
        let mut c = DebouncedCondition::symmetric(100);
        assert!(!c.update(true, 0));
        assert!(c.is_pending());
        assert!(!c.update(true, 99));
        assert!(c.update(true, 100));
        assert!(!c.is_pending());
    }

    #[test]
    fn glitch_restarts_window() {
        let mut c = DebouncedCondition::symmetric(100);
        c.update(true, 0);
        c.update(false, 50);
        assert!(!c.update(true, 120));
        assert!(c.update(true, 220));
    }

    #[test]
    fn single_good_sample_does_not_clear() {
        let mut c = DebouncedCondition::new(0, 100);
        assert!(c.update(true, 0));
        assert!(c.update(false, 10));
        assert!(c.update(true, 20));
        assert!(c.update(false, 30));
        assert!(c.update(false, 129));
        assert!(!c.update(false, 130));
    }

    #[test]
    fn zero_window_follows_input() {
        let mut c = DebouncedCondition::symmetric(0);
        assert!(c.update(true, 5));
        assert!(!c.update(false, 5));
        c.update(true, 6);
        c.reset();
        assert!(!c.is_active());
    }
}
