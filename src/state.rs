use parking_lot::Mutex;
use serde::Serialize;

use crate::error::AppError;

pub const MAX_PERCENT: u8 = 100;

/// Point-in-time copy of [`SharedState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SwitchSnapshot {
    pub is_on: bool,
    pub change: bool,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// State written by switch monitors and the analog bridge, read by the HTTP
/// status endpoint. Every access goes through the one lock so a status read
/// never sees half of a transition.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<SwitchSnapshot>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot and clears the change flag in the same
    /// critical section.
    pub fn read_and_reset_change_flag(&self) -> SwitchSnapshot {
        let mut state = self.inner.lock();
        let snapshot = *state;
        state.change = false;
        snapshot
    }

    pub fn apply_transition(&self, is_on: bool) {
        let mut state = self.inner.lock();
        state.is_on = is_on;
        state.change = true;
    }

    pub fn mark_changed(&self) {
        self.inner.lock().change = true;
    }

    /// Stores the latest analog percentages. Does not count as a switch event.
    pub fn write_analog_levels(&self, red: u8, green: u8, blue: u8) -> Result<(), AppError> {
        if let Some(p) = [red, green, blue].into_iter().find(|p| *p > MAX_PERCENT) {
            return Err(AppError::InvalidArgument(format!(
                "analog level {p} exceeds {MAX_PERCENT}%"
            )));
        }

        let mut state = self.inner.lock();
        state.red = red;
        state.green = green;
        state.blue = blue;
        Ok(())
    }

    pub fn snapshot(&self) -> SwitchSnapshot {
        *self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn second_read_without_transition_reports_no_change() {
        let state = SharedState::new();
        state.apply_transition(true);

        let first = state.read_and_reset_change_flag();
        assert!(first.is_on);
        assert!(first.change);

        let second = state.read_and_reset_change_flag();
        assert!(second.is_on);
        assert!(!second.change);
    }

    #[test]
    fn analog_levels_do_not_flag_change() {
        let state = SharedState::new();
        state.write_analog_levels(10, 20, 30).unwrap();

        let snap = state.read_and_reset_change_flag();
        assert_eq!((snap.red, snap.green, snap.blue), (10, 20, 30));
        assert!(!snap.change);
    }

    #[test]
    fn out_of_range_analog_level_leaves_state_untouched() {
        let state = SharedState::new();
        state.write_analog_levels(1, 2, 3).unwrap();

        let err = state.write_analog_levels(50, 101, 0).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert_eq!(
            state.snapshot(),
            SwitchSnapshot {
                red: 1,
                green: 2,
                blue: 3,
                ..Default::default()
            }
        );
    }

    #[test]
    fn mark_changed_keeps_power_state() {
        let state = SharedState::new();
        state.apply_transition(true);
        state.read_and_reset_change_flag();

        state.mark_changed();
        let snap = state.read_and_reset_change_flag();
        assert!(snap.is_on);
        assert!(snap.change);
    }

    #[test]
    fn snapshot_does_not_reset() {
        let state = SharedState::new();
        state.apply_transition(false);

        assert!(state.snapshot().change);
        assert!(state.snapshot().change);
    }

    #[test]
    fn every_transition_is_read_exactly_once_and_whole() {
        const TRANSITIONS: usize = 2_000;

        let state = Arc::new(SharedState::new());
        let writer = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for i in 0..TRANSITIONS {
                    state.apply_transition(i % 2 == 0);
                    // wait for the reader to take this transition
                    while state.snapshot().change {
                        thread::yield_now();
                    }
                }
            })
        };

        let mut seen = 0usize;
        while seen < TRANSITIONS {
            let snap = state.read_and_reset_change_flag();
            if snap.change {
                assert_eq!(snap.is_on, seen % 2 == 0, "torn snapshot at transition {seen}");
                seen += 1;
            } else {
                thread::yield_now();
            }
        }
        writer.join().unwrap();

        assert_eq!(seen, TRANSITIONS);
        assert!(!state.read_and_reset_change_flag().change);
    }
}
