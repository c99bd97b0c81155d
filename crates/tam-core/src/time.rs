//! Hour-of-day model.
//!
//! Sensor counts and fitted flows are binned into 24 hourly slots.  `Hour`
//! wraps the slot index so that arithmetic always stays on the 24-hour clock.

use std::fmt;

use crate::{CoreError, CoreResult};

/// Number of hourly bins in every target and flow matrix.
pub const HOURS_PER_DAY: usize = 24;

/// An hour-of-day slot in `0..24`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hour(u8);

impl Hour {
    /// Validate and wrap an hour index.
    pub fn new(hour: usize) -> CoreResult<Self> {
        if hour >= HOURS_PER_DAY {
            return Err(CoreError::Parse(format!("hour {hour} outside 0..{HOURS_PER_DAY}")));
        }
        Ok(Hour(hour as u8))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The hour `n` hours later, wrapping past midnight.
    #[inline]
    pub fn wrapping_add(self, n: usize) -> Hour {
        Hour(((self.0 as usize + n) % HOURS_PER_DAY) as u8)
    }

    /// All 24 slots in order.
    pub fn all() -> impl Iterator<Item = Hour> {
        (0..HOURS_PER_DAY as u8).map(Hour)
    }

    /// Clock time `HH:MM:00` at `minute` past this hour.
    pub fn clock_time(self, minute: u8) -> String {
        format!("{:02}:{:02}:00", self.0, minute.min(59))
    }
}

impl fmt::Display for Hour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{:02}", self.0)
    }
}
