use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::buffer::{Buffer, Reader};
use crate::codec::{deserialize, serialize, space_required, DefaultTag, Tag};
use crate::error::Result;

const MICROS_PER_SECOND: i32 = 1_000_000;

/// Report timestamp: seconds and microseconds since the Unix epoch.
///
/// `microseconds` is kept in `0..1_000_000` by the constructors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeValue {
    pub seconds: i64,
    pub microseconds: i32,
}

impl TimeValue {
    /// Build a timestamp, carrying whole seconds out of `microseconds`.
    pub fn new(seconds: i64, microseconds: i32) -> Self {
        let carry = microseconds.div_euclid(MICROS_PER_SECOND);
        Self {
            seconds: seconds + i64::from(carry),
            microseconds: microseconds.rem_euclid(MICROS_PER_SECOND),
        }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Signed difference `self - earlier` in microseconds.
    pub fn micros_since(&self, earlier: &TimeValue) -> i64 {
        (self.seconds - earlier.seconds) * i64::from(MICROS_PER_SECOND)
            + i64::from(self.microseconds - earlier.microseconds)
    }
}

impl From<SystemTime> for TimeValue {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self::from(since),
            Err(err) => {
                let before = Self::from(err.duration());
                Self::new(-before.seconds, -before.microseconds)
            }
        }
    }
}

impl From<Duration> for TimeValue {
    fn from(since_epoch: Duration) -> Self {
        Self {
            seconds: since_epoch.as_secs() as i64,
            microseconds: since_epoch.subsec_micros() as i32,
        }
    }
}

impl Tag<TimeValue> for DefaultTag<TimeValue> {
    fn buffer(&self, buf: &mut Buffer, value: &TimeValue) -> Result<()> {
        serialize(buf, &value.seconds)?;
        serialize(buf, &value.microseconds)
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<TimeValue> {
        let seconds = deserialize(reader)?;
        let microseconds = deserialize(reader)?;
        Ok(TimeValue {
            seconds,
            microseconds,
        })
    }

    fn space_required(&self, existing: usize, value: &TimeValue) -> usize {
        let seconds = space_required(existing, &value.seconds);
        seconds + space_required(existing + seconds, &value.microseconds)
    }
}
