use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of creation instants for new records.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that advances by a fixed step on every reading.
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = *next;
        *next = current + self.step;
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_clock_is_strictly_increasing() {
        let start = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let clock = SteppingClock::new(start, Duration::milliseconds(5));
        assert_eq!(clock.now_millis(), 1_700_000_000_000);
        assert_eq!(clock.now_millis(), 1_700_000_000_005);
        assert!(clock.now() < clock.now());
    }
}
