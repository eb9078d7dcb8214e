use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Time source for all clock arithmetic. Injected so tests can drive time
/// explicitly instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        let mut current = self.current.lock().unwrap();
        *current += Duration::milliseconds(ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Utc::now());
        let before = clock.now();
        clock.advance_ms(1500);
        assert_eq!((clock.now() - before).num_milliseconds(), 1500);
    }
}
