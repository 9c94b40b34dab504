use std::time::{Duration, Instant};

/// Single-slot timer: every `schedule` replaces the pending deadline.
#[derive(Debug, Clone)]
pub(crate) struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the pending action is due, if any.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// True once when the deadline has passed; the slot is cleared afterwards.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn test_fires_once_after_delay() {
        let start = Instant::now();
        let mut timer = Debounce::new(DELAY);
        assert!(!timer.fire(start));

        timer.schedule(start);
        assert!(!timer.fire(start + Duration::from_millis(999)));
        assert!(timer.fire(start + DELAY));
        assert!(!timer.fire(start + DELAY * 2));
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_reschedule_postpones() {
        let start = Instant::now();
        let mut timer = Debounce::new(DELAY);
        timer.schedule(start);
        timer.schedule(start + Duration::from_millis(600));

        assert!(!timer.fire(start + DELAY));
        assert_eq!(
            timer.remaining(start + DELAY),
            Some(Duration::from_millis(600))
        );
        assert!(timer.fire(start + Duration::from_millis(1600)));
    }

    #[test]
    fn test_cancel_clears_pending() {
        let start = Instant::now();
        let mut timer = Debounce::new(DELAY);
        timer.schedule(start);
        timer.cancel();
        assert_eq!(timer.remaining(start), None);
        assert!(!timer.fire(start + DELAY));
    }
}
