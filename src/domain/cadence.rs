// Outbound update gate: send on change, otherwise at most once per resend interval.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CadenceGate {
    resend_interval: Duration,
    // -1 so the first update of a connection always goes out.
    last_sent_count: i64,
    last_sent_at: Option<Instant>,
}

impl CadenceGate {
    pub fn new(resend_interval: Duration) -> Self {
        Self {
            resend_interval,
            last_sent_count: -1,
            last_sent_at: None,
        }
    }

    pub fn should_send(&self, count: u32, now: Instant) -> bool {
        i64::from(count) != self.last_sent_count
            || self
                .last_sent_at
                .is_none_or(|at| now.saturating_duration_since(at) > self.resend_interval)
    }

    pub fn record(&mut self, count: u32, now: Instant) {
        self.last_sent_count = i64::from(count);
        self.last_sent_at = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_sent_count = -1;
        self.last_sent_at = None;
    }

    pub fn last_sent_count(&self) -> Option<u32> {
        u32::try_from(self.last_sent_count).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESEND: Duration = Duration::from_secs(2);

    #[test]
    fn first_update_always_sends() {
        let gate = CadenceGate::new(RESEND);
        assert!(gate.should_send(0, Instant::now()));
        assert_eq!(gate.last_sent_count(), None);
    }

    #[test]
    fn unchanged_count_is_suppressed_within_interval() {
        let start = Instant::now();
        let mut gate = CadenceGate::new(RESEND);
        gate.record(3, start);

        assert!(!gate.should_send(3, start + Duration::from_millis(500)));
        assert!(!gate.should_send(3, start + RESEND));
        assert!(gate.should_send(3, start + RESEND + Duration::from_millis(1)));
    }

    #[test]
    fn changed_count_sends_immediately() {
        let start = Instant::now();
        let mut gate = CadenceGate::new(RESEND);
        gate.record(3, start);
        assert!(gate.should_send(4, start));
    }

    #[test]
    fn reset_reopens_the_gate() {
        let start = Instant::now();
        let mut gate = CadenceGate::new(RESEND);
        gate.record(5, start);
        gate.reset();
        assert!(gate.should_send(5, start));
        assert_eq!(gate.last_sent_count(), None);
    }

    #[test]
    fn never_two_unchanged_sends_within_interval() {
        let start = Instant::now();
        let mut gate = CadenceGate::new(RESEND);
        let mut sent = Vec::new();
        for step in 0..100u64 {
            let now = start + Duration::from_millis(step * 100);
            let count = (step / 30) as u32;
            if gate.should_send(count, now) {
                gate.record(count, now);
                sent.push((count, now));
            }
        }

        for pair in sent.windows(2) {
            let ((a, at_a), (b, at_b)) = (pair[0], pair[1]);
            assert!(a != b || at_b - at_a > RESEND);
        }
        assert_eq!(sent.first().map(|(c, _)| *c), Some(0));
    }
}
