//! Reconnect backoff.

use std::time::Duration;

use super::timer::Timer;

/// Reconnect bookkeeping: consecutive failures and the pending retry.
#[derive(Default)]
pub(crate) struct ReconnectState {
    pub attempts: u32,
    pub pending: Option<Timer>,
}

impl ReconnectState {
    /// Forget failures and cancel any pending retry.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.pending = None;
    }
}

/// Delay before reconnect attempt number `attempt`: `base * 2^attempt`, capped at `max`.
pub fn reconnect_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(1000);
    const MAX: Duration = Duration::from_millis(30_000);

    #[test]
    fn test_delay_doubles_per_attempt() {
        assert_eq!(reconnect_delay(1, BASE, MAX), Duration::from_millis(2000));
        assert_eq!(reconnect_delay(2, BASE, MAX), Duration::from_millis(4000));
        assert_eq!(reconnect_delay(3, BASE, MAX), Duration::from_millis(8000));
        assert_eq!(reconnect_delay(4, BASE, MAX), Duration::from_millis(16_000));
    }

    #[test]
    fn test_delay_is_capped() {
        assert_eq!(reconnect_delay(5, BASE, MAX), MAX);
        assert_eq!(reconnect_delay(6, BASE, MAX), MAX);
    }

    #[test]
    fn test_delay_does_not_overflow() {
        assert_eq!(reconnect_delay(40, BASE, MAX), MAX);
        assert_eq!(reconnect_delay(u32::MAX, BASE, MAX), MAX);
    }

    #[test]
    fn test_zero_attempts_is_base() {
        assert_eq!(reconnect_delay(0, BASE, MAX), BASE);
    }
}
