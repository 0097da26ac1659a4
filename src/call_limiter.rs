//! Call limiter for periodic jobs
//!
//! Wraps an action so it runs at most once per interval. There is no timer
//! thread: the owner polls [`CallLimiter::call`] more often than the interval.

use std::time::{Duration, Instant};

pub struct CallLimiter<F> {
    action: F,
    interval: Duration,
    next_call: Instant,
}

impl<F: FnMut()> CallLimiter<F> {
    /// Create a limiter. With `delay_first_call` the first real call happens
    /// one interval from now instead of on the first poll.
    pub fn new(action: F, interval: Duration, delay_first_call: bool) -> Self {
        Self::starting_at(action, interval, delay_first_call, Instant::now())
    }

    pub fn starting_at(action: F, interval: Duration, delay_first_call: bool, now: Instant) -> Self {
        let next_call = if delay_first_call { now + interval } else { now };
        Self { action, interval, next_call }
    }

    /// Run the action if the interval has passed. Returns whether it ran.
    pub fn call(&mut self) -> bool {
        self.call_at(Instant::now())
    }

    pub fn call_at(&mut self, now: Instant) -> bool {
        if self.next_call > now {
            return false;
        }

        // skip whole missed periods, a stall must not cause a burst
        if self.interval.is_zero() {
            self.next_call = now;
        } else {
            while self.next_call <= now {
                self.next_call += self.interval;
            }
        }

        (self.action)();
        true
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
