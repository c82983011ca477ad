//! Debounced input tracking.
//!
//! A [`Debouncer`] holds at most one pending value. Every [`Debouncer::push`]
//! replaces the pending value and moves its deadline to `now + delay`, so the
//! value only becomes ready once input has been quiet for the whole delay.
//! Dropping the debouncer drops the pending value with it; nothing is emitted.
//!
//! Time comes from `tokio::time`, which lets tests drive it with a paused
//! clock.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `value`, cancelling whatever was pending before it.
    pub fn push(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.delay));
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    pub fn take_ready(&mut self, now: Instant) -> Option<T> {
        match self.pending.as_ref() {
            Some((_, at)) if *at <= now => self.cancel(),
            _ => None,
        }
    }

    /// Wait for the pending value to become ready and take it.
    ///
    /// Never resolves while nothing is pending. Cancel safe: the value is
    /// only taken after the deadline has passed, so dropping this future
    /// inside a `select!` loses nothing.
    pub async fn ready(&mut self) -> T {
        loop {
            let deadline = match self.deadline() {
                Some(deadline) => deadline,
                None => std::future::pending::<Instant>().await,
            };
            sleep_until(deadline).await;
            if let Some(value) = self.take_ready(Instant::now()) {
                return value;
            }
        }
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
