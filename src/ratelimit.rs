//! Outbound token-bucket rate limiting (spec.md §4.5/§5).
//!
//! Each session owns one [`RateLimiter`] gating everything it writes to the
//! wire: capacity `C` tokens, refilled continuously at `R` tokens/second up
//! to `C`. Callers queue for a ticket on arrival and are served strictly in
//! that order — a burst of callers never lets a later arrival jump ahead of
//! an earlier one just because it happened to be polled first — and a
//! caller that cancels while waiting is removed from the queue so it
//! doesn't block the caller behind it.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;

struct State {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    queue: VecDeque<u64>,
    next_ticket: u64,
}

/// A token-bucket rate limiter with strict FIFO admission order.
pub struct RateLimiter {
    state: Mutex<State>,
    notify: Notify,
}

impl RateLimiter {
    /// Construct a limiter holding up to `capacity` tokens, refilling at
    /// `refill_per_sec` tokens per second. The bucket starts full.
    #[must_use]
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity);
        Self {
            state: Mutex::new(State {
                tokens: capacity,
                capacity,
                refill_per_sec,
                last_refill: Instant::now(),
                queue: VecDeque::new(),
                next_ticket: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Block until a single token is available, then consume it.
    ///
    /// Resolves with [`SessionError::Cancelled`] if `cancel` fires before a
    /// token becomes available; the caller's queue position is released so
    /// later arrivals aren't blocked behind an abandoned wait.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let ticket = {
            let mut state = self.state.lock().unwrap();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.queue.push_back(ticket);
            ticket
        };

        loop {
            let wait = {
                let mut state = self.state.lock().unwrap();
                refill(&mut state);
                if state.queue.front().copied() == Some(ticket) && state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    state.queue.pop_front();
                    drop(state);
                    self.notify.notify_waiters();
                    return Ok(());
                }
                time_until_next_token(&state)
            };

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = self.notify.notified() => {}
                () = cancel.cancelled() => {
                    let mut state = self.state.lock().unwrap();
                    state.queue.retain(|&t| t != ticket);
                    drop(state);
                    self.notify.notify_waiters();
                    return Err(SessionError::Cancelled);
                }
            }
        }
    }

    /// Consume a token only if one is immediately available, without
    /// waiting or taking a queue position.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        refill(&mut state);
        if state.queue.is_empty() && state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after applying any pending refill.
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap();
        refill(&mut state);
        state.tokens
    }
}

fn refill(state: &mut State) {
    let now = Instant::now();
    let elapsed = now.duration_since(state.last_refill).as_secs_f64();
    state.tokens = (state.tokens + elapsed * state.refill_per_sec).min(state.capacity);
    state.last_refill = now;
}

fn time_until_next_token(state: &State) -> Duration {
    if state.refill_per_sec <= 0.0 {
        return Duration::from_secs(3600);
    }
    let deficit = (1.0 - state.tokens).max(0.0);
    Duration::from_secs_f64((deficit / state.refill_per_sec).max(0.001))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn acquires_immediately_when_tokens_available() {
        let limiter = RateLimiter::new(3, 1.0);
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();
    }

    #[tokio::test]
    async fn try_acquire_fails_once_bucket_is_empty() {
        let limiter = RateLimiter::new(1, 0.0);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn cancelled_token_aborts_the_wait() {
        let limiter = RateLimiter::new(0, 0.0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = limiter.acquire(&cancel).await;
        assert!(matches!(result, Err(SessionError::Cancelled)));
    }

    #[tokio::test]
    async fn serves_concurrent_waiters_in_arrival_order() {
        let limiter = Arc::new(RateLimiter::new(1, 0.0));
        let cancel = CancellationToken::new();
        assert!(limiter.try_acquire());

        let order = Arc::new(Mutex::new(Vec::new()));

        let limiter_a = limiter.clone();
        let cancel_a = cancel.clone();
        let order_a = order.clone();
        let task_a = tokio::spawn(async move {
            limiter_a.acquire(&cancel_a).await.unwrap();
            order_a.lock().unwrap().push('a');
        });

        tokio::task::yield_now().await;

        let limiter_b = limiter.clone();
        let cancel_b = cancel.clone();
        let order_b = order.clone();
        let task_b = tokio::spawn(async move {
            limiter_b.acquire(&cancel_b).await.unwrap();
            order_b.lock().unwrap().push('b');
        });

        // Refill one token so exactly one of the two waiters can proceed.
        {
            let mut state = limiter.state.lock().unwrap();
            state.tokens = 1.0;
        }
        limiter.notify.notify_waiters();

        tokio::time::sleep(Duration::from_millis(20)).await;

        // Refill again to let the second waiter through.
        {
            let mut state = limiter.state.lock().unwrap();
            state.tokens = 1.0;
        }
        limiter.notify.notify_waiters();

        task_a.await.unwrap();
        task_b.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!['a', 'b']);
    }

    #[tokio::test]
    async fn refills_over_time() {
        let limiter = RateLimiter::new(1, 1000.0);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(limiter.available() >= 1.0);
    }
}
