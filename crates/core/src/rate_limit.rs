//! Sliding-log request admission.
//!
//! Every admitted request leaves its timestamp in a per-identity queue. A new
//! request is admitted while fewer than `max_requests` timestamps remain
//! inside the trailing window. Expired timestamps are pruned from the front of
//! the queue whenever the identity is touched.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock. Adjustments to system time can briefly under- or over-admit.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn at_unix(seconds: i64) -> Self {
        Self::new(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-identity sliding-log limiter.
///
/// Identities live in a sharded map, so prune-then-append for one identity is
/// atomic while unrelated identities rarely contend.
pub struct RateLimiter {
    max_requests: u32,
    window_seconds: u64,
    window: Duration,
    requests: DashMap<String, VecDeque<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self::with_clock(max_requests, window_seconds, Arc::new(SystemClock))
    }

    pub fn with_clock(max_requests: u32, window_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        let window = i64::try_from(window_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        Self { max_requests, window_seconds, window, requests: DashMap::new(), clock }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    /// Admits the request and records it, or denies it without recording.
    pub fn is_allowed(&self, identity: &str) -> bool {
        let now = self.clock.now();
        let mut history = self.requests.entry(identity.to_owned()).or_default();
        prune_expired(&mut history, self.cutoff(now));

        if history.len() < self.max_requests as usize {
            history.push_back(now);
            true
        } else {
            false
        }
    }

    /// Slots left in the current window. Prunes expired entries as a side effect.
    pub fn remaining_requests(&self, identity: &str) -> u32 {
        let now = self.clock.now();
        let mut history = self.requests.entry(identity.to_owned()).or_default();
        prune_expired(&mut history, self.cutoff(now));

        let used = u32::try_from(history.len()).unwrap_or(u32::MAX);
        self.max_requests.saturating_sub(used)
    }

    /// Instant at which the oldest stored request ages out.
    ///
    /// Reads the raw head of the log without pruning, so an entry that expired
    /// since the last admission check yields an instant in the past.
    pub fn reset_time(&self, identity: &str) -> DateTime<Utc> {
        let oldest = self.requests.get(identity).and_then(|history| history.front().copied());

        match oldest {
            Some(oldest) => oldest.checked_add_signed(self.window).unwrap_or(DateTime::<Utc>::MAX_UTC),
            None => self.clock.now(),
        }
    }

    pub fn clear(&self, identity: &str) {
        self.requests.remove(identity);
    }

    pub fn clear_all(&self) {
        self.requests.clear();
    }

    pub fn tracked_identities(&self) -> usize {
        self.requests.len()
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window_seconds", &self.window_seconds)
            .field("tracked_identities", &self.requests.len())
            .finish()
    }
}

fn prune_expired(history: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    while history.front().is_some_and(|oldest| *oldest <= cutoff) {
        history.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::{Clock, ManualClock, RateLimiter};

    const START: i64 = 1_700_000_000;

    fn limiter(max_requests: u32, window_seconds: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(START));
        (RateLimiter::with_clock(max_requests, window_seconds, clock.clone()), clock)
    }

    #[test]
    fn admits_until_limit_then_recovers_after_window() {
        let (limiter, clock) = limiter(2, 60);

        assert!(limiter.is_allowed("U1"));
        clock.advance(Duration::seconds(1));
        assert!(limiter.is_allowed("U1"));
        clock.advance(Duration::seconds(1));
        assert!(!limiter.is_allowed("U1"), "third request inside the window is denied");

        clock.set(ManualClock::at_unix(START + 61).now());
        assert!(limiter.is_allowed("U1"), "slots from t=0 and t=1 aged out at t=61");
        assert!(limiter.is_allowed("U1"));
        assert!(!limiter.is_allowed("U1"));
    }

    #[test]
    fn timestamp_exactly_on_window_edge_is_expired() {
        let (limiter, clock) = limiter(1, 60);

        assert!(limiter.is_allowed("U1"));
        clock.advance(Duration::seconds(60));
        assert!(limiter.is_allowed("U1"));
    }

    #[test]
    fn zero_capacity_denies_everything() {
        let (limiter, clock) = limiter(0, 60);

        for identity in ["U1", "U2", ""] {
            assert!(!limiter.is_allowed(identity));
        }
        clock.advance(Duration::days(1));
        assert!(!limiter.is_allowed("U1"));
        assert_eq!(limiter.remaining_requests("U1"), 0);
    }

    #[test]
    fn remaining_starts_at_capacity_and_tracks_admissions_only() {
        let (limiter, _clock) = limiter(3, 60);
        assert_eq!(limiter.remaining_requests("U1"), 3);

        assert!(limiter.is_allowed("U1"));
        assert_eq!(limiter.remaining_requests("U1"), 2);
        assert!(limiter.is_allowed("U1"));
        assert!(limiter.is_allowed("U1"));
        assert_eq!(limiter.remaining_requests("U1"), 0);

        assert!(!limiter.is_allowed("U1"));
        assert_eq!(limiter.remaining_requests("U1"), 0, "denials do not consume slots");
    }

    #[test]
    fn remaining_prunes_expired_entries() {
        let (limiter, clock) = limiter(2, 10);
        assert!(limiter.is_allowed("U1"));
        assert!(limiter.is_allowed("U1"));

        clock.advance(Duration::seconds(11));
        assert_eq!(limiter.remaining_requests("U1"), 2);
        assert_eq!(limiter.reset_time("U1"), clock.now(), "pruned log behaves like a fresh one");
    }

    #[test]
    fn reset_time_is_now_without_history_and_oldest_plus_window_with_history() {
        let (limiter, clock) = limiter(5, 60);
        assert_eq!(limiter.reset_time("U1"), clock.now());

        let first = clock.now();
        assert!(limiter.is_allowed("U1"));
        clock.advance(Duration::seconds(5));
        assert!(limiter.is_allowed("U1"));

        assert_eq!(limiter.reset_time("U1"), first + Duration::seconds(60));
    }

    #[test]
    fn reset_time_reads_raw_head_without_pruning() {
        let (limiter, clock) = limiter(5, 60);
        let first = clock.now();
        assert!(limiter.is_allowed("U1"));

        clock.advance(Duration::seconds(120));
        let reset = limiter.reset_time("U1");
        assert_eq!(reset, first + Duration::seconds(60));
        assert!(reset < clock.now(), "stale head yields an instant in the past");
    }

    #[test]
    fn clear_restores_capacity_for_one_identity() {
        let (limiter, _clock) = limiter(1, 60);
        assert!(limiter.is_allowed("U1"));
        assert!(limiter.is_allowed("U2"));

        limiter.clear("U1");
        limiter.clear("missing");
        assert_eq!(limiter.remaining_requests("U1"), 1);
        assert_eq!(limiter.remaining_requests("U2"), 0);
    }

    #[test]
    fn clear_all_drops_every_identity() {
        let (limiter, _clock) = limiter(1, 60);
        assert!(limiter.is_allowed("U1"));
        assert!(limiter.is_allowed("U2"));
        assert_eq!(limiter.tracked_identities(), 2);

        limiter.clear_all();
        assert_eq!(limiter.tracked_identities(), 0);
        assert!(limiter.is_allowed("U1"));
        assert!(limiter.is_allowed("U2"));
    }

    #[test]
    fn identities_are_isolated() {
        let (limiter, clock) = limiter(1, 60);
        assert!(limiter.is_allowed("U1"));
        let u1_reset = limiter.reset_time("U1");

        clock.advance(Duration::seconds(30));
        assert!(limiter.is_allowed("U2"));
        assert!(!limiter.is_allowed("U1"));

        assert_eq!(limiter.reset_time("U1"), u1_reset);
        assert_eq!(limiter.reset_time("U2"), clock.now() + Duration::seconds(60));
    }

    #[test]
    fn exposes_configuration() {
        let limiter = RateLimiter::new(10, 60);
        assert_eq!(limiter.max_requests(), 10);
        assert_eq!(limiter.window_seconds(), 60);
    }

    #[test]
    fn concurrent_callers_never_exceed_capacity() {
        let (limiter, _clock) = limiter(25, 60);
        let limiter = Arc::new(limiter);

        let handles = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..20).filter(|_| limiter.is_allowed("shared")).count())
            })
            .collect::<Vec<_>>();

        let admitted: usize =
            handles.into_iter().map(|handle| handle.join().expect("worker thread")).sum();
        assert_eq!(admitted, 25);
    }
}
