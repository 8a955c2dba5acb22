//! Fixed-window request counters keyed by endpoint and client address.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::sys_config::RateLimitConfig;

/// Above this many tracked windows, expired ones are pruned on insert.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Upload,
    List,
    Fetch,
    DeleteAll,
}

impl Endpoint {
    fn limit(self, cfg: &RateLimitConfig) -> u32 {
        match self {
            Endpoint::Upload => cfg.upload,
            Endpoint::List => cfg.list,
            Endpoint::Fetch => cfg.fetch,
            Endpoint::DeleteAll => cfg.delete_all,
        }
    }
}

/// Details of a rejected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exceeded {
    pub limit: u32,
    pub window: Duration,
    pub retry_after: Duration,
}

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(Endpoint, IpAddr), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, endpoint: Endpoint, client: IpAddr) -> Result<(), Exceeded> {
        self.check_at(endpoint, client, Instant::now())
    }

    /// Count one request at `now`. Rejected requests are not counted.
    pub fn check_at(&self, endpoint: Endpoint, client: IpAddr, now: Instant) -> Result<(), Exceeded> {
        let limit = endpoint.limit(&self.config);
        if limit == 0 {
            return Ok(());
        }
        let window = self.config.window();

        let mut windows = self.windows.lock();
        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry((endpoint, client)).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.duration_since(entry.started);
        if elapsed >= window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= limit {
            return Err(Exceeded {
                limit,
                window,
                retry_after: window.saturating_sub(now.duration_since(entry.started)),
            });
        }
        entry.count += 1;
        Ok(())
    }
}

/// Human form of a quota, e.g. `5 per 1 minute`.
pub fn describe(limit: u32, window: Duration) -> String {
    let secs = window.as_secs();
    if secs % 3600 == 0 {
        format!("{limit} per {} hour", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{limit} per {} minute", secs / 60)
    } else {
        format!("{limit} per {secs} second")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const A: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const B: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let rl = limiter();
        let t0 = Instant::now();
        for _ in 0..5 {
            rl.check_at(Endpoint::Upload, A, t0).unwrap();
        }
        let err = rl
            .check_at(Endpoint::Upload, A, t0 + Duration::from_secs(20))
            .unwrap_err();
        assert_eq!(err.limit, 5);
        assert_eq!(err.retry_after, Duration::from_secs(40));
    }

    #[test]
    fn window_resets() {
        let rl = limiter();
        let t0 = Instant::now();
        for _ in 0..2 {
            rl.check_at(Endpoint::DeleteAll, A, t0).unwrap();
        }
        assert!(rl.check_at(Endpoint::DeleteAll, A, t0).is_err());
        rl.check_at(Endpoint::DeleteAll, A, t0 + Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn keys_are_per_client_and_endpoint() {
        let rl = limiter();
        let t0 = Instant::now();
        for _ in 0..2 {
            rl.check_at(Endpoint::DeleteAll, A, t0).unwrap();
        }
        assert!(rl.check_at(Endpoint::DeleteAll, A, t0).is_err());
        rl.check_at(Endpoint::DeleteAll, B, t0).unwrap();
        rl.check_at(Endpoint::List, A, t0).unwrap();
    }

    #[test]
    fn zero_disables() {
        let rl = RateLimiter::new(RateLimitConfig {
            upload: 0,
            ..RateLimitConfig::default()
        });
        let t0 = Instant::now();
        for _ in 0..100 {
            rl.check_at(Endpoint::Upload, A, t0).unwrap();
        }
    }

    #[test]
    fn describes_quota() {
        assert_eq!(describe(5, Duration::from_secs(60)), "5 per 1 minute");
        assert_eq!(describe(3, Duration::from_secs(7200)), "3 per 2 hour");
        assert_eq!(describe(1, Duration::from_secs(45)), "1 per 45 second");
    }
}
