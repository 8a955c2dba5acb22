//! HTTP "middleware" applying per-client quotas before a handler runs.

use std::net::IpAddr;

use tracing::debug;

use crate::sys_core::error::ApiError;
use crate::sys_ratelimit::core::{self, Endpoint, RateLimiter};

/// Returns `Ok(())` when the request may proceed, otherwise the 429 error to
/// send back.
pub fn guard(limiter: &RateLimiter, endpoint: Endpoint, client: IpAddr) -> Result<(), ApiError> {
    limiter.check(endpoint, client).map_err(|exceeded| {
        debug!(?endpoint, %client, limit = exceeded.limit, "rate limit exceeded");
        ApiError::RateLimited {
            quota: core::describe(exceeded.limit, exceeded.window),
            retry_after_secs: exceeded.retry_after.as_secs().max(1),
        }
    })
}
