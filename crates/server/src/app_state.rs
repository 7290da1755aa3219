use server_api::ApiContext;

use crate::rate_limit::{RateLimitConfig, RateLimiter};

pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) limiter: RateLimiter,
    pub(crate) rate_limit: RateLimitConfig,
}

impl AppState {
    pub(crate) fn new(api: ApiContext, rate_limit: RateLimitConfig) -> Self {
        Self {
            api,
            limiter: RateLimiter::default(),
            rate_limit,
        }
    }
}
