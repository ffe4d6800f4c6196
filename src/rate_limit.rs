use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, ResponseError};
use dashmap::DashMap;
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::error::ApiError;
use crate::routes::AppState;

const DEFAULT_MAX_KEYS: usize = 10_000;

/// Per-key sliding window of admission timestamps, local to this process.
/// Once more than `max_keys` keys are tracked, keys with no hit inside the
/// current window are dropped.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    hits: Arc<DashMap<String, VecDeque<Instant>>>,
    max_keys: usize,
    pub enabled: bool,
}

impl SlidingWindowLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { hits: Arc::new(DashMap::new()), max_keys: DEFAULT_MAX_KEYS, enabled }
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }

    /// Records a hit for `key` if fewer than `limit` fall inside `window`.
    pub fn try_acquire(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Instant::now();
        let admitted = {
            let mut recent = self.hits.entry(key.to_owned()).or_default();
            let expired = recent.iter().take_while(|t| now.duration_since(**t) >= window).count();
            recent.drain(..expired);
            let admitted = recent.len() < limit;
            if admitted {
                recent.push_back(now);
            }
            admitted
        };
        // shard guard above must be released before retain takes every shard
        if self.hits.len() > self.max_keys {
            self.prune(now, window);
        }
        admitted
    }

    fn prune(&self, now: Instant, window: Duration) {
        self.hits.retain(|_, recent| recent.back().is_some_and(|t| now.duration_since(*t) < window));
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub auth_limit: usize,
    pub auth_window: Duration,
    /// Key on the forwarded client address rather than the socket peer.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    /// 100 requests per 15 minutes, keyed on the socket peer.
    fn default() -> Self {
        Self { auth_limit: 100, auth_window: Duration::from_secs(15 * 60), trust_proxy: false }
    }
}

/// Admission control for the `/auth` route family.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub window: SlidingWindowLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(window: SlidingWindowLimiter, cfg: RateLimitConfig) -> Self {
        Self { window, cfg }
    }

    /// Client address the budget is charged to.
    pub fn client_key(&self, req: &ServiceRequest) -> String {
        let addr = if self.cfg.trust_proxy {
            req.connection_info().realip_remote_addr().map(str::to_owned)
        } else {
            req.peer_addr().map(|a| a.ip().to_string())
        };
        addr.unwrap_or_else(|| "unknown".into())
    }

    pub fn allow_auth(&self, ip: &str) -> bool {
        self.window.try_acquire(&format!("auth:{ip}"), self.cfg.auth_limit, self.cfg.auth_window)
    }
}

/// Middleware applying [`RateLimiterFacade::allow_auth`] per client address.
/// Pass-through when the app state carries no limiter.
#[derive(Clone, Default)]
pub struct AuthRateLimit;

impl<S, B> Transform<S, ServiceRequest> for AuthRateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthRateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthRateLimitMiddleware { service: Rc::new(service) }))
    }
}

pub struct AuthRateLimitMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthRateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let allowed = match req.app_data::<web::Data<AppState>>().and_then(|s| s.rate_limiter.clone()) {
            Some(rl) => rl.allow_auth(&rl.client_key(&req)),
            None => true,
        };
        if !allowed {
            metrics::increment_counter!("wanderlog_auth_rate_limited_total");
            tracing::warn!(path = req.path(), "auth rate limit exceeded");
            let res = req.into_response(ApiError::RateLimited.error_response());
            return Box::pin(async move { Ok(res.map_into_right_body()) });
        }
        let svc = self.service.clone();
        Box::pin(async move { Ok(svc.call(req).await?.map_into_left_body()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_window_basic() {
        let rl = SlidingWindowLimiter::new(true);
        let window = Duration::from_millis(50);
        for _ in 0..3 {
            assert!(rl.try_acquire("k", 3, window));
        }
        assert!(!rl.try_acquire("k", 3, window));
        std::thread::sleep(Duration::from_millis(60));
        assert!(rl.try_acquire("k", 3, window));
    }

    #[test]
    fn auth_budget_is_per_address() {
        let facade = RateLimiterFacade::new(
            SlidingWindowLimiter::new(true),
            RateLimitConfig { auth_limit: 2, auth_window: Duration::from_secs(60), ..Default::default() },
        );
        assert!(facade.allow_auth("1.1.1.1"));
        assert!(facade.allow_auth("1.1.1.1"));
        assert!(!facade.allow_auth("1.1.1.1"));
        assert!(facade.allow_auth("2.2.2.2"));
    }

    #[test]
    fn idle_keys_are_pruned_past_the_cap() {
        let rl = SlidingWindowLimiter::new(true).with_max_keys(2);
        let window = Duration::from_millis(30);
        assert!(rl.try_acquire("a", 5, window));
        assert!(rl.try_acquire("b", 5, window));
        assert_eq!(rl.tracked_keys(), 2);
        std::thread::sleep(Duration::from_millis(40));
        assert!(rl.try_acquire("c", 5, window));
        assert_eq!(rl.tracked_keys(), 1);
    }

    #[test]
    fn live_keys_survive_pruning() {
        let rl = SlidingWindowLimiter::new(true).with_max_keys(1);
        let window = Duration::from_secs(60);
        assert!(rl.try_acquire("a", 1, window));
        assert!(rl.try_acquire("b", 1, window));
        assert!(!rl.try_acquire("a", 1, window));
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let rl = SlidingWindowLimiter::new(false);
        for _ in 0..10 {
            assert!(rl.try_acquire("k", 1, Duration::from_secs(60)));
        }
    }
}
