//! In-process fixed-window rate limiting.
//!
//! Requests are counted per authenticated user, or per client IP for
//! anonymous callers. Sign-in and sign-up draw from a separate, stricter
//! budget. Forwarded-for headers are only believed when the connection
//! comes from a configured trusted proxy.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use agrex_common::AppError;
use agrex_db::entities::user;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a new rate limit config.
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// General API traffic.
pub const STANDARD: RateLimitConfig = RateLimitConfig::new(300, 60);

/// Sign-in and sign-up.
pub const AUTH: RateLimitConfig = RateLimitConfig::new(10, 300);

/// Tracked keys above which expired windows are swept.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request admitted.
    Allowed {
        /// Requests left in the current window.
        remaining: u32,
    },
    /// Budget exhausted for the current window.
    Limited {
        /// Time until the window resets.
        retry_after: Duration,
    },
}

/// Fixed-window counter keyed by caller.
#[derive(Clone)]
pub struct ApiRateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl ApiRateLimiter {
    /// Create a limiter with its own budget.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The budget this limiter enforces.
    #[must_use]
    pub const fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Count a request for `key`.
    pub async fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> Decision {
        let window_len = self.config.window;
        let mut windows = self.windows.lock().await;

        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, w| now.saturating_duration_since(w.started) < window_len);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(window.started) >= window_len {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count >= self.config.max_requests {
            let elapsed = now.saturating_duration_since(window.started);
            return Decision::Limited {
                retry_after: window_len.saturating_sub(elapsed),
            };
        }

        window.count += 1;
        Decision::Allowed {
            remaining: self.config.max_requests - window.count,
        }
    }

    /// Number of callers currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

/// Limiters shared by the middleware.
#[derive(Clone)]
pub struct RateLimiterState {
    /// Budget for ordinary API calls.
    pub api: ApiRateLimiter,
    /// Budget for sign-in and sign-up.
    pub auth: ApiRateLimiter,
    trusted_proxies: Arc<[IpAddr]>,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(STANDARD, AUTH)
    }
}

impl RateLimiterState {
    /// Create limiters with explicit budgets.
    #[must_use]
    pub fn new(api: RateLimitConfig, auth: RateLimitConfig) -> Self {
        Self {
            api: ApiRateLimiter::new(api),
            auth: ApiRateLimiter::new(auth),
            trusted_proxies: Arc::from([]),
        }
    }

    /// Believe forwarded client IPs from these peers.
    #[must_use]
    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = proxies.into();
        self
    }

    fn for_path(&self, path: &str) -> &ApiRateLimiter {
        if path.ends_with("/signin") || path.ends_with("/signup") {
            &self.auth
        } else {
            &self.api
        }
    }
}

fn forwarded_ip(req: &Request<Body>) -> Option<IpAddr> {
    let headers = req.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
        })
}

/// Key identifying the caller.
fn caller_key(req: &Request<Body>, trusted_proxies: &[IpAddr]) -> String {
    if let Some(user) = req.extensions().get::<user::Model>() {
        return format!("user:{}", user.id);
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let client = match peer {
        Some(ip) if trusted_proxies.contains(&ip) => forwarded_ip(req).or(peer),
        _ => peer,
    };

    client.map_or_else(|| "anonymous".to_string(), |ip| format!("ip:{ip}"))
}

/// Rate limiting middleware.
///
/// Must run after [`auth_middleware`](crate::middleware::auth_middleware) so
/// that signed-in callers are keyed by user.
pub async fn rate_limit_middleware(
    State(limits): State<RateLimiterState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let limiter = limits.for_path(req.uri().path()).clone();
    let key = caller_key(&req, &limits.trusted_proxies);

    match limiter.check(&key).await {
        Decision::Allowed { remaining } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert(
                "x-ratelimit-limit",
                HeaderValue::from(limiter.config().max_requests),
            );
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            tracing::debug!(key = %key, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
            let mut response = AppError::RateLimited.into_response();
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs().max(1)),
            );
            response
        }
    }
}
