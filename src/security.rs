use std::{
    collections::HashMap,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderName, HeaderValue, Request},
    response::{IntoResponse, Response},
    Router,
};
use tower::{Layer, Service};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::warn;

use crate::{config::RateLimitConfig, error::AppError};

const UNKNOWN_CLIENT: &str = "unknown";
// Expired windows are swept once the table grows past this.
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u64,
}

/// Fixed-window request counter keyed by client IP.
pub struct IpRateLimiter {
    limit: u64,
    window: Duration,
    trust_proxy: bool,
    windows: Mutex<HashMap<String, Window>>,
}

impl IpRateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            limit: cfg.requests,
            window: Duration::from_secs(cfg.window_secs.max(1)),
            trust_proxy: cfg.trust_proxy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request for `ip`; false once the quota for the current
    /// window is used up.
    pub fn check(&self, ip: &str, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(ip.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;
        entry.count <= self.limit
    }
}

/// Peer address of the connection. With `trust_proxy` the first
/// `X-Forwarded-For` hop wins instead.
pub fn client_ip(req: &Request<Body>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<IpRateLimiter>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<IpRateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<IpRateLimiter>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let ip = client_ip(&request, self.limiter.trust_proxy);
        if !self.limiter.check(&ip, Instant::now()) {
            warn!(ip = %ip, "rate limit exceeded");
            return Box::pin(async { Ok(AppError::RateLimited.into_response()) });
        }
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(request).await })
    }
}

/// Adds the fixed security headers to every response.
pub fn with_security_headers(router: Router) -> Router {
    let headers: [(HeaderName, &'static str); 4] = [
        (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
        (
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=31536000; includeSubDomains",
        ),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    ];
    headers.into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::overriding(
            name,
            HeaderValue::from_static(value),
        ))
    })
}
