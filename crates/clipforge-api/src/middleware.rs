//! API middleware: per-principal rate limiting and CORS.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::ApiError;
use crate::principal::PRINCIPAL_HEADER;

/// Per-caller rate limiter.
pub type CallerRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Cap on tracked callers so the cache cannot grow without bound.
const MAX_RATE_LIMITER_ENTRIES: usize = 10_000;

/// Cache of per-principal rate limiters with TTL cleanup.
#[derive(Clone)]
pub struct RateLimiterCache {
    limiters: Arc<RwLock<HashMap<String, (Arc<CallerRateLimiter>, Instant)>>>,
    quota: Quota,
    ttl: std::time::Duration,
}

impl RateLimiterCache {
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second.max(1)).unwrap();
        let burst = NonZeroU32::new(burst.max(1)).unwrap();
        Self {
            limiters: Arc::new(RwLock::new(HashMap::new())),
            quota: Quota::per_second(rps).allow_burst(burst),
            ttl: std::time::Duration::from_secs(3600),
        }
    }

    async fn cleanup_expired(&self) {
        let mut limiters = self.limiters.write().await;
        let now = Instant::now();
        limiters.retain(|_, (_, created)| now.duration_since(*created) < self.ttl);

        if limiters.len() > MAX_RATE_LIMITER_ENTRIES {
            let mut entries: Vec<_> = limiters.iter().map(|(k, (_, t))| (k.clone(), *t)).collect();
            entries.sort_by_key(|(_, t)| *t);
            let to_remove = limiters.len() - MAX_RATE_LIMITER_ENTRIES;
            for (key, _) in entries.into_iter().take(to_remove) {
                limiters.remove(&key);
            }
            warn!("Rate limiter cache over capacity, removed {} entries", to_remove);
        }
    }

    async fn get_limiter(&self, caller: &str) -> Arc<CallerRateLimiter> {
        {
            let limiters = self.limiters.read().await;
            if let Some((limiter, _)) = limiters.get(caller) {
                return Arc::clone(limiter);
            }
        }

        let mut limiters = self.limiters.write().await;
        if let Some((limiter, _)) = limiters.get(caller) {
            return Arc::clone(limiter);
        }
        if limiters.len() >= MAX_RATE_LIMITER_ENTRIES {
            drop(limiters);
            self.cleanup_expired().await;
            limiters = self.limiters.write().await;
        }
        let limiter = Arc::new(RateLimiter::direct(self.quota));
        limiters.insert(caller.to_string(), (Arc::clone(&limiter), Instant::now()));
        limiter
    }

    pub async fn check(&self, caller: &str) -> bool {
        self.get_limiter(caller).await.check().is_ok()
    }
}

/// Rate-limit middleware keyed by principal (anonymous traffic shares
/// one bucket and hits the auth wall right after anyway).
pub async fn rate_limit_middleware(
    State(cache): State<Arc<RateLimiterCache>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let caller = request
        .headers()
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string();

    if !cache.check(&caller).await {
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

/// Create the CORS layer.
pub fn cors_layer(origins: &[String]) -> tower_http::cors::CorsLayer {
    use axum::http::{header, Method};
    use tower_http::cors::{Any, CorsLayer};

    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let headers = [header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT];

    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any)
    } else {
        let origins: Vec<_> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_origin(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limiter_allows_burst_then_throttles() {
        let cache = RateLimiterCache::new(1, 2);
        assert!(cache.check("user-1").await);
        assert!(cache.check("user-1").await);
        assert!(!cache.check("user-1").await);
        // Separate caller has a separate bucket.
        assert!(cache.check("user-2").await);
    }
}
