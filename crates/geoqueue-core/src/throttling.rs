use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::trace;

use crate::http_client::{redacted_url, HttpClient, HttpRequest, RequestFuture};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Transport wrapper that waits for rate budget before forwarding a request.
///
/// Free providers such as Nominatim publish hard per-second limits; every
/// adapter sharing one `ThrottledHttpClient` shares its budget.
#[derive(Clone)]
pub struct ThrottledHttpClient {
    inner: Arc<dyn HttpClient>,
    limiter: Arc<DirectRateLimiter>,
}

impl ThrottledHttpClient {
    pub fn per_second(inner: Arc<dyn HttpClient>, requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        }
    }

    /// Takes one unit of budget if available; `false` means a request sent now would wait.
    pub fn has_budget(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl HttpClient for ThrottledHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> RequestFuture<'a> {
        Box::pin(async move {
            self.limiter.until_ready().await;
            trace!(url = %redacted_url(&request.url), "rate budget acquired");
            self.inner.execute(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::ReplayHttpClient;

    #[tokio::test]
    async fn forwards_requests_to_inner_transport() {
        let inner = Arc::new(ReplayHttpClient::new().route_json("https://nominatim.test/", "[]"));
        let throttled = ThrottledHttpClient::per_second(inner.clone(), 5);

        let response = throttled
            .execute(HttpRequest::get("https://nominatim.test/search"))
            .await
            .expect("request should be forwarded");

        assert!(response.is_success());
        assert_eq!(inner.request_count(), 1);
    }

    #[test]
    fn budget_is_spent_by_checks() {
        let inner = Arc::new(ReplayHttpClient::new());
        let throttled = ThrottledHttpClient::per_second(inner, 1);

        assert!(throttled.has_budget());
        assert!(!throttled.has_budget());
    }
}
