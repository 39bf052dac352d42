pub mod api;
pub mod media_stream;

use axum::Router;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tracing::{info, warn};

use crate::state::AppState;

/// Rates at or above this are treated as unlimited
const RATE_LIMIT_DISABLED_AT: u32 = 100_000;

/// Public routes plus the media stream route.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// media stream handler limits connections by peer address.
pub fn create_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(media_stream::create_media_stream_router())
        .with_state(state)
}

/// Wrap `router` in a per-client token bucket refilled at
/// `requests_per_second` with room for `burst_size` back-to-back requests.
///
/// A rate of 0 or at least 100000 leaves the router unlimited.
pub fn apply_rate_limit(router: Router, requests_per_second: u32, burst_size: u32) -> Router {
    if requests_per_second == 0 || requests_per_second >= RATE_LIMIT_DISABLED_AT {
        info!(requests_per_second, "Rate limiting disabled");
        return router;
    }

    // The builder takes the refill period of a single token
    let replenish_ms = (1000 / u64::from(requests_per_second)).max(1);
    let Some(config) = GovernorConfigBuilder::default()
        .per_millisecond(replenish_ms)
        .burst_size(burst_size.max(1))
        .key_extractor(SmartIpKeyExtractor)
        .finish()
    else {
        warn!(
            requests_per_second,
            burst_size, "Invalid rate limit settings, rate limiting disabled"
        );
        return router;
    };

    info!(requests_per_second, burst_size, "Rate limiting enabled");
    router.layer(GovernorLayer::new(config))
}
