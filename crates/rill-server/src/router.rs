//! Router assembly.
//!
//! ```text
//! POST /subscriptions              create-or-get
//! GET  /subscriptions              list (paginated)
//! GET  /subscriptions/{id}         fetch one
//! GET  /subscriptions/{id}/stats   live per-event-type lag
//! GET  /event-types/{name}/events  raw consumption stream
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::streaming::stream_events;
use crate::handlers::subscriptions::{
    create_or_get_subscription, get_subscription, get_subscription_stats, list_subscriptions,
};
use crate::state::AppState;

/// Builds the complete router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/subscriptions",
            post(create_or_get_subscription).get(list_subscriptions),
        )
        .route("/subscriptions/{id}", get(get_subscription))
        .route("/subscriptions/{id}/stats", get(get_subscription_stats))
        .route("/event-types/{name}/events", get(stream_events))
        .with_state(state)
}
