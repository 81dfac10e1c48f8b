//! Subscription management.
//!
//! Binding and problem mapping only; semantics live in
//! [`rill_core::subscription::SubscriptionService`]. The create handler
//! distinguishes first creation (201 + `Location` + `Content-Location`)
//! from the idempotent collision (200 + `Location`), both pointing at
//! `/subscriptions/{id}`.

use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use rill_core::registry::Client;
use rill_core::subscription::pagination::PaginationLinks;
use rill_core::subscription::stats::SubscriptionEventTypeStats;
use rill_core::subscription::{
    CreateOutcome, Subscription, SubscriptionBase, SubscriptionFilter,
};

use crate::problem::Problem;
use crate::state::AppState;

/// Header carrying the client identity.
pub const CLIENT_ID_HEADER: &str = "x-rill-client";

/// Header carrying the client's granted scopes, space-separated.
/// Absent means a trusted internal caller.
pub const CLIENT_SCOPES_HEADER: &str = "x-rill-scopes";

/// Default page size for listing.
const DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
struct SubscriptionList {
    items: Vec<Subscription>,
    #[serde(rename = "_links")]
    links: PaginationLinks,
}

#[derive(Debug, Serialize)]
struct ItemsWrapper<T> {
    items: Vec<T>,
}

/// Resolves the request principal from identity headers.
///
/// Authentication itself happens upstream; by the time a request is
/// here, the headers are trusted.
fn client_from_headers(headers: &HeaderMap) -> Client {
    let client_id = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("adminClient");
    match headers.get(CLIENT_SCOPES_HEADER).and_then(|v| v.to_str().ok()) {
        Some(scopes) => Client::new(client_id, scopes.split_whitespace()),
        None => Client::trusted(client_id),
    }
}

/// `POST /subscriptions`
pub async fn create_or_get_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(base): Json<SubscriptionBase>,
) -> Response {
    let client = client_from_headers(&headers);
    match state.subscriptions.create_or_get(base, &client).await {
        Ok(CreateOutcome::Created(subscription)) => {
            let location = format!("/subscriptions/{}", subscription.id);
            (
                StatusCode::CREATED,
                [
                    (header::LOCATION, location.clone()),
                    (header::CONTENT_LOCATION, location),
                ],
                Json(subscription),
            )
                .into_response()
        }
        Ok(CreateOutcome::Existing(subscription)) => {
            let location = format!("/subscriptions/{}", subscription.id);
            (
                StatusCode::OK,
                [(header::LOCATION, location)],
                Json(subscription),
            )
                .into_response()
        }
        Err(e) => Problem::from(e).into_response(),
    }
}

/// `GET /subscriptions`
///
/// `limit` and `offset` are parsed signed so out-of-range values get
/// their contractual messages instead of a generic deserialization
/// failure.
#[allow(clippy::cast_sign_loss)] // both bounds checked before the cast
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let mut owning_application: Option<String> = None;
    let mut event_types: BTreeSet<String> = BTreeSet::new();
    let mut limit: i64 = DEFAULT_LIMIT;
    let mut offset: i64 = 0;

    for (key, value) in params {
        match key.as_str() {
            "owning_application" => owning_application = Some(value),
            "event_type" => {
                event_types.insert(value);
            }
            "limit" => match value.parse() {
                Ok(parsed) => limit = parsed,
                Err(_) => {
                    return Problem::bad_request(
                        "'limit' parameter should have value from 1 to 1000",
                    )
                    .into_response()
                }
            },
            "offset" => match value.parse() {
                Ok(parsed) => offset = parsed,
                Err(_) => {
                    return Problem::bad_request("'offset' parameter can't be lower than 0")
                        .into_response()
                }
            },
            _ => {}
        }
    }

    if !(1..=1000).contains(&limit) {
        return Problem::bad_request("'limit' parameter should have value from 1 to 1000")
            .into_response();
    }
    if offset < 0 {
        return Problem::bad_request("'offset' parameter can't be lower than 0").into_response();
    }

    let filter = SubscriptionFilter {
        owning_application,
        event_types,
    };
    match state
        .subscriptions
        .list(filter, offset as usize, limit as usize)
        .await
    {
        Ok((items, links)) => Json(SubscriptionList { items, links }).into_response(),
        Err(e) => Problem::from(e).into_response(),
    }
}

/// `GET /subscriptions/{id}`
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.subscriptions.get(&id).await {
        Ok(subscription) => Json(subscription).into_response(),
        Err(e) => Problem::from(e).into_response(),
    }
}

/// `GET /subscriptions/{id}/stats`
pub async fn get_subscription_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.subscriptions.stats(&id).await {
        Ok(items) => Json(ItemsWrapper::<SubscriptionEventTypeStats> { items }).into_response(),
        Err(e) => Problem::from(e).into_response(),
    }
}
