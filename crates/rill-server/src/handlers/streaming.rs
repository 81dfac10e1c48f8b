//! The raw consumption stream.
//!
//! `GET /event-types/{name}/events` answers with
//! `application/x-json-stream`: newline-delimited batch records
//! produced by the streaming engine. The engine runs as its own task
//! writing into a duplex pipe whose read half is the response body;
//! once the 200 and headers are on the wire, engine failures terminate
//! the body but never become HTTP errors.
//!
//! Starting positions come from the `X-Rill-Cursors` header (a JSON
//! array of `{"partition":..,"offset":..}`); without it the stream
//! starts at the beginning of every partition.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

use rill_core::cursor::{Cursor, EventCursor, BEGIN_OFFSET};
use rill_core::stream::{EventStream, StreamConfig};

use crate::problem::Problem;
use crate::state::AppState;

/// Header carrying the starting cursors.
pub const CURSORS_HEADER: &str = "x-rill-cursors";

/// Header declaring the consuming application.
pub const CONSUMING_APP_HEADER: &str = "x-rill-consuming-app";

const STREAM_CONTENT_TYPE: &str = "application/x-json-stream";
const SINK_BUFFER_BYTES: usize = 64 * 1024;

/// Stream shape parameters, all optional.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Events per batch record.
    pub batch_limit: Option<usize>,
    /// Seconds between flushes of a partition (heartbeat interval).
    pub batch_flush_timeout: Option<u64>,
    /// Total events after which the stream ends.
    pub stream_limit: Option<usize>,
    /// Wall-clock seconds after which the stream ends.
    pub stream_timeout: Option<u64>,
    /// Consecutive keep-alives per partition after which the stream
    /// ends.
    pub stream_keep_alive_limit: Option<usize>,
}

/// `GET /event-types/{name}/events`
pub async fn stream_events(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
) -> Response {
    let event_type = match state.event_types.find_by_name(&name).await {
        Ok(Some(event_type)) => event_type,
        Ok(None) => {
            return Problem::not_found(format!("event type '{name}' does not exist"))
                .into_response()
        }
        Err(e) => return Problem::from(rill_core::error::SubscriptionError::from(e)).into_response(),
    };

    let consuming_app = headers
        .get(CONSUMING_APP_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("adminClient")
        .to_string();

    let cursors = match parse_cursors(&headers, &name) {
        Ok(cursors) => cursors.unwrap_or_else(|| {
            event_type
                .partitions
                .iter()
                .map(|partition| EventCursor::new(&name, partition, BEGIN_OFFSET))
                .collect()
        }),
        Err(problem) => return problem.into_response(),
    };

    let mut builder = StreamConfig::builder(&name, &consuming_app).cursors(cursors.clone());
    if let Some(limit) = query.batch_limit {
        builder = builder.batch_limit(limit);
    }
    if let Some(seconds) = query.batch_flush_timeout {
        builder = builder.batch_timeout(Duration::from_secs(seconds));
    }
    if let Some(limit) = query.stream_limit {
        builder = builder.stream_limit(limit);
    }
    if let Some(seconds) = query.stream_timeout {
        builder = builder.stream_timeout(Duration::from_secs(seconds));
    }
    if let Some(limit) = query.stream_keep_alive_limit {
        builder = builder.stream_keep_alive_limit(limit);
    }
    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => return Problem::unprocessable(e.to_string()).into_response(),
    };

    let consumer = match state
        .consumer_factory
        .create_consumer(&event_type, Some(cursors))
        .await
    {
        Ok(consumer) => consumer,
        Err(e) => return Problem::from(e).into_response(),
    };

    debug!(
        event_type = %name,
        consuming_app = %consuming_app,
        batch_limit = config.batch_limit,
        "starting event stream"
    );

    let (writer, reader) = tokio::io::duplex(SINK_BUFFER_BYTES);
    let engine = EventStream::new(
        consumer,
        writer,
        config,
        state.blacklist.clone(),
        state.gates.clone(),
        state.stream_metrics.clone(),
    );
    // The client closing the connection drops the read half; the next
    // sink write fails and the engine shuts the consumer down.
    let connection_ready = Arc::new(AtomicBool::new(true));
    tokio::spawn(engine.run(connection_ready));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}

/// Parses the cursors header, scoping each wire cursor to the event
/// type being streamed.
fn parse_cursors(headers: &HeaderMap, event_type: &str) -> Result<Option<Vec<EventCursor>>, Problem> {
    let Some(raw) = headers.get(CURSORS_HEADER) else {
        return Ok(None);
    };
    let text = raw
        .to_str()
        .map_err(|_| Problem::bad_request("cursors header is not valid text"))?;
    let wire: Vec<Cursor> = serde_json::from_str(text)
        .map_err(|e| Problem::bad_request(format!("cursors header is not valid JSON: {e}")))?;
    if wire.is_empty() {
        return Err(Problem::bad_request("cursors header may not be empty"));
    }
    Ok(Some(
        wire.into_iter()
            .map(|cursor| EventCursor::new(event_type, cursor.partition, cursor.offset))
            .collect(),
    ))
}
