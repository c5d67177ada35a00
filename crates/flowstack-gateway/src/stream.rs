use axum::body::Body;
use axum::http::header;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use flowstack_core::types::ExecutionEvent;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Frame an event stream as a newline-delimited JSON response.
///
/// One record per event, in emission order, handed to the transport as
/// produced — no coalescing, no end-of-stream batching. The connection
/// closes when the event stream ends; dropping the body cancels the run
/// upstream.
pub fn ndjson_response(
    events: impl Stream<Item = ExecutionEvent> + Send + 'static,
) -> impl IntoResponse {
    let body = Body::from_stream(events.map(|event| {
        let mut line = serde_json::to_string(&event).unwrap_or_else(|_| {
            r#"{"type":"error","message":"Event serialization failed"}"#.to_string()
        });
        line.push('\n');
        Ok::<_, std::convert::Infallible>(Bytes::from(line))
    }));

    ([(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)], body)
}
