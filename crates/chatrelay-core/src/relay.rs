//! Completion relay: upstream deltas in, event records out.
//!
//! One delta produces at most one record (empty deltas are skipped), records
//! keep arrival order, and exhaustion of the upstream produces exactly one
//! `[DONE]` record. The pipeline is pull-driven: the next delta is requested
//! only after the previous record was taken by the consumer, and dropping
//! the output stream drops the upstream with it.
//!
//! Records are [`axum::response::sse::Event`]s, so an [`Sse`] response writes
//! each one as `data: <json>\n\n` the moment it is produced.
//!
//! An upstream failure is yielded as a single `Err` item, after which the
//! stream ends without `[DONE]`. An HTTP body built from this stream aborts
//! at that point, which is how the caller observes the failure.
//!
//! [`Sse`]: axum::response::sse::Sse

use axum::response::sse::Event;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, warn};

use crate::completion::DeltaStream;
use crate::error::RelayError;
use crate::sse::DONE_SENTINEL;

/// Record emitted by the chat relay: the delta itself.
#[derive(Debug, Serialize)]
pub struct ContentEvent<'a> {
    pub content: &'a str,
}

/// Record emitted by the title relay: everything received so far.
#[derive(Debug, Serialize)]
pub struct TitleEvent<'a> {
    pub title: &'a str,
}

/// Output of a relay, ready for `Sse::new`.
pub type EventStream = BoxStream<'static, Result<Event, RelayError>>;

/// Pass-through relay used for chat completions.
pub fn content_relay(deltas: DeltaStream) -> EventStream {
    relay(deltas, |delta| Event::default().json_data(ContentEvent { content: delta }))
}

/// Accumulating relay used for title synthesis: each record carries the
/// whole title built so far, never just the delta.
pub fn title_relay(deltas: DeltaStream) -> EventStream {
    let mut title = String::new();
    relay(deltas, move |delta| {
        title.push_str(delta);
        Event::default().json_data(TitleEvent { title: &title })
    })
}

/// The terminal `data: [DONE]` record.
pub fn done_event() -> Event {
    Event::default().data(DONE_SENTINEL)
}

struct RelayState<F> {
    deltas: DeltaStream,
    record: F,
    emitted: usize,
    finished: bool,
}

/// Turn every non-empty delta into a record with `record`, then append the
/// terminal marker.
pub fn relay<F>(deltas: DeltaStream, record: F) -> EventStream
where
    F: FnMut(&str) -> Result<Event, axum::Error> + Send + 'static,
{
    let state = RelayState {
        deltas,
        record,
        emitted: 0,
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }
        loop {
            match st.deltas.next().await {
                Some(Ok(delta)) if delta.is_empty() => continue,
                Some(Ok(delta)) => {
                    let event = (st.record)(&delta).map_err(RelayError::from);
                    st.finished = event.is_err();
                    st.emitted += 1;
                    return Some((event, st));
                }
                Some(Err(e)) => {
                    warn!(error = %e, emitted = st.emitted, "upstream failed mid-stream; closing relay");
                    st.finished = true;
                    return Some((Err(RelayError::Upstream(e)), st));
                }
                None => {
                    debug!(emitted = st.emitted, "upstream exhausted; sending terminal marker");
                    st.finished = true;
                    return Some((Ok(done_event()), st));
                }
            }
        }
    })
    .boxed()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
