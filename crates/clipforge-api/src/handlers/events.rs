//! Server-pushed progress stream.
//!
//! One SSE message per progress event; the `id` field carries `seq` so
//! clients can detect gaps after the snapshot. The stream ends after a
//! terminal event.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tracing::debug;

use clipforge_models::JobId;

use crate::error::ApiResult;
use crate::principal::Principal;
use crate::state::AppState;

/// GET /jobs/{id}/events
pub async fn job_events(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let job_id = JobId::from(id);
    // Ownership gate; also yields the snapshot the bus may not have if
    // the ring was retired.
    state.store.jobs.get_owned(&job_id, &principal.id).await?;

    let receiver = state.events.subscribe(&job_id).await;
    debug!(job_id = %job_id, "SSE subscriber connected");

    let stream = futures_util::stream::unfold(
        (receiver, false),
        |(mut receiver, done)| async move {
            if done {
                return None;
            }
            let event = receiver.recv().await?;
            let terminal = event.status.is_terminal();
            let sse = Event::default()
                .id(event.seq.to_string())
                .event("progress")
                .json_data(&event)
                .unwrap_or_else(|_| Event::default().comment("serialization failure"));
            Some((Ok::<_, Infallible>(sse), (receiver, terminal)))
        },
    );

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
