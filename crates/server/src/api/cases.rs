//! # Case API
//!
//! Submit a narrative, poll its run, or stream its progress.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use utoipa::ToSchema;

use casebrief_core::state::{Run, RunStatus};
use casebrief_core::swarm::StreamEvent;

use super::{ApiError, SharedState};

/// Narrative to research
#[derive(Debug, Deserialize, ToSchema)]
pub struct CaseRequest {
    /// Free-text case narrative, 20 to 20000 characters
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseSubmitted {
    pub run_id: String,
}

/// Status of a run that has no final result
#[derive(Debug, Serialize, ToSchema)]
pub struct CaseStatus {
    pub run_id: String,
    /// pending | running | complete | error
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
}

impl From<&Run> for CaseStatus {
    fn from(run: &Run) -> Self {
        Self {
            run_id: run.run_id.clone(),
            status: run.status.as_str().to_string(),
            error: run.error.clone(),
            created_at: run.created_at.to_rfc3339(),
        }
    }
}

pub fn case_routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(submit_case).get(list_cases))
        .route("/:id", get(get_case))
        .route("/:id/stream", get(stream_case))
}

/// Start a research run
#[utoipa::path(
    post,
    path = "/api/case",
    tag = "case",
    request_body = CaseRequest,
    responses(
        (status = 200, description = "Run accepted", body = CaseSubmitted),
        (status = 400, description = "Narrative too short or too long", body = super::ErrorBody)
    )
)]
pub async fn submit_case(
    State(state): State<SharedState>,
    Json(req): Json<CaseRequest>,
) -> Result<Json<CaseSubmitted>, ApiError> {
    let run_id = state
        .coordinator
        .submit(&req.text)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(CaseSubmitted { run_id }))
}

/// List every run
#[utoipa::path(
    get,
    path = "/api/case",
    tag = "case",
    responses(
        (status = 200, description = "All runs, oldest first", body = Vec<CaseStatus>)
    )
)]
pub async fn list_cases(State(state): State<SharedState>) -> Json<Vec<CaseStatus>> {
    let runs = state
        .coordinator
        .store()
        .list()
        .into_iter()
        .map(|summary| CaseStatus {
            run_id: summary.run_id,
            status: summary.status.as_str().to_string(),
            error: summary.error,
            created_at: summary.created_at.to_rfc3339(),
        })
        .collect();
    Json(runs)
}

/// Fetch a run: its final result once complete, otherwise its status
#[utoipa::path(
    get,
    path = "/api/case/{id}",
    tag = "case",
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Final result with statutes and case law"),
        (status = 202, description = "Still pending or running", body = CaseStatus),
        (status = 404, description = "Unknown run", body = super::ErrorBody),
        (status = 500, description = "Run failed", body = super::ErrorBody)
    )
)]
pub async fn get_case(State(state): State<SharedState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let run = state
        .coordinator
        .store()
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Run {} not found", id)))?;

    match run.status {
        RunStatus::Pending | RunStatus::Running => {
            Ok((StatusCode::ACCEPTED, Json(CaseStatus::from(&run))).into_response())
        }
        RunStatus::Error => Err(ApiError::Internal(
            run.error.unwrap_or_else(|| "Run failed".to_string()),
        )),
        RunStatus::Complete => match run.final_result() {
            Some(result) => Ok(Json(result).into_response()),
            None => Err(ApiError::Internal("Completed run has no result".to_string())),
        },
    }
}

/// Last-known terminal state of a run whose stream has already closed
fn terminal_event(run: &Run) -> Option<StreamEvent> {
    match run.status {
        RunStatus::Complete => run.final_result().map(StreamEvent::RunComplete),
        RunStatus::Error => Some(StreamEvent::Error {
            message: run.error.clone().unwrap_or_else(|| "Run failed".to_string()),
        }),
        RunStatus::Pending | RunStatus::Running => None,
    }
}

/// Server-sent events for one run. A late subscriber gets the terminal state and end-of-stream.
pub async fn stream_case(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let store = state.coordinator.store();
    if store.get(&id).is_none() {
        return Err(ApiError::NotFound(format!("Run {} not found", id)));
    }

    let subscription = state.coordinator.bus().subscribe(&id);
    let replay = if subscription.subscribed_after_close() {
        // The store is final before the stream closes
        store.get(&id).as_ref().and_then(terminal_event)
    } else {
        None
    };
    tracing::debug!(run_id = %id, replay = replay.is_some(), "Stream subscriber connected");

    let live = stream::unfold(subscription, |mut subscription| async move {
        subscription.recv().await.map(|event| (event, subscription))
    });
    let events = stream::iter(replay)
        .chain(live)
        .map(|event| Ok(Event::default().data(event.to_json())));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
