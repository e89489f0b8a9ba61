//! HTTP surface.
//!
//! - `POST /hook` - push deliveries from the host
//! - `GET /lessons?limit&skip` - newest lessons first
//! - `GET /lessons/{id}` - one lesson, 404 when unknown
//! - `GET /status` - queue and pool counters
//! - `GET /health` - liveness

use std::sync::Arc;

use axum::{Json, Router};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::app::{ServiceContext, StatusReport, WorkerPool};
use crate::domain::{Lesson, LessonId};
use crate::ports::LessonQuery;
use crate::webhook::{
    DELIVERY_HEADER, Delivery, DeliveryOutcome, EVENT_HEADER, SIGNATURE_HEADER, WebhookError,
    process_delivery,
};

pub const MAX_LESSON_PAGE: usize = 100;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    ctx: Arc<ServiceContext>,
    pool: WorkerPool,
}

impl AppState {
    pub fn new(ctx: Arc<ServiceContext>, pool: WorkerPool) -> Self {
        Self {
            inner: Arc::new(AppStateInner { ctx, pool }),
        }
    }

    pub fn ctx(&self) -> &ServiceContext {
        &self.inner.ctx
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/hook", post(hook_handler))
        .route("/lessons", get(lessons_handler))
        .route("/lessons/{id}", get(lesson_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self, "webhook delivery failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "webhook delivery rejected");
        }
        (status, self.to_string()).into_response()
    }
}

/// Acknowledges once every commit in the push has been handled.
async fn hook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let delivery = Delivery {
        event: header(&headers, EVENT_HEADER),
        signature: header(&headers, SIGNATURE_HEADER),
        delivery_id: header(&headers, DELIVERY_HEADER),
        body: &body,
    };
    match process_delivery(state.ctx(), delivery).await? {
        DeliveryOutcome::Ignored(reason) => {
            debug!(reason, "delivery acknowledged without processing");
            Ok((StatusCode::OK, reason))
        }
        DeliveryOutcome::Processed(_) => Ok((StatusCode::OK, "ok")),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[derive(Debug, Default, Deserialize)]
pub struct LessonsParams {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl LessonsParams {
    fn query(&self) -> LessonQuery {
        let default = LessonQuery::default();
        LessonQuery {
            skip: self.skip.unwrap_or(default.skip),
            limit: self.limit.unwrap_or(default.limit).min(MAX_LESSON_PAGE),
        }
    }
}

async fn lessons_handler(
    State(state): State<AppState>,
    Query(params): Query<LessonsParams>,
) -> Result<Json<Vec<Lesson>>, (StatusCode, String)> {
    state
        .ctx()
        .documents
        .latest_lessons(params.query())
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "listing lessons failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}

async fn lesson_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Lesson>, (StatusCode, String)> {
    let not_found = || (StatusCode::NOT_FOUND, format!("no lesson {id}"));
    let Ok(lesson_id) = id.parse::<LessonId>() else {
        return Err(not_found());
    };
    match state.ctx().documents.find_lesson(lesson_id).await {
        Ok(Some(lesson)) => Ok(Json(lesson)),
        Ok(None) => Err(not_found()),
        Err(e) => {
            error!(lesson_id = %lesson_id, error = %e, "loading lesson failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusReport>, (StatusCode, String)> {
    StatusReport::collect(&state.ctx().tasks, state.pool())
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "collecting status failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}

async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
