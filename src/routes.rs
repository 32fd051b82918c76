use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::coordinator::CompletionCoordinator;
use crate::error::{ApiError, ProgressError};
use crate::models::{CompleteContentReq, CompleteMaterialReq};
use crate::points::{AwardPolicy, PointsService};
use crate::progress::ProgressService;
use crate::store::Store;

const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
const MAX_LEADERBOARD_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub progress: ProgressService,
    pub coordinator: CompletionCoordinator,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, policy: AwardPolicy) -> Self {
        let progress = ProgressService::new(store.clone());
        let points = PointsService::new(store.clone(), policy);
        let coordinator = CompletionCoordinator::new(progress.clone(), points);
        Self {
            store,
            progress,
            coordinator,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // catalogue (read-only)
        .route("/api/courses", get(list_courses))
        .route("/api/courses/:id", get(course_detail))
        // progress
        .route("/api/courses/:id/enroll", post(enroll))
        .route("/api/progress/me", get(my_progress))
        .route("/api/progress/course/:id/material", post(complete_material))
        // coordinated completion + award
        .route("/api/gamification/complete-content", post(complete_content))
        .route("/api/leaderboard", get(leaderboard))
        .with_state(state)
}

/// Verified caller identity. The upstream gateway authenticates every
/// request and forwards the user id as the bearer token; anything else is
/// rejected before a handler runs.
pub struct AuthedUser(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized)?;
        let user_id = Uuid::parse_str(bearer.token()).map_err(|_| ApiError::Unauthorized)?;
        Ok(AuthedUser(user_id))
    }
}

async fn list_courses(
    State(st): State<AppState>,
    AuthedUser(_): AuthedUser,
) -> Result<Json<Value>, ApiError> {
    let courses = st.store.list_courses().await?;
    Ok(Json(json!({ "data": courses })))
}

async fn course_detail(
    State(st): State<AppState>,
    AuthedUser(_): AuthedUser,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let detail = st
        .store
        .get_course_detail(course_id)
        .await?
        .ok_or(ProgressError::CourseNotFound(course_id))?;
    Ok(Json(json!({ "data": detail })))
}

async fn enroll(
    State(st): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let snapshot = st.progress.enroll(user_id, course_id).await?;
    Ok(Json(json!({ "data": snapshot })))
}

async fn my_progress(
    State(st): State<AppState>,
    AuthedUser(user_id): AuthedUser,
) -> Result<Json<Value>, ApiError> {
    let snapshots = st.progress.snapshots_for_user(user_id).await?;
    Ok(Json(json!({ "data": snapshots })))
}

async fn complete_material(
    State(st): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(course_id): Path<Uuid>,
    Json(req): Json<CompleteMaterialReq>,
) -> Result<Json<Value>, ApiError> {
    let record = st
        .progress
        .record_completion(user_id, course_id, req.material_id)
        .await?;
    Ok(Json(json!({ "data": record.snapshot })))
}

async fn complete_content(
    State(st): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Json(req): Json<CompleteContentReq>,
) -> Result<Json<Value>, ApiError> {
    let outcome = st
        .coordinator
        .complete_material(user_id, req.course_id, req.material_id, req.points)
        .await?;
    Ok(Json(json!({ "data": outcome })))
}

#[derive(Debug, Deserialize)]
struct LeaderboardParams {
    limit: Option<i64>,
}

async fn leaderboard(
    State(st): State<AppState>,
    AuthedUser(_): AuthedUser,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);
    let top = st.store.top_students(limit).await?;
    Ok(Json(json!({ "data": top })))
}
