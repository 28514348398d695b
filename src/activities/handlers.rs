use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::dto::{
    ActivityDetails, ActivityListResponse, ActivityResponse, AttendanceRequest, AttendanceResponse,
    MyActivitiesResponse, MySkillsResponse, NewActivityRequest, NewSkillRequest,
    ParticipationResponse, SkillListResponse, SkillResponse,
};
use super::repo;
use super::repo_types::Activity;
use super::services::create_activity;
use crate::{
    auth::{AuthUser, Role},
    courses::dto::Pagination,
    error::{parse_id, ApiError, ApiJson, ApiResult},
    state::AppState,
};

pub fn skill_routes() -> Router<AppState> {
    Router::new()
        .route("/skills", get(list_skills).post(create_skill))
        .route("/users/me/skills", get(my_skills))
}

pub fn activity_routes() -> Router<AppState> {
    Router::new()
        .route("/activities", get(list_activities).post(new_activity))
        .route("/activities/:id", get(get_activity))
        .route("/activities/:id/register", post(register))
        .route("/activities/:id/attendance", post(update_attendance))
        .route("/users/me/activities", get(my_activities))
}

async fn load_activity(state: &AppState, raw_id: &str) -> ApiResult<Activity> {
    let id = parse_id(raw_id, "activity")?;
    repo::find_activity(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Activity not found"))
}

#[instrument(skip(state))]
pub async fn list_skills(State(state): State<AppState>) -> ApiResult<Json<SkillListResponse>> {
    let skills = repo::list_skills(&state.db).await?;
    Ok(Json(SkillListResponse { success: true, skills }))
}

#[instrument(skip(state, body))]
pub async fn create_skill(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<NewSkillRequest>,
) -> ApiResult<(StatusCode, Json<SkillResponse>)> {
    auth.require_admin()?;
    let code = body.code.trim().to_uppercase();
    let name = body.name.trim();
    if code.is_empty() || name.is_empty() {
        return Err(ApiError::validation("Code and name are required"));
    }
    let color = body.color.as_deref().map(str::trim).unwrap_or("#6b7280");

    let skill = repo::insert_skill(&state.db, &code, name, color)
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("Skill code {} already exists", code)))?;
    info!(skill_id = %skill.id, code = %skill.code, "skill created");
    Ok((StatusCode::CREATED, Json(SkillResponse { success: true, skill })))
}

#[instrument(skip(state))]
pub async fn my_skills(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<MySkillsResponse>> {
    let skills = repo::skill_totals(&state.db, auth.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(MySkillsResponse { success: true, skills }))
}

#[instrument(skip(state))]
pub async fn list_activities(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<ActivityListResponse>> {
    let activities = repo::list_activities(&state.db, p.limit.clamp(1, 100), p.offset.max(0)).await?;
    Ok(Json(ActivityListResponse { success: true, activities }))
}

#[instrument(skip(state, body))]
pub async fn new_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<NewActivityRequest>,
) -> ApiResult<(StatusCode, Json<ActivityResponse>)> {
    auth.require_staff()?;
    let activity = create_activity(&state, auth.id, &body).await?;
    Ok((StatusCode::CREATED, Json(ActivityResponse { success: true, activity })))
}

#[instrument(skip(state))]
pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActivityResponse>> {
    let activity = load_activity(&state, &id).await?;
    let skills = repo::list_activity_skills(&state.db, activity.id).await?;
    Ok(Json(ActivityResponse {
        success: true,
        activity: ActivityDetails { activity, skills },
    }))
}

#[instrument(skip(state))]
pub async fn register(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ParticipationResponse>> {
    let activity = load_activity(&state, &id).await?;
    let participation = repo::register(&state.db, activity.id, auth.id).await?;
    info!(user_id = %auth.id, activity_id = %activity.id, "registered for activity");
    Ok(Json(ParticipationResponse { success: true, participation }))
}

#[instrument(skip(state, body))]
pub async fn update_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AttendanceRequest>,
) -> ApiResult<Json<AttendanceResponse>> {
    let activity = load_activity(&state, &id).await?;
    if activity.organizer_id != auth.id && auth.role != Role::Admin {
        return Err(ApiError::forbidden("Only the organizer can take attendance"));
    }
    if body.user_ids.is_empty() {
        return Err(ApiError::validation("userIds must be non-empty"));
    }

    let updated = repo::set_attendance(
        &state.db,
        activity.id,
        &body.user_ids,
        body.checked_in,
        OffsetDateTime::now_utc(),
    )
    .await?;
    info!(
        activity_id = %activity.id,
        requested = body.user_ids.len(),
        updated,
        checked_in = body.checked_in,
        "attendance updated"
    );
    Ok(Json(AttendanceResponse { success: true, updated }))
}

#[instrument(skip(state))]
pub async fn my_activities(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<MyActivitiesResponse>> {
    let activities = repo::list_participations(&state.db, auth.id).await?;
    Ok(Json(MyActivitiesResponse { success: true, activities }))
}
