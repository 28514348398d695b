use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    CourseDetails, CourseListResponse, CourseProgressResponse, CourseProgressView, CourseResponse,
    EnrolledCoursesResponse, EnrollmentResponse, ModuleProgressResponse, ModuleResponse,
    NewCourseRequest, NewModuleRequest, Pagination, ScoreRequest,
};
use super::repo;
use super::repo_types::{Course, CourseModule};
use super::services::{course_progress, record_step, ProgressStep};
use crate::{
    auth::{AuthUser, Role},
    error::{parse_id, ApiError, ApiJson, ApiResult},
    state::AppState,
};

pub fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/:id", get(get_course))
        .route("/courses/:id/progress", get(get_progress))
        .route("/courses/:id/modules", post(create_module))
        .route("/courses/:id/enroll", post(enroll))
        .route("/courses/:id/modules/:module_id/open", post(open_module))
        .route("/courses/:id/modules/:module_id/pre-test", post(submit_pre_test))
        .route("/courses/:id/modules/:module_id/video", post(complete_video))
        .route("/courses/:id/modules/:module_id/test", post(submit_test))
        .route("/users/me/enrollments", get(my_enrollments))
}

pub(crate) async fn load_course(state: &AppState, course_id: Uuid) -> ApiResult<Course> {
    repo::find_course(&state.db, course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))
}

#[instrument(skip(state))]
pub async fn list_courses(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<CourseListResponse>> {
    let courses = repo::list_courses(&state.db, p.limit.clamp(1, 100), p.offset.max(0)).await?;
    Ok(Json(CourseListResponse { success: true, courses }))
}

#[instrument(skip(state, body))]
pub async fn create_course(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<NewCourseRequest>,
) -> ApiResult<(StatusCode, Json<CourseResponse>)> {
    auth.require_staff()?;
    let title = body.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("Title is required"));
    }

    let course = repo::insert_course(&state.db, title, body.description.as_deref(), auth.id).await?;
    info!(course_id = %course.id, instructor_id = %auth.id, "course created");

    Ok((
        StatusCode::CREATED,
        Json(CourseResponse {
            success: true,
            course: CourseDetails { course, modules: Vec::new() },
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CourseResponse>> {
    let course = load_course(&state, parse_id(&id, "course")?).await?;
    let modules = repo::list_modules(&state.db, course.id).await?;
    Ok(Json(CourseResponse {
        success: true,
        course: CourseDetails { course, modules },
    }))
}

#[instrument(skip(state, body))]
pub async fn create_module(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<NewModuleRequest>,
) -> ApiResult<(StatusCode, Json<ModuleResponse>)> {
    let course = load_course(&state, parse_id(&id, "course")?).await?;
    if course.instructor_id != auth.id && auth.role != Role::Admin {
        return Err(ApiError::forbidden("Only the course instructor can add modules"));
    }
    if body.title.trim().is_empty() {
        return Err(ApiError::validation("Title is required"));
    }
    if matches!(body.position, Some(p) if p < 1) {
        return Err(ApiError::validation("Position must be at least 1"));
    }

    let module = repo::insert_module(&state.db, course.id, &body).await?;
    info!(course_id = %course.id, module_id = %module.id, "module added");
    Ok((StatusCode::CREATED, Json(ModuleResponse { success: true, module })))
}

#[instrument(skip(state))]
pub async fn enroll(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<EnrollmentResponse>> {
    let course = load_course(&state, parse_id(&id, "course")?).await?;
    let enrollment = repo::enroll(&state.db, auth.id, course.id).await?;
    info!(user_id = %auth.id, course_id = %course.id, "enrolled");
    Ok(Json(EnrollmentResponse { success: true, enrollment }))
}

#[instrument(skip(state))]
pub async fn my_enrollments(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<EnrolledCoursesResponse>> {
    let courses = repo::list_enrolled_courses(&state.db, auth.id).await?;
    Ok(Json(EnrolledCoursesResponse { success: true, courses }))
}

#[instrument(skip(state))]
pub async fn get_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<CourseProgressResponse>> {
    let course = load_course(&state, parse_id(&id, "course")?).await?;
    let (summary, modules) = course_progress(&state.db, auth.id, course.id).await?;
    Ok(Json(CourseProgressResponse {
        success: true,
        progress: CourseProgressView { summary, modules },
    }))
}

/// Resolves the module and checks the caller is enrolled in its course.
async fn enrolled_module(
    state: &AppState,
    auth: &AuthUser,
    course_id: &str,
    module_id: &str,
) -> ApiResult<CourseModule> {
    let course_id = parse_id(course_id, "course")?;
    let module_id = parse_id(module_id, "module")?;
    let module = repo::find_module(&state.db, course_id, module_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Module not found"))?;
    if !repo::is_enrolled(&state.db, auth.id, course_id).await? {
        warn!(user_id = %auth.id, %course_id, "progress update without enrollment");
        return Err(ApiError::forbidden("You are not enrolled in this course"));
    }
    Ok(module)
}

async fn run_step(
    state: &AppState,
    auth: &AuthUser,
    (course_id, module_id): (String, String),
    step: ProgressStep,
) -> ApiResult<Json<ModuleProgressResponse>> {
    let module = enrolled_module(state, auth, &course_id, &module_id).await?;
    let progress = record_step(&state.db, auth.id, &module, step, OffsetDateTime::now_utc()).await?;
    Ok(Json(ModuleProgressResponse { success: true, progress }))
}

#[instrument(skip(state))]
pub async fn open_module(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(ids): Path<(String, String)>,
) -> ApiResult<Json<ModuleProgressResponse>> {
    run_step(&state, &auth, ids, ProgressStep::Open).await
}

#[instrument(skip(state))]
pub async fn submit_pre_test(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(ids): Path<(String, String)>,
    ApiJson(body): ApiJson<ScoreRequest>,
) -> ApiResult<Json<ModuleProgressResponse>> {
    let s = ProgressStep::PreTest { score: body.score, total: body.total };
    run_step(&state, &auth, ids, s).await
}

#[instrument(skip(state))]
pub async fn complete_video(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(ids): Path<(String, String)>,
) -> ApiResult<Json<ModuleProgressResponse>> {
    run_step(&state, &auth, ids, ProgressStep::Video).await
}

#[instrument(skip(state))]
pub async fn submit_test(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(ids): Path<(String, String)>,
    ApiJson(body): ApiJson<ScoreRequest>,
) -> ApiResult<Json<ModuleProgressResponse>> {
    let s = ProgressStep::Test { score: body.score, total: body.total };
    run_step(&state, &auth, ids, s).await
}
