use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::dto::{
    GenerateTranscriptRequest, GenerateTranscriptResponse, TranscriptListResponse,
    TranscriptResponse, TranscriptView,
};
use super::{repo, services};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiJson, ApiResult},
    learning::{codes, CodeKind},
    state::AppState,
};

pub fn transcript_routes() -> Router<AppState> {
    Router::new()
        .route("/transcripts/generate", post(generate_transcript))
        .route("/transcripts/:code", get(get_transcript))
        .route("/users/me/transcripts", get(my_transcripts))
}

#[instrument(skip(state, body))]
pub async fn generate_transcript(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<GenerateTranscriptRequest>,
) -> ApiResult<(StatusCode, Json<GenerateTranscriptResponse>)> {
    let transcript =
        services::generate(&state.db, auth.id, &body, OffsetDateTime::now_utc()).await?;
    Ok((
        StatusCode::CREATED,
        Json(GenerateTranscriptResponse {
            success: true,
            transcript: transcript.into(),
        }),
    ))
}

/// Readable by anyone holding the code.
#[instrument(skip(state))]
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<TranscriptResponse>> {
    let code = code.trim().to_uppercase();
    if !codes::is_well_formed(CodeKind::Transcript, &code) {
        return Err(ApiError::not_found("Transcript not found"));
    }
    let transcript = repo::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| ApiError::not_found("Transcript not found"))?;

    let is_expired =
        services::is_expired(transcript.transcript.valid_until, OffsetDateTime::now_utc());
    Ok(Json(TranscriptResponse {
        success: true,
        transcript: TranscriptView { transcript, is_expired },
    }))
}

#[instrument(skip(state))]
pub async fn my_transcripts(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<TranscriptListResponse>> {
    let transcripts = repo::list_for_user(&state.db, auth.id).await?;
    Ok(Json(TranscriptListResponse { success: true, transcripts }))
}
