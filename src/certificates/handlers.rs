use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::dto::{
    CertificateListResponse, CertificateStatusResponse, IssuedCertificateResponse,
    VerifyCertificateResponse,
};
use super::{repo, services};
use crate::{
    auth::AuthUser,
    error::{parse_id, ApiResult},
    learning::{codes, CodeKind},
    state::AppState,
};

pub fn certificate_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/courses/:id/certificate",
            get(get_certificate).post(issue_certificate),
        )
        .route("/users/me/certificates", get(my_certificates))
        .route("/certificates/verify/:code", get(verify_certificate))
}

#[instrument(skip(state))]
pub async fn get_certificate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<CertificateStatusResponse>> {
    let course_id = parse_id(&id, "course")?;
    let (certificate, eligibility) = services::status(&state.db, auth.id, course_id).await?;
    Ok(Json(CertificateStatusResponse {
        success: true,
        has_certificate: certificate.is_some(),
        certificate,
        eligibility,
    }))
}

#[instrument(skip(state))]
pub async fn issue_certificate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<IssuedCertificateResponse>)> {
    let course_id = parse_id(&id, "course")?;
    let certificate =
        services::issue(&state.db, auth.id, course_id, OffsetDateTime::now_utc()).await?;
    Ok((
        StatusCode::CREATED,
        Json(IssuedCertificateResponse {
            success: true,
            message: "Certificate generated successfully",
            certificate,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn my_certificates(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<CertificateListResponse>> {
    let certificates = repo::list_for_user(&state.db, auth.id).await?;
    Ok(Json(CertificateListResponse { success: true, certificates }))
}

/// Public lookup; unknown or malformed codes are reported as invalid, not as errors.
#[instrument(skip(state))]
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<VerifyCertificateResponse>> {
    let code = code.trim().to_uppercase();
    let certificate = if codes::is_well_formed(CodeKind::Certificate, &code) {
        repo::find_by_code(&state.db, &code).await?
    } else {
        None
    };
    Ok(Json(VerifyCertificateResponse {
        success: true,
        valid: certificate.is_some(),
        certificate,
    }))
}
