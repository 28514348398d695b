use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

/// Error returned by every handler; rendered as `{ "success": false, "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("You have completed {completed} out of {total} modules. Complete all modules to receive a certificate")]
    IncompleteCourse { completed: i64, total: i64 },
    #[error("You need at least 70% to receive a certificate. Your current average is {score}%")]
    BelowPassingThreshold { score: i32 },
    #[error("A certificate has already been issued for this course")]
    AlreadyIssued,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_)
            | Self::IncompleteCourse { .. }
            | Self::BelowPassingThreshold { .. }
            | Self::AlreadyIssued => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// `Json` body extractor whose rejections render as `ApiError::Validation`.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Parses a path segment as an id, reporting a readable validation error.
pub fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::validation(format!("Invalid {} id", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_gates_map_to_bad_request() {
        assert_eq!(
            ApiError::IncompleteCourse { completed: 2, total: 3 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BelowPassingThreshold { score: 60 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::AlreadyIssued.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn incomplete_course_message_names_counts() {
        let msg = ApiError::IncompleteCourse { completed: 2, total: 3 }.to_string();
        assert!(msg.contains("2 out of 3"));
    }

    #[test]
    fn below_threshold_message_names_score() {
        let msg = ApiError::BelowPassingThreshold { score: 64 }.to_string();
        assert!(msg.contains("at least 70%"));
        assert!(msg.contains("64%"));
    }

    #[test]
    fn parse_id_rejects_non_uuid() {
        let err = parse_id("12abc", "course").unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Invalid course id"));
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "course").unwrap(), id);
    }

    #[tokio::test]
    async fn json_rejection_is_validation_error() {
        let req = axum::http::Request::builder()
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(r#"{"n":"abc"}"#))
            .unwrap();
        #[derive(Debug, serde::Deserialize)]
        struct Payload {
            #[allow(dead_code)]
            n: i64,
        }
        let err = ApiJson::<Payload>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(matches!(err, ApiError::Validation(ref m) if m.contains("invalid type")));
    }

    #[test]
    fn internal_error_hides_details() {
        let resp = ApiError::Internal(anyhow::anyhow!("connection refused")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
