use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{activities, auth, certificates, courses, transcripts};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(courses::router())
                .merge(activities::router())
                .merge(certificates::router())
                .merge(transcripts::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{dto::JwtKeys, Role};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn bearer(state: &AppState, role: Role) -> String {
        let keys = JwtKeys::from(&state.config.jwt);
        let token = keys.sign_access(Uuid::new_v4(), role).expect("sign");
        format!("Bearer {token}")
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = res.into_body().collect().await.expect("body").to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn protected_route_without_token_is_unauthorized() {
        let app = build_app(AppState::fake());
        let req = Request::post("/api/v1/transcripts/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], Value::Bool(false));
        assert_eq!(body["error"], "Missing Authorization header");
    }

    #[tokio::test]
    async fn malformed_course_id_is_validation_error() {
        let state = AppState::fake();
        let auth = bearer(&state, Role::Student);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/courses/abc/certificate")
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(build_app(state), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid course id");
    }

    #[tokio::test]
    async fn unsupported_validity_is_rejected_before_any_read() {
        let state = AppState::fake();
        let auth = bearer(&state, Role::Student);
        let req = Request::post("/api/v1/transcripts/generate")
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"purpose":"visa","validDays":45}"#))
            .unwrap();
        let (status, body) = send(build_app(state), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], Value::Bool(false));
    }

    #[tokio::test]
    async fn mistyped_body_is_validation_error() {
        let state = AppState::fake();
        let auth = bearer(&state, Role::Student);
        let req = Request::post("/api/v1/transcripts/generate")
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"validDays":"abc"}"#))
            .unwrap();
        let (status, body) = send(build_app(state), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], Value::Bool(false));
        assert!(body["error"].as_str().is_some_and(|e| e.contains("validDays")));
    }

    #[tokio::test]
    async fn missing_json_content_type_is_validation_error() {
        let state = AppState::fake();
        let auth = bearer(&state, Role::Instructor);
        let req = Request::post("/api/v1/courses")
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(build_app(state), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], Value::Bool(false));
    }

    #[tokio::test]
    async fn enrollment_and_module_steps_share_course_router() {
        let state = AppState::fake();
        let auth = bearer(&state, Role::Student);
        for uri in [
            "/api/v1/courses/abc/enroll",
            "/api/v1/courses/abc/modules/def/open",
        ] {
            let req = Request::post(uri)
                .header(header::AUTHORIZATION, auth.clone())
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(build_app(state.clone()), req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"], "Invalid course id");
        }
    }

    #[tokio::test]
    async fn malformed_certificate_code_is_not_valid() {
        let req = Request::get("/api/v1/certificates/verify/not-a-code")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(build_app(AppState::fake()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], Value::Bool(false));
        assert_eq!(body["certificate"], Value::Null);
    }

    #[tokio::test]
    async fn malformed_transcript_code_is_not_found() {
        let req = Request::get("/api/v1/transcripts/CERT-202610-0001")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(build_app(AppState::fake()), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Transcript not found");
    }

    #[tokio::test]
    async fn students_cannot_create_courses() {
        let state = AppState::fake();
        let auth = bearer(&state, Role::Student);
        let req = Request::post("/api/v1/courses")
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"Intro"}"#))
            .unwrap();
        let (status, _) = send(build_app(state), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
