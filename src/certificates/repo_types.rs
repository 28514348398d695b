use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::learning::Grade;

/// Issued certificate. Course title and instructor are frozen at issuance.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub certificate_code: String,
    pub grade: String,
    pub score: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub completion_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    pub instructor_name: String,
    pub course_title: String,
}

/// Certificate found by its public code, with the holder's name.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCertificate {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub certificate: Certificate,
    pub holder_name: String,
}

/// Everything needed to insert a certificate except its code.
#[derive(Debug, Clone)]
pub struct CertificateDraft {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub grade: Grade,
    pub score: i32,
    pub completion_date: OffsetDateTime,
    pub instructor_name: String,
    pub course_title: String,
}
