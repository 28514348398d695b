use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{PublicTranscript, Transcript, TranscriptSummary};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTranscriptRequest {
    pub purpose: Option<String>,
    pub valid_days: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptReceipt {
    pub id: Uuid,
    pub code: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub valid_until: Option<OffsetDateTime>,
}

impl From<Transcript> for TranscriptReceipt {
    fn from(t: Transcript) -> Self {
        Self {
            id: t.id,
            code: t.transcript_code,
            generated_at: t.generated_at,
            valid_until: t.valid_until,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateTranscriptResponse {
    pub success: bool,
    pub transcript: TranscriptReceipt,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptView {
    #[serde(flatten)]
    pub transcript: PublicTranscript,
    pub is_expired: bool,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub success: bool,
    pub transcript: TranscriptView,
}

#[derive(Debug, Serialize)]
pub struct TranscriptListResponse {
    pub success: bool,
    pub transcripts: Vec<TranscriptSummary>,
}
