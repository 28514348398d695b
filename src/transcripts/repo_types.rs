use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::activities::dto::SkillSummary;

/// Stored transcript. The three `*_data` columns are frozen JSON snapshots.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transcript_code: String,
    pub courses_data: Value,
    pub activities_data: Value,
    pub skills_data: Value,
    pub total_courses: i32,
    pub completed_courses: i32,
    pub total_activities: i32,
    pub total_volunteer_hours: f64,
    pub total_skills: i32,
    pub purpose: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub valid_until: Option<OffsetDateTime>,
}

/// Transcript looked up by code, with the holder's name.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicTranscript {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub transcript: Transcript,
    pub holder_name: String,
}

/// Row of `GET /users/me/transcripts`; no snapshot payload.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSummary {
    pub id: Uuid,
    pub transcript_code: String,
    pub purpose: Option<String>,
    pub total_courses: i32,
    pub completed_courses: i32,
    pub total_activities: i32,
    pub total_volunteer_hours: f64,
    pub total_skills: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub valid_until: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub course_id: Uuid,
    pub title: String,
    pub instructor_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub enrolled_at: OffsetDateTime,
    pub total_modules: i64,
    pub completed_modules: i64,
    pub completion_percentage: i32,
    pub average_score: i32,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AwardedSkill {
    pub code: String,
    pub name: String,
    pub points: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub activity_id: Uuid,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub volunteer_hours: f64,
    pub checked_in: bool,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub checked_in_at: Option<OffsetDateTime>,
    pub skills: Vec<AwardedSkill>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptTotals {
    pub total_courses: i32,
    pub completed_courses: i32,
    pub total_activities: i32,
    pub total_volunteer_hours: f64,
    pub total_skills: i32,
}

/// Everything a transcript captures about a user at one instant.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub courses: Vec<CourseRecord>,
    pub activities: Vec<ActivityRecord>,
    pub skills: Vec<SkillSummary>,
    pub totals: TranscriptTotals,
}

/// Insert payload: snapshot plus the caller's options, code still unassigned.
#[derive(Debug)]
pub struct TranscriptDraft {
    pub user_id: Uuid,
    pub snapshot: Snapshot,
    pub purpose: Option<String>,
    pub valid_until: Option<OffsetDateTime>,
}
