use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Activity, ActivitySkill, Participation, ParticipationRecord, Skill};

#[derive(Debug, Deserialize)]
pub struct NewSkillRequest {
    pub code: String,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillPoints {
    pub skill_id: Uuid,
    pub points: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivityRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    #[serde(default)]
    pub volunteer_hours: f64,
    #[serde(default)]
    pub skills: Vec<SkillPoints>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub user_ids: Vec<Uuid>,
    pub checked_in: bool,
}

#[derive(Debug, Serialize)]
pub struct SkillResponse {
    pub success: bool,
    pub skill: Skill,
}

#[derive(Debug, Serialize)]
pub struct SkillListResponse {
    pub success: bool,
    pub skills: Vec<Skill>,
}

#[derive(Debug, Serialize)]
pub struct ActivityDetails {
    #[serde(flatten)]
    pub activity: Activity,
    pub skills: Vec<ActivitySkill>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub success: bool,
    pub activity: ActivityDetails,
}

#[derive(Debug, Serialize)]
pub struct ActivityListResponse {
    pub success: bool,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Serialize)]
pub struct ParticipationResponse {
    pub success: bool,
    pub participation: Participation,
}

#[derive(Debug, Serialize)]
pub struct MyActivitiesResponse {
    pub success: bool,
    pub activities: Vec<ParticipationRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceResponse {
    pub success: bool,
    pub updated: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillSummary {
    pub code: String,
    pub name: String,
    pub total_points: i64,
    pub level: i32,
    pub color: String,
}

#[derive(Debug, Serialize)]
pub struct MySkillsResponse {
    pub success: bool,
    pub skills: Vec<SkillSummary>,
}
