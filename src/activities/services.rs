use anyhow::Context;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use super::dto::{ActivityDetails, NewActivityRequest, SkillSummary};
use super::repo;
use super::repo_types::SkillTotal;
use crate::error::ApiError;
use crate::state::AppState;

const LEVEL_THRESHOLDS: [i64; 4] = [50, 150, 300, 500];

/// Level 1 through 5 from accumulated points.
pub fn skill_level(points: i64) -> i32 {
    1 + LEVEL_THRESHOLDS.iter().filter(|t| points >= **t).count() as i32
}

impl From<SkillTotal> for SkillSummary {
    fn from(t: SkillTotal) -> Self {
        Self {
            level: skill_level(t.total_points),
            code: t.code,
            name: t.name,
            total_points: t.total_points,
            color: t.color,
        }
    }
}

pub fn validate_activity(req: &NewActivityRequest) -> Result<(), ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::validation("Title is required"));
    }
    if req.ends_at < req.starts_at {
        return Err(ApiError::validation("Activity must end after it starts"));
    }
    if !req.volunteer_hours.is_finite() || req.volunteer_hours < 0.0 {
        return Err(ApiError::validation("Volunteer hours must be zero or more"));
    }
    let mut seen = HashSet::new();
    for sp in &req.skills {
        if sp.points < 0 {
            return Err(ApiError::validation("Skill points must be zero or more"));
        }
        if !seen.insert(sp.skill_id) {
            return Err(ApiError::validation("Each skill may be listed once"));
        }
    }
    Ok(())
}

pub async fn create_activity(
    st: &AppState,
    organizer_id: Uuid,
    req: &NewActivityRequest,
) -> Result<ActivityDetails, ApiError> {
    validate_activity(req)?;

    let skill_ids: Vec<Uuid> = req.skills.iter().map(|s| s.skill_id).collect();
    if repo::count_skills(&st.db, &skill_ids).await? != skill_ids.len() as i64 {
        return Err(ApiError::validation("Unknown skill"));
    }

    let mut tx = st.db.begin().await.context("begin tx")?;
    let activity = repo::insert_activity_tx(&mut tx, req, organizer_id).await?;
    for sp in &req.skills {
        repo::insert_activity_skill_tx(&mut tx, activity.id, sp).await?;
    }
    tx.commit().await.context("commit tx")?;

    info!(activity_id = %activity.id, %organizer_id, skills = req.skills.len(), "activity created");
    let skills = repo::list_activity_skills(&st.db, activity.id).await?;
    Ok(ActivityDetails { activity, skills })
}
