use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::repo;
use super::repo_types::CourseModule;
use crate::error::ApiError;
use crate::learning::{aggregate, CourseProgress, ModuleGates, ModuleProgress};

/// A learner action inside a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStep {
    Open,
    PreTest { score: i32, total: i32 },
    Video,
    Test { score: i32, total: i32 },
}

fn check_score(score: i32, total: i32) -> Result<(), ApiError> {
    if total <= 0 {
        return Err(ApiError::validation("Total must be greater than zero"));
    }
    if score < 0 || score > total {
        return Err(ApiError::validation("Score must be between 0 and total"));
    }
    Ok(())
}

/// Applies `step` to `p` and recomputes completion. Once completed, a module stays completed.
pub fn apply_step(
    p: &mut ModuleProgress,
    gates: ModuleGates,
    step: ProgressStep,
    now: OffsetDateTime,
) -> Result<(), ApiError> {
    let pre_test_pending = gates.has_pre_test && !p.has_pre_test();
    match step {
        ProgressStep::Open => {}
        ProgressStep::PreTest { score, total } => {
            if !gates.has_pre_test {
                return Err(ApiError::validation("This module has no pre-test"));
            }
            check_score(score, total)?;
            p.pre_test_score = Some(score);
            p.pre_test_total = Some(total);
        }
        ProgressStep::Video => {
            if !gates.has_video {
                return Err(ApiError::validation("This module has no video"));
            }
            if pre_test_pending {
                return Err(ApiError::validation("Complete the pre-test first"));
            }
            p.video_completed = true;
        }
        ProgressStep::Test { score, total } => {
            if !gates.has_test {
                return Err(ApiError::validation("This module has no test"));
            }
            if pre_test_pending {
                return Err(ApiError::validation("Complete the pre-test first"));
            }
            check_score(score, total)?;
            p.test_score = Some(score);
            p.test_total = Some(total);
        }
    }

    if !p.completed && gates.is_satisfied_by(p) {
        p.completed = true;
        p.completed_at = Some(now);
    }
    Ok(())
}

pub async fn record_step(
    db: &PgPool,
    user_id: Uuid,
    module: &CourseModule,
    step: ProgressStep,
    now: OffsetDateTime,
) -> Result<ModuleProgress, ApiError> {
    let mut tx = db.begin().await.context("begin tx")?;
    let mut progress = repo::lock_progress_tx(&mut tx, user_id, module.course_id, module.id).await?;
    let was_completed = progress.completed;

    apply_step(&mut progress, module.gates(), step, now)?;

    repo::save_progress_tx(&mut tx, &progress).await?;
    tx.commit().await.context("commit tx")?;

    if progress.completed && !was_completed {
        info!(%user_id, course_id = %module.course_id, module_id = %module.id, "module completed");
    } else {
        debug!(%user_id, module_id = %module.id, step = ?step, "module progress updated");
    }
    Ok(progress)
}

/// Reads the learner's rows and the course's module count; never writes.
pub async fn course_progress(
    db: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
) -> anyhow::Result<(CourseProgress, Vec<ModuleProgress>)> {
    let total = repo::count_modules(db, course_id).await?;
    let rows = repo::list_progress(db, user_id, course_id).await?;
    Ok((aggregate(&rows, total), rows))
}
