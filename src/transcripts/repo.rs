use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{PublicTranscript, Transcript, TranscriptDraft, TranscriptSummary};
use super::services::TranscriptStore;
use crate::activities::{
    repo as activities_repo,
    repo_types::{ActivitySkill, ParticipationRecord, SkillTotal},
};
use crate::certificates::{repo as certificates_repo, repo_types::Certificate};
use crate::courses::{repo as courses_repo, repo_types::EnrolledCourse};
use crate::learning::{codes, CodeKind, ModuleProgress};

const TRANSCRIPT_COLUMNS: &str = r#"
    t.id, t.user_id, t.transcript_code, t.courses_data, t.activities_data, t.skills_data,
    t.total_courses, t.completed_courses, t.total_activities, t.total_volunteer_hours,
    t.total_skills, t.purpose, t.generated_at, t.valid_until
"#;

pub async fn insert(
    db: &PgPool,
    draft: &TranscriptDraft,
    now: OffsetDateTime,
) -> anyhow::Result<Transcript> {
    let mut tx = db.begin().await.context("begin tx")?;
    let code = codes::allocate_tx(&mut tx, CodeKind::Transcript, now).await?;
    let snapshot = &draft.snapshot;

    let row = sqlx::query_as::<_, Transcript>(&format!(
        r#"
        WITH t AS (
            INSERT INTO transcripts (user_id, transcript_code, courses_data, activities_data,
                                     skills_data, total_courses, completed_courses,
                                     total_activities, total_volunteer_hours, total_skills,
                                     purpose, generated_at, valid_until)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
        )
        SELECT {TRANSCRIPT_COLUMNS} FROM t
        "#
    ))
    .bind(draft.user_id)
    .bind(&code)
    .bind(Json(&snapshot.courses))
    .bind(Json(&snapshot.activities))
    .bind(Json(&snapshot.skills))
    .bind(snapshot.totals.total_courses)
    .bind(snapshot.totals.completed_courses)
    .bind(snapshot.totals.total_activities)
    .bind(snapshot.totals.total_volunteer_hours)
    .bind(snapshot.totals.total_skills)
    .bind(draft.purpose.as_deref())
    .bind(now)
    .bind(draft.valid_until)
    .fetch_one(&mut *tx)
    .await
    .context("insert transcript")?;

    tx.commit().await.context("commit tx")?;
    Ok(row)
}

pub async fn find_by_code(db: &PgPool, code: &str) -> anyhow::Result<Option<PublicTranscript>> {
    let row = sqlx::query_as::<_, PublicTranscript>(&format!(
        r#"
        SELECT {TRANSCRIPT_COLUMNS}, u.name AS holder_name
          FROM transcripts t
          JOIN users u ON u.id = t.user_id
         WHERE t.transcript_code = $1
        "#
    ))
    .bind(code)
    .fetch_optional(db)
    .await
    .context("find transcript by code")?;
    Ok(row)
}

pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<TranscriptSummary>> {
    let rows = sqlx::query_as::<_, TranscriptSummary>(
        r#"
        SELECT id, transcript_code, purpose, total_courses, completed_courses,
               total_activities, total_volunteer_hours, total_skills,
               generated_at, valid_until
          FROM transcripts
         WHERE user_id = $1
         ORDER BY generated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list transcripts")?;
    Ok(rows)
}

#[async_trait]
impl TranscriptStore for PgPool {
    async fn enrolled_courses(&self, user_id: Uuid) -> anyhow::Result<Vec<EnrolledCourse>> {
        courses_repo::list_enrolled_courses(self, user_id).await
    }

    async fn module_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> anyhow::Result<(i64, Vec<ModuleProgress>)> {
        let total = courses_repo::count_modules(self, course_id).await?;
        let rows = courses_repo::list_progress(self, user_id, course_id).await?;
        Ok((total, rows))
    }

    async fn certificates(&self, user_id: Uuid) -> anyhow::Result<Vec<Certificate>> {
        certificates_repo::list_for_user(self, user_id).await
    }

    async fn participations(&self, user_id: Uuid) -> anyhow::Result<Vec<ParticipationRecord>> {
        activities_repo::list_participations(self, user_id).await
    }

    async fn participation_skills(&self, user_id: Uuid) -> anyhow::Result<Vec<ActivitySkill>> {
        activities_repo::list_participation_skills(self, user_id).await
    }

    async fn skill_totals(&self, user_id: Uuid) -> anyhow::Result<Vec<SkillTotal>> {
        activities_repo::skill_totals(self, user_id).await
    }

    async fn insert_transcript(
        &self,
        draft: &TranscriptDraft,
        now: OffsetDateTime,
    ) -> anyhow::Result<Transcript> {
        insert(self, draft, now).await
    }
}
