use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{NewActivityRequest, SkillPoints};
use super::repo_types::{
    Activity, ActivitySkill, Participation, ParticipationRecord, Skill, SkillTotal,
};

const ACTIVITY_COLUMNS: &str =
    "id, title, description, location, starts_at, ends_at, volunteer_hours, organizer_id";

// ---- Skills ----

/// `None` when the code is already taken.
pub async fn insert_skill(
    db: &PgPool,
    code: &str,
    name: &str,
    color: &str,
) -> anyhow::Result<Option<Skill>> {
    let row = sqlx::query_as::<_, Skill>(
        r#"
        INSERT INTO skills (code, name, color)
        VALUES ($1, $2, $3)
        ON CONFLICT (code) DO NOTHING
        RETURNING id, code, name, color
        "#,
    )
    .bind(code)
    .bind(name)
    .bind(color)
    .fetch_optional(db)
    .await
    .context("insert skill")?;
    Ok(row)
}

pub async fn list_skills(db: &PgPool) -> anyhow::Result<Vec<Skill>> {
    let rows = sqlx::query_as::<_, Skill>("SELECT id, code, name, color FROM skills ORDER BY code")
        .fetch_all(db)
        .await
        .context("list skills")?;
    Ok(rows)
}

// ---- Activities ----

pub async fn insert_activity_tx(
    tx: &mut Transaction<'_, Postgres>,
    req: &NewActivityRequest,
    organizer_id: Uuid,
) -> anyhow::Result<Activity> {
    let row = sqlx::query_as::<_, Activity>(&format!(
        r#"
        INSERT INTO activities (title, description, location, starts_at, ends_at, volunteer_hours, organizer_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {ACTIVITY_COLUMNS}
        "#
    ))
    .bind(req.title.trim())
    .bind(req.description.as_deref())
    .bind(req.location.as_deref())
    .bind(req.starts_at)
    .bind(req.ends_at)
    .bind(req.volunteer_hours)
    .bind(organizer_id)
    .fetch_one(&mut **tx)
    .await
    .context("insert activity")?;
    Ok(row)
}

pub async fn insert_activity_skill_tx(
    tx: &mut Transaction<'_, Postgres>,
    activity_id: Uuid,
    sp: &SkillPoints,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO activity_skills (activity_id, skill_id, points)
        VALUES ($1, $2, $3)
        ON CONFLICT (activity_id, skill_id) DO UPDATE SET points = EXCLUDED.points
        "#,
    )
    .bind(activity_id)
    .bind(sp.skill_id)
    .bind(sp.points)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("link skill {} to activity {}", sp.skill_id, activity_id))?;
    Ok(())
}

pub async fn count_skills(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM skills WHERE id = ANY($1)")
        .bind(ids)
        .fetch_one(db)
        .await
        .context("count skills")?;
    Ok(n)
}

pub async fn list_activities(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<Activity>> {
    let rows = sqlx::query_as::<_, Activity>(&format!(
        r#"
        SELECT {ACTIVITY_COLUMNS}
          FROM activities
         ORDER BY starts_at DESC
         LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list activities")?;
    Ok(rows)
}

pub async fn find_activity(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Activity>> {
    let row = sqlx::query_as::<_, Activity>(&format!(
        "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find activity")?;
    Ok(row)
}

pub async fn list_activity_skills(db: &PgPool, activity_id: Uuid) -> anyhow::Result<Vec<ActivitySkill>> {
    let rows = sqlx::query_as::<_, ActivitySkill>(
        r#"
        SELECT a.activity_id, a.skill_id, s.code, s.name, a.points
          FROM activity_skills a
          JOIN skills s ON s.id = a.skill_id
         WHERE a.activity_id = $1
         ORDER BY s.code
        "#,
    )
    .bind(activity_id)
    .fetch_all(db)
    .await
    .context("list activity skills")?;
    Ok(rows)
}

// ---- Participation ----

/// Idempotent: re-registering returns the existing row.
pub async fn register(db: &PgPool, activity_id: Uuid, user_id: Uuid) -> anyhow::Result<Participation> {
    let row = sqlx::query_as::<_, Participation>(
        r#"
        INSERT INTO participations (activity_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (activity_id, user_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING id, activity_id, user_id, registered_at, checked_in, checked_in_at
        "#,
    )
    .bind(activity_id)
    .bind(user_id)
    .fetch_one(db)
    .await
    .context("register participation")?;
    Ok(row)
}

/// Marks every listed participant in one statement. Unregistered ids are ignored.
pub async fn set_attendance(
    db: &PgPool,
    activity_id: Uuid,
    user_ids: &[Uuid],
    checked_in: bool,
    now: OffsetDateTime,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE participations
           SET checked_in = $3,
               checked_in_at = CASE WHEN $3 THEN COALESCE(checked_in_at, $4) ELSE NULL END
         WHERE activity_id = $1 AND user_id = ANY($2)
        "#,
    )
    .bind(activity_id)
    .bind(user_ids)
    .bind(checked_in)
    .bind(now)
    .execute(db)
    .await
    .context("update attendance")?;
    Ok(result.rows_affected())
}

pub async fn list_participations(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<ParticipationRecord>> {
    let rows = sqlx::query_as::<_, ParticipationRecord>(
        r#"
        SELECT a.id AS activity_id, a.title, a.starts_at, a.ends_at, a.volunteer_hours,
               p.checked_in, p.checked_in_at
          FROM participations p
          JOIN activities a ON a.id = p.activity_id
         WHERE p.user_id = $1
         ORDER BY a.starts_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list participations")?;
    Ok(rows)
}

/// Skills of every activity the user registered for, checked in or not.
pub async fn list_participation_skills(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<ActivitySkill>> {
    let rows = sqlx::query_as::<_, ActivitySkill>(
        r#"
        SELECT a.activity_id, a.skill_id, s.code, s.name, a.points
          FROM participations p
          JOIN activity_skills a ON a.activity_id = p.activity_id
          JOIN skills s ON s.id = a.skill_id
         WHERE p.user_id = $1
         ORDER BY s.code
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list participation skills")?;
    Ok(rows)
}

pub async fn skill_totals(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<SkillTotal>> {
    let rows = sqlx::query_as::<_, SkillTotal>(
        r#"
        SELECT s.code, s.name, s.color, SUM(a.points)::BIGINT AS total_points
          FROM participations p
          JOIN activity_skills a ON a.activity_id = p.activity_id
          JOIN skills s ON s.id = a.skill_id
         WHERE p.user_id = $1 AND p.checked_in
         GROUP BY s.id, s.code, s.name, s.color
        HAVING SUM(a.points) > 0
         ORDER BY total_points DESC, s.code
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("sum skill points")?;
    Ok(rows)
}
