use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::dto::NewModuleRequest;
use super::repo_types::{Course, CourseModule, EnrolledCourse, Enrollment};
use crate::learning::ModuleProgress;

const COURSE_COLUMNS: &str = r#"
    c.id, c.title, c.description, c.instructor_id, u.name AS instructor_name, c.created_at
"#;

const PROGRESS_COLUMNS: &str = r#"
    id, user_id, course_id, module_id, pre_test_score, pre_test_total,
    test_score, test_total, video_completed, completed, completed_at
"#;

pub async fn insert_course(
    db: &PgPool,
    title: &str,
    description: Option<&str>,
    instructor_id: Uuid,
) -> anyhow::Result<Course> {
    let course = sqlx::query_as::<_, Course>(&format!(
        r#"
        WITH inserted AS (
            INSERT INTO courses (title, description, instructor_id)
            VALUES ($1, $2, $3)
            RETURNING *
        )
        SELECT {COURSE_COLUMNS}
        FROM inserted c
        JOIN users u ON u.id = c.instructor_id
        "#
    ))
    .bind(title)
    .bind(description)
    .bind(instructor_id)
    .fetch_one(db)
    .await
    .context("insert course")?;
    Ok(course)
}

pub async fn list_courses(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<Course>> {
    let rows = sqlx::query_as::<_, Course>(&format!(
        r#"
        SELECT {COURSE_COLUMNS}
        FROM courses c
        JOIN users u ON u.id = c.instructor_id
        ORDER BY c.created_at DESC
        LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list courses")?;
    Ok(rows)
}

pub async fn find_course(db: &PgPool, course_id: Uuid) -> anyhow::Result<Option<Course>> {
    let row = sqlx::query_as::<_, Course>(&format!(
        r#"
        SELECT {COURSE_COLUMNS}
        FROM courses c
        JOIN users u ON u.id = c.instructor_id
        WHERE c.id = $1
        "#
    ))
    .bind(course_id)
    .fetch_optional(db)
    .await
    .context("find course")?;
    Ok(row)
}

pub async fn list_modules(db: &PgPool, course_id: Uuid) -> anyhow::Result<Vec<CourseModule>> {
    let rows = sqlx::query_as::<_, CourseModule>(
        r#"
        SELECT id, course_id, title, position, has_pre_test, has_video, has_test
          FROM course_modules
         WHERE course_id = $1
         ORDER BY position ASC, created_at ASC
        "#,
    )
    .bind(course_id)
    .fetch_all(db)
    .await
    .context("list modules")?;
    Ok(rows)
}

pub async fn find_module(
    db: &PgPool,
    course_id: Uuid,
    module_id: Uuid,
) -> anyhow::Result<Option<CourseModule>> {
    let row = sqlx::query_as::<_, CourseModule>(
        r#"
        SELECT id, course_id, title, position, has_pre_test, has_video, has_test
          FROM course_modules
         WHERE course_id = $1 AND id = $2
        "#,
    )
    .bind(course_id)
    .bind(module_id)
    .fetch_optional(db)
    .await
    .context("find module")?;
    Ok(row)
}

/// Appends at the end of the course unless a position is given.
pub async fn insert_module(
    db: &PgPool,
    course_id: Uuid,
    req: &NewModuleRequest,
) -> anyhow::Result<CourseModule> {
    let row = sqlx::query_as::<_, CourseModule>(
        r#"
        INSERT INTO course_modules (course_id, title, position, has_pre_test, has_video, has_test)
        VALUES (
            $1, $2,
            COALESCE($3, (SELECT COALESCE(MAX(position), 0) + 1 FROM course_modules WHERE course_id = $1)),
            $4, $5, $6
        )
        RETURNING id, course_id, title, position, has_pre_test, has_video, has_test
        "#,
    )
    .bind(course_id)
    .bind(req.title.trim())
    .bind(req.position)
    .bind(req.has_pre_test)
    .bind(req.has_video)
    .bind(req.has_test)
    .fetch_one(db)
    .await
    .context("insert module")?;
    Ok(row)
}

pub async fn count_modules(db: &PgPool, course_id: Uuid) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_modules WHERE course_id = $1")
        .bind(course_id)
        .fetch_one(db)
        .await
        .context("count modules")?;
    Ok(n)
}

/// Idempotent: an existing enrollment is returned unchanged.
pub async fn enroll(db: &PgPool, user_id: Uuid, course_id: Uuid) -> anyhow::Result<Enrollment> {
    let row = sqlx::query_as::<_, Enrollment>(
        r#"
        INSERT INTO enrollments (user_id, course_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, course_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING id, user_id, course_id, enrolled_at
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(db)
    .await
    .context("enroll")?;
    Ok(row)
}

pub async fn is_enrolled(db: &PgPool, user_id: Uuid, course_id: Uuid) -> anyhow::Result<bool> {
    let found: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(db)
    .await
    .context("check enrollment")?;
    Ok(found)
}

pub async fn list_enrolled_courses(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<EnrolledCourse>> {
    let rows = sqlx::query_as::<_, EnrolledCourse>(
        r#"
        SELECT c.id AS course_id, c.title, u.name AS instructor_name, e.enrolled_at
          FROM enrollments e
          JOIN courses c ON c.id = e.course_id
          JOIN users u ON u.id = c.instructor_id
         WHERE e.user_id = $1
         ORDER BY e.enrolled_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list enrolled courses")?;
    Ok(rows)
}

pub async fn list_progress(
    db: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
) -> anyhow::Result<Vec<ModuleProgress>> {
    let rows = sqlx::query_as::<_, ModuleProgress>(&format!(
        r#"
        SELECT {PROGRESS_COLUMNS}
          FROM module_progress
         WHERE user_id = $1 AND course_id = $2
        "#
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_all(db)
    .await
    .context("list module progress")?;
    Ok(rows)
}

/// Creates the row on first interaction and locks it for the rest of `tx`.
pub async fn lock_progress_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    course_id: Uuid,
    module_id: Uuid,
) -> anyhow::Result<ModuleProgress> {
    sqlx::query(
        r#"
        INSERT INTO module_progress (user_id, course_id, module_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, course_id, module_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(module_id)
    .execute(&mut **tx)
    .await
    .context("ensure module progress")?;

    let row = sqlx::query_as::<_, ModuleProgress>(&format!(
        r#"
        SELECT {PROGRESS_COLUMNS}
          FROM module_progress
         WHERE user_id = $1 AND course_id = $2 AND module_id = $3
         FOR UPDATE
        "#
    ))
    .bind(user_id)
    .bind(course_id)
    .bind(module_id)
    .fetch_one(&mut **tx)
    .await
    .context("lock module progress")?;
    Ok(row)
}

pub async fn save_progress_tx(
    tx: &mut Transaction<'_, Postgres>,
    p: &ModuleProgress,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE module_progress
           SET pre_test_score = $2, pre_test_total = $3,
               test_score = $4, test_total = $5,
               video_completed = $6, completed = $7, completed_at = $8,
               updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(p.id)
    .bind(p.pre_test_score)
    .bind(p.pre_test_total)
    .bind(p.test_score)
    .bind(p.test_total)
    .bind(p.video_completed)
    .bind(p.completed)
    .bind(p.completed_at)
    .execute(&mut **tx)
    .await
    .context("save module progress")?;
    Ok(())
}
