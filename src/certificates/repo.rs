use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Certificate, CertificateDraft, VerifiedCertificate};
use super::services::CertificateStore;
use crate::courses::{repo as courses_repo, repo_types::Course};
use crate::learning::{codes, CodeKind, ModuleProgress};

const CERTIFICATE_COLUMNS: &str = r#"
    c.id, c.user_id, c.course_id, c.certificate_code, c.grade, c.score,
    c.completion_date, c.issued_at, c.instructor_name, c.course_title
"#;

pub async fn find_for_course(
    db: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
) -> anyhow::Result<Option<Certificate>> {
    let row = sqlx::query_as::<_, Certificate>(&format!(
        "SELECT {CERTIFICATE_COLUMNS} FROM certificates c WHERE c.user_id = $1 AND c.course_id = $2"
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(db)
    .await
    .context("find certificate")?;
    Ok(row)
}

/// Newest first.
pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Certificate>> {
    let rows = sqlx::query_as::<_, Certificate>(&format!(
        r#"
        SELECT {CERTIFICATE_COLUMNS}
          FROM certificates c
         WHERE c.user_id = $1
         ORDER BY c.issued_at DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list certificates")?;
    Ok(rows)
}

pub async fn find_by_code(db: &PgPool, code: &str) -> anyhow::Result<Option<VerifiedCertificate>> {
    let row = sqlx::query_as::<_, VerifiedCertificate>(&format!(
        r#"
        SELECT {CERTIFICATE_COLUMNS}, u.name AS holder_name
          FROM certificates c
          JOIN users u ON u.id = c.user_id
         WHERE c.certificate_code = $1
        "#
    ))
    .bind(code)
    .fetch_optional(db)
    .await
    .context("find certificate by code")?;
    Ok(row)
}

/// Allocates the code and inserts in one transaction. `None` when the
/// (user, course) pair already holds a certificate; the counter bump is
/// rolled back with it.
pub async fn insert(
    db: &PgPool,
    draft: &CertificateDraft,
    now: OffsetDateTime,
) -> anyhow::Result<Option<Certificate>> {
    let mut tx = db.begin().await.context("begin tx")?;
    let code = codes::allocate_tx(&mut tx, CodeKind::Certificate, now).await?;

    let row = sqlx::query_as::<_, Certificate>(&format!(
        r#"
        WITH inserted AS (
            INSERT INTO certificates (user_id, course_id, certificate_code, grade, score,
                                      completion_date, issued_at, instructor_name, course_title)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, course_id) DO NOTHING
            RETURNING *
        )
        SELECT {CERTIFICATE_COLUMNS} FROM inserted c
        "#
    ))
    .bind(draft.user_id)
    .bind(draft.course_id)
    .bind(&code)
    .bind(draft.grade.as_str())
    .bind(draft.score)
    .bind(draft.completion_date)
    .bind(now)
    .bind(&draft.instructor_name)
    .bind(&draft.course_title)
    .fetch_optional(&mut *tx)
    .await
    .context("insert certificate")?;

    match row {
        Some(cert) => {
            tx.commit().await.context("commit tx")?;
            Ok(Some(cert))
        }
        None => {
            tx.rollback().await.context("rollback tx")?;
            Ok(None)
        }
    }
}

#[async_trait]
impl CertificateStore for PgPool {
    async fn course(&self, course_id: Uuid) -> anyhow::Result<Option<Course>> {
        courses_repo::find_course(self, course_id).await
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

    async fn find_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> anyhow::Result<Option<Certificate>> {
        find_for_course(self, user_id, course_id).await
    }

    async fn insert_certificate(
        &self,
        draft: &CertificateDraft,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Certificate>> {
        insert(self, draft, now).await
    }
}
