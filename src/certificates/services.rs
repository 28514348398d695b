//! Certificate issuance: NOT_ELIGIBLE -> ELIGIBLE -> ISSUED, with no way back.

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo_types::{Certificate, CertificateDraft};
use crate::courses::repo_types::Course;
use crate::error::ApiError;
use crate::learning::{aggregate, calculate_grade, is_passed, CourseProgress, ModuleProgress};

/// Reads and writes the issuance workflow needs.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn course(&self, course_id: Uuid) -> anyhow::Result<Option<Course>>;

    /// Module count of the course and the learner's progress rows in it.
    async fn module_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> anyhow::Result<(i64, Vec<ModuleProgress>)>;

    async fn find_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> anyhow::Result<Option<Certificate>>;

    /// Returns `None` when (user, course) already has a certificate.
    async fn insert_certificate(
        &self,
        draft: &CertificateDraft,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Certificate>>;
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub completed_modules: i64,
    pub total_modules: i64,
    pub average_score: i32,
    pub eligible: bool,
}

impl From<CourseProgress> for Eligibility {
    fn from(p: CourseProgress) -> Self {
        Self {
            completed_modules: p.completed_modules,
            total_modules: p.total_modules,
            average_score: p.average_score,
            eligible: p.all_modules_completed() && is_passed(p.average_score as f64),
        }
    }
}

async fn require_course<S: CertificateStore + ?Sized>(
    store: &S,
    course_id: Uuid,
) -> Result<Course, ApiError> {
    store
        .course(course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))
}

pub async fn eligibility<S: CertificateStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Eligibility, ApiError> {
    let (total, rows) = store.module_progress(user_id, course_id).await?;
    Ok(aggregate(&rows, total).into())
}

/// Existing certificate and current eligibility for the course page.
pub async fn status<S: CertificateStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<(Option<Certificate>, Eligibility), ApiError> {
    require_course(store, course_id).await?;
    let certificate = store.find_certificate(user_id, course_id).await?;
    let eligibility = eligibility(store, user_id, course_id).await?;
    Ok((certificate, eligibility))
}

pub async fn issue<S: CertificateStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    course_id: Uuid,
    now: OffsetDateTime,
) -> Result<Certificate, ApiError> {
    let course = require_course(store, course_id).await?;
    let (total, rows) = store.module_progress(user_id, course_id).await?;
    let progress = aggregate(&rows, total);

    if !progress.all_modules_completed() {
        warn!(%user_id, %course_id, completed = progress.completed_modules, total, "certificate refused: incomplete");
        return Err(ApiError::IncompleteCourse {
            completed: progress.completed_modules,
            total,
        });
    }

    if !is_passed(progress.average_score as f64) {
        warn!(%user_id, %course_id, score = progress.average_score, "certificate refused: below passing");
        return Err(ApiError::BelowPassingThreshold {
            score: progress.average_score,
        });
    }

    if store.find_certificate(user_id, course_id).await?.is_some() {
        return Err(ApiError::AlreadyIssued);
    }

    let completion_date = rows
        .iter()
        .filter_map(|r| r.completed_at)
        .max()
        .unwrap_or(now);

    let draft = CertificateDraft {
        user_id,
        course_id,
        grade: calculate_grade(progress.average_score as f64),
        score: progress.average_score,
        completion_date,
        instructor_name: course.instructor_name,
        course_title: course.title,
    };

    // The unique (user, course) constraint settles concurrent requests that
    // both passed the check above.
    let certificate = store
        .insert_certificate(&draft, now)
        .await?
        .ok_or(ApiError::AlreadyIssued)?;

    info!(
        %user_id,
        %course_id,
        code = %certificate.certificate_code,
        grade = %certificate.grade,
        score = certificate.score,
        "certificate issued"
    );
    Ok(certificate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::codes::{format_code, period_of};
    use crate::learning::progress::tests::row;
    use crate::learning::CodeKind;
    use regex::Regex;
    use std::sync::Mutex;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-10-18 12:00 UTC);

    #[derive(Default)]
    struct FakeStore {
        course: Mutex<Option<Course>>,
        total_modules: i64,
        rows: Vec<ModuleProgress>,
        certificates: Mutex<Vec<Certificate>>,
        /// Simulates another request inserting between the check and the insert.
        lose_race: bool,
    }

    impl FakeStore {
        fn with_course(total_modules: i64, rows: Vec<ModuleProgress>) -> Self {
            Self {
                course: Mutex::new(Some(Course {
                    id: Uuid::nil(),
                    title: "Intro to Volunteering".into(),
                    description: None,
                    instructor_id: Uuid::new_v4(),
                    instructor_name: "Dr. Rivera".into(),
                    created_at: NOW,
                })),
                total_modules,
                rows,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CertificateStore for FakeStore {
        async fn course(&self, _course_id: Uuid) -> anyhow::Result<Option<Course>> {
            Ok(self.course.lock().unwrap().clone())
        }

        async fn module_progress(
            &self,
            _user_id: Uuid,
            _course_id: Uuid,
        ) -> anyhow::Result<(i64, Vec<ModuleProgress>)> {
            Ok((self.total_modules, self.rows.clone()))
        }

        async fn find_certificate(
            &self,
            user_id: Uuid,
            course_id: Uuid,
        ) -> anyhow::Result<Option<Certificate>> {
            Ok(self
                .certificates
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.user_id == user_id && c.course_id == course_id)
                .cloned())
        }

        async fn insert_certificate(
            &self,
            draft: &CertificateDraft,
            now: OffsetDateTime,
        ) -> anyhow::Result<Option<Certificate>> {
            if self.lose_race {
                return Ok(None);
            }
            let mut certs = self.certificates.lock().unwrap();
            let cert = Certificate {
                id: Uuid::new_v4(),
                user_id: draft.user_id,
                course_id: draft.course_id,
                certificate_code: format_code(
                    CodeKind::Certificate,
                    &period_of(now),
                    certs.len() as i32 + 1,
                ),
                grade: draft.grade.to_string(),
                score: draft.score,
                completion_date: draft.completion_date,
                issued_at: now,
                instructor_name: draft.instructor_name.clone(),
                course_title: draft.course_title.clone(),
            };
            certs.push(cert.clone());
            Ok(Some(cert))
        }
    }

    fn passing_store() -> FakeStore {
        FakeStore::with_course(
            3,
            vec![row(true, Some((8, 10))), row(true, Some((9, 10))), row(true, None)],
        )
    }

    #[tokio::test]
    async fn issues_certificate_for_completed_passing_course() {
        let store = passing_store();
        let user = Uuid::new_v4();
        let cert = issue(&store, user, Uuid::nil(), NOW).await.expect("issued");

        assert_eq!(cert.score, 85);
        assert_eq!(cert.grade, "B+");
        assert_eq!(cert.course_title, "Intro to Volunteering");
        assert_eq!(cert.instructor_name, "Dr. Rivera");
        assert!(Regex::new(r"^CERT-\d{6}-\d{4}$").unwrap().is_match(&cert.certificate_code));
        assert_eq!(cert.certificate_code, "CERT-202610-0001");
    }

    #[tokio::test]
    async fn rejects_incomplete_course_even_with_passing_score() {
        let store = FakeStore::with_course(
            3,
            vec![row(true, Some((10, 10))), row(true, Some((9, 10))), row(false, None)],
        );
        let err = issue(&store, Uuid::new_v4(), Uuid::nil(), NOW).await.unwrap_err();
        assert!(matches!(err, ApiError::IncompleteCourse { completed: 2, total: 3 }));
        assert!(err.to_string().contains("2 out of 3"));
    }

    #[tokio::test]
    async fn rejects_course_without_modules() {
        let store = FakeStore::with_course(0, Vec::new());
        let err = issue(&store, Uuid::new_v4(), Uuid::nil(), NOW).await.unwrap_err();
        assert!(matches!(err, ApiError::IncompleteCourse { completed: 0, total: 0 }));
    }

    #[tokio::test]
    async fn rejects_below_passing_average() {
        let store = FakeStore::with_course(2, vec![row(true, Some((6, 10))), row(true, Some((7, 10)))]);
        let err = issue(&store, Uuid::new_v4(), Uuid::nil(), NOW).await.unwrap_err();
        assert!(matches!(err, ApiError::BelowPassingThreshold { score: 65 }));
    }

    #[tokio::test]
    async fn second_attempt_is_already_issued() {
        let store = passing_store();
        let user = Uuid::new_v4();
        issue(&store, user, Uuid::nil(), NOW).await.expect("first issuance");
        let err = issue(&store, user, Uuid::nil(), NOW).await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyIssued));
        assert_eq!(store.certificates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lost_insert_race_is_already_issued() {
        let mut store = passing_store();
        store.lose_race = true;
        let err = issue(&store, Uuid::new_v4(), Uuid::nil(), NOW).await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyIssued));
    }

    #[tokio::test]
    async fn missing_course_is_not_found() {
        let store = FakeStore::default();
        let err = issue(&store, Uuid::new_v4(), Uuid::nil(), NOW).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn renaming_course_does_not_touch_issued_certificate() {
        let store = passing_store();
        let user = Uuid::new_v4();
        issue(&store, user, Uuid::nil(), NOW).await.unwrap();

        if let Some(course) = store.course.lock().unwrap().as_mut() {
            course.title = "Renamed".into();
            course.instructor_name = "Someone Else".into();
        }

        let (cert, _) = status(&store, user, Uuid::nil()).await.unwrap();
        let cert = cert.expect("certificate present");
        assert_eq!(cert.course_title, "Intro to Volunteering");
        assert_eq!(cert.instructor_name, "Dr. Rivera");
    }

    #[tokio::test]
    async fn completion_date_is_last_module_completion() {
        let mut rows = vec![row(true, Some((9, 10))), row(true, Some((9, 10)))];
        rows[0].completed_at = Some(datetime!(2026-10-01 10:00 UTC));
        rows[1].completed_at = Some(datetime!(2026-10-05 10:00 UTC));
        let store = FakeStore::with_course(2, rows);
        let cert = issue(&store, Uuid::new_v4(), Uuid::nil(), NOW).await.unwrap();
        assert_eq!(cert.completion_date, datetime!(2026-10-05 10:00 UTC));
        assert_eq!(cert.issued_at, NOW);
    }

    #[tokio::test]
    async fn eligibility_reflects_progress() {
        let store = FakeStore::with_course(3, vec![row(true, Some((8, 10)))]);
        let e = eligibility(&store, Uuid::new_v4(), Uuid::nil()).await.unwrap();
        assert_eq!(e.completed_modules, 1);
        assert_eq!(e.total_modules, 3);
        assert_eq!(e.average_score, 80);
        assert!(!e.eligible);

        let e = eligibility(&passing_store(), Uuid::new_v4(), Uuid::nil()).await.unwrap();
        assert!(e.eligible);
    }
}
