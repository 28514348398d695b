//! Transcript snapshots. A transcript is written once and never updated;
//! expiry is computed when it is read.

use std::collections::HashMap;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use super::dto::GenerateTranscriptRequest;
use super::repo_types::{
    ActivityRecord, AwardedSkill, CourseRecord, Snapshot, Transcript, TranscriptDraft,
    TranscriptTotals,
};
use crate::activities::dto::SkillSummary;
use crate::activities::repo_types::{ActivitySkill, ParticipationRecord, SkillTotal};
use crate::certificates::repo_types::Certificate;
use crate::courses::repo_types::EnrolledCourse;
use crate::error::ApiError;
use crate::learning::{aggregate, ModuleProgress};

pub const VALID_DAYS: [i64; 3] = [30, 90, 180];

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn enrolled_courses(&self, user_id: Uuid) -> anyhow::Result<Vec<EnrolledCourse>>;

    async fn module_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> anyhow::Result<(i64, Vec<ModuleProgress>)>;

    async fn certificates(&self, user_id: Uuid) -> anyhow::Result<Vec<Certificate>>;

    async fn participations(&self, user_id: Uuid) -> anyhow::Result<Vec<ParticipationRecord>>;

    async fn participation_skills(&self, user_id: Uuid) -> anyhow::Result<Vec<ActivitySkill>>;

    async fn skill_totals(&self, user_id: Uuid) -> anyhow::Result<Vec<SkillTotal>>;

    async fn insert_transcript(
        &self,
        draft: &TranscriptDraft,
        now: OffsetDateTime,
    ) -> anyhow::Result<Transcript>;
}

/// Reads the user's courses, activities and skills into one snapshot.
pub async fn collect_snapshot<S: TranscriptStore + ?Sized>(
    store: &S,
    user_id: Uuid,
) -> anyhow::Result<Snapshot> {
    let certificate_codes: HashMap<Uuid, String> = store
        .certificates(user_id)
        .await?
        .into_iter()
        .map(|c| (c.course_id, c.certificate_code))
        .collect();

    let mut courses = Vec::new();
    for enrolled in store.enrolled_courses(user_id).await? {
        let (total, rows) = store.module_progress(user_id, enrolled.course_id).await?;
        let progress = aggregate(&rows, total);
        courses.push(CourseRecord {
            certificate_code: certificate_codes.get(&enrolled.course_id).cloned(),
            course_id: enrolled.course_id,
            title: enrolled.title,
            instructor_name: enrolled.instructor_name,
            enrolled_at: enrolled.enrolled_at,
            total_modules: progress.total_modules,
            completed_modules: progress.completed_modules,
            completion_percentage: progress.completion_percentage,
            average_score: progress.average_score,
            completed: progress.is_complete(),
        });
    }

    let mut awarded: HashMap<Uuid, Vec<AwardedSkill>> = HashMap::new();
    for s in store.participation_skills(user_id).await? {
        awarded.entry(s.activity_id).or_default().push(AwardedSkill {
            code: s.code,
            name: s.name,
            points: s.points,
        });
    }

    let activities: Vec<ActivityRecord> = store
        .participations(user_id)
        .await?
        .into_iter()
        .map(|p| ActivityRecord {
            skills: awarded.remove(&p.activity_id).unwrap_or_default(),
            activity_id: p.activity_id,
            title: p.title,
            starts_at: p.starts_at,
            ends_at: p.ends_at,
            volunteer_hours: p.volunteer_hours,
            checked_in: p.checked_in,
            checked_in_at: p.checked_in_at,
        })
        .collect();

    let skills: Vec<SkillSummary> = store
        .skill_totals(user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let totals = TranscriptTotals {
        total_courses: courses.len() as i32,
        completed_courses: courses.iter().filter(|c| c.completed).count() as i32,
        total_activities: activities.len() as i32,
        total_volunteer_hours: activities.iter().map(|a| a.volunteer_hours).sum(),
        total_skills: skills.len() as i32,
    };

    Ok(Snapshot {
        courses,
        activities,
        skills,
        totals,
    })
}

/// `None` means the transcript never expires.
pub fn valid_until(
    valid_days: Option<i64>,
    now: OffsetDateTime,
) -> Result<Option<OffsetDateTime>, ApiError> {
    match valid_days {
        None => Ok(None),
        Some(days) if VALID_DAYS.contains(&days) => Ok(Some(now + Duration::days(days))),
        Some(_) => Err(ApiError::validation("validDays must be 30, 90, 180 or null")),
    }
}

pub fn normalize_purpose(purpose: Option<&str>) -> Option<String> {
    purpose
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
}

pub fn is_expired(valid_until: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    valid_until.is_some_and(|until| until < now)
}

pub async fn generate<S: TranscriptStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    req: &GenerateTranscriptRequest,
    now: OffsetDateTime,
) -> Result<Transcript, ApiError> {
    let valid_until = valid_until(req.valid_days, now)?;
    let snapshot = collect_snapshot(store, user_id).await?;
    let draft = TranscriptDraft {
        user_id,
        purpose: normalize_purpose(req.purpose.as_deref()),
        valid_until,
        snapshot,
    };

    let transcript = store.insert_transcript(&draft, now).await?;
    info!(
        %user_id,
        code = %transcript.transcript_code,
        courses = transcript.total_courses,
        activities = transcript.total_activities,
        "transcript generated"
    );
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::codes::{format_code, period_of};
    use crate::learning::progress::tests::row;
    use crate::learning::CodeKind;
    use serde_json::json;
    use std::sync::Mutex;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-10-18 12:00 UTC);

    #[derive(Default)]
    struct FakeStore {
        enrolled: Vec<EnrolledCourse>,
        progress: HashMap<Uuid, (i64, Vec<ModuleProgress>)>,
        certificates: Vec<Certificate>,
        participations: Vec<ParticipationRecord>,
        participation_skills: Vec<ActivitySkill>,
        skill_totals: Vec<SkillTotal>,
        inserted: Mutex<Vec<Transcript>>,
    }

    #[async_trait]
    impl TranscriptStore for FakeStore {
        async fn enrolled_courses(&self, _: Uuid) -> anyhow::Result<Vec<EnrolledCourse>> {
            Ok(self.enrolled.clone())
        }

        async fn module_progress(
            &self,
            _: Uuid,
            course_id: Uuid,
        ) -> anyhow::Result<(i64, Vec<ModuleProgress>)> {
            Ok(self.progress.get(&course_id).cloned().unwrap_or_default())
        }

        async fn certificates(&self, _: Uuid) -> anyhow::Result<Vec<Certificate>> {
            Ok(self.certificates.clone())
        }

        async fn participations(&self, _: Uuid) -> anyhow::Result<Vec<ParticipationRecord>> {
            Ok(self.participations.clone())
        }

        async fn participation_skills(&self, _: Uuid) -> anyhow::Result<Vec<ActivitySkill>> {
            Ok(self.participation_skills.clone())
        }

        async fn skill_totals(&self, _: Uuid) -> anyhow::Result<Vec<SkillTotal>> {
            Ok(self.skill_totals.clone())
        }

        async fn insert_transcript(
            &self,
            draft: &TranscriptDraft,
            now: OffsetDateTime,
        ) -> anyhow::Result<Transcript> {
            let mut inserted = self.inserted.lock().unwrap();
            let s = &draft.snapshot;
            let t = Transcript {
                id: Uuid::new_v4(),
                user_id: draft.user_id,
                transcript_code: format_code(
                    CodeKind::Transcript,
                    &period_of(now),
                    inserted.len() as i32 + 1,
                ),
                courses_data: serde_json::to_value(&s.courses)?,
                activities_data: serde_json::to_value(&s.activities)?,
                skills_data: serde_json::to_value(&s.skills)?,
                total_courses: s.totals.total_courses,
                completed_courses: s.totals.completed_courses,
                total_activities: s.totals.total_activities,
                total_volunteer_hours: s.totals.total_volunteer_hours,
                total_skills: s.totals.total_skills,
                purpose: draft.purpose.clone(),
                generated_at: now,
                valid_until: draft.valid_until,
            };
            inserted.push(t.clone());
            Ok(t)
        }
    }

    fn enrolled(title: &str) -> EnrolledCourse {
        EnrolledCourse {
            course_id: Uuid::new_v4(),
            title: title.into(),
            instructor_name: "Dr. Rivera".into(),
            enrolled_at: datetime!(2026-09-01 08:00 UTC),
        }
    }

    fn participation(activity_id: Uuid, hours: f64, checked_in: bool) -> ParticipationRecord {
        ParticipationRecord {
            activity_id,
            title: "Beach cleanup".into(),
            starts_at: datetime!(2026-09-10 09:00 UTC),
            ends_at: datetime!(2026-09-10 12:00 UTC),
            volunteer_hours: hours,
            checked_in,
            checked_in_at: checked_in.then_some(datetime!(2026-09-10 09:05 UTC)),
        }
    }

    fn request(purpose: Option<&str>, valid_days: Option<i64>) -> GenerateTranscriptRequest {
        GenerateTranscriptRequest {
            purpose: purpose.map(str::to_owned),
            valid_days,
        }
    }

    #[tokio::test]
    async fn empty_user_gets_empty_snapshot() {
        let snapshot = collect_snapshot(&FakeStore::default(), Uuid::new_v4())
            .await
            .expect("snapshot");
        assert!(snapshot.courses.is_empty());
        assert!(snapshot.activities.is_empty());
        assert!(snapshot.skills.is_empty());
        assert_eq!(snapshot.totals, TranscriptTotals::default());
    }

    #[tokio::test]
    async fn snapshot_aggregates_courses_activities_and_skills() {
        let done = enrolled("First Aid");
        let partial = enrolled("Leadership");
        let beach = Uuid::new_v4();
        let park = Uuid::new_v4();

        let mut store = FakeStore::default();
        store.progress.insert(
            done.course_id,
            (2, vec![row(true, Some((8, 10))), row(true, Some((9, 10)))]),
        );
        store
            .progress
            .insert(partial.course_id, (4, vec![row(true, Some((6, 10)))]));
        store.certificates.push(Certificate {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            course_id: done.course_id,
            certificate_code: "CERT-202610-0001".into(),
            grade: "B+".into(),
            score: 85,
            completion_date: NOW,
            issued_at: NOW,
            instructor_name: "Dr. Rivera".into(),
            course_title: "First Aid".into(),
        });
        store.enrolled = vec![done.clone(), partial.clone()];
        store.participations = vec![participation(beach, 3.0, true), participation(park, 2.5, false)];
        store.participation_skills = vec![ActivitySkill {
            activity_id: beach,
            skill_id: Uuid::new_v4(),
            code: "TEAM".into(),
            name: "Teamwork".into(),
            points: 40,
        }];
        store.skill_totals = vec![SkillTotal {
            code: "TEAM".into(),
            name: "Teamwork".into(),
            color: "#22c55e".into(),
            total_points: 160,
        }];

        let s = collect_snapshot(&store, Uuid::new_v4()).await.unwrap();

        assert_eq!(s.courses.len(), 2);
        let first = &s.courses[0];
        assert!(first.completed);
        assert_eq!(first.average_score, 85);
        assert_eq!(first.certificate_code.as_deref(), Some("CERT-202610-0001"));
        let second = &s.courses[1];
        assert!(!second.completed);
        assert_eq!(second.completion_percentage, 25);
        assert_eq!(second.certificate_code, None);

        assert_eq!(s.activities[0].skills.len(), 1);
        assert!(s.activities[1].skills.is_empty());
        assert_eq!(s.skills[0].level, 3);

        assert_eq!(
            s.totals,
            TranscriptTotals {
                total_courses: 2,
                completed_courses: 1,
                total_activities: 2,
                total_volunteer_hours: 5.5,
                total_skills: 1,
            }
        );
    }

    #[tokio::test]
    async fn generate_freezes_snapshot_and_options() {
        let store = FakeStore {
            enrolled: vec![enrolled("First Aid")],
            ..Default::default()
        };
        let t = generate(&store, Uuid::new_v4(), &request(Some("  job application "), Some(90)), NOW)
            .await
            .expect("generated");

        assert_eq!(t.transcript_code, "TRANS-202610-0001");
        assert_eq!(t.purpose.as_deref(), Some("job application"));
        assert_eq!(t.valid_until, Some(NOW + Duration::days(90)));
        assert_eq!(t.total_courses, 1);
        assert_eq!(t.courses_data[0]["title"], json!("First Aid"));
        assert_eq!(t.courses_data[0]["completionPercentage"], json!(0));

        let second = generate(&store, Uuid::new_v4(), &request(None, None), NOW).await.unwrap();
        assert_eq!(second.transcript_code, "TRANS-202610-0002");
        assert_eq!(second.valid_until, None);
    }

    #[tokio::test]
    async fn generate_rejects_unknown_validity() {
        let store = FakeStore::default();
        let err = generate(&store, Uuid::new_v4(), &request(None, Some(45)), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(store.inserted.lock().unwrap().is_empty());
    }

    #[test]
    fn blank_purpose_becomes_none() {
        assert_eq!(normalize_purpose(Some("   ")), None);
        assert_eq!(normalize_purpose(None), None);
        assert_eq!(normalize_purpose(Some(" visa ")).as_deref(), Some("visa"));
    }

    #[test]
    fn expiry_is_computed_against_now() {
        assert!(!is_expired(None, NOW));
        assert!(is_expired(Some(NOW - Duration::days(1)), NOW));
        assert!(!is_expired(Some(NOW + Duration::days(1)), NOW));
        assert!(!is_expired(Some(NOW), NOW));
    }
}
