use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One learner's state in one module of a course.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub module_id: Uuid,
    pub pre_test_score: Option<i32>,
    pub pre_test_total: Option<i32>,
    pub test_score: Option<i32>,
    pub test_total: Option<i32>,
    pub video_completed: bool,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl ModuleProgress {
    /// Test result as a percentage, when a scored test exists.
    pub fn test_percentage(&self) -> Option<f64> {
        match (self.test_score, self.test_total) {
            (Some(score), Some(total)) if total > 0 => Some(score as f64 / total as f64 * 100.0),
            _ => None,
        }
    }

    pub fn has_pre_test(&self) -> bool {
        self.pre_test_score.is_some()
    }
}

/// Steps a module asks of the learner before it counts as completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleGates {
    pub has_pre_test: bool,
    pub has_video: bool,
    pub has_test: bool,
}

impl ModuleGates {
    /// A module with no gates completes on first interaction.
    pub fn is_satisfied_by(&self, p: &ModuleProgress) -> bool {
        (!self.has_pre_test || p.pre_test_score.is_some())
            && (!self.has_video || p.video_completed)
            && (!self.has_test || p.test_score.is_some())
    }
}

/// Course-level view derived from a learner's module rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub total_modules: i64,
    pub completed_modules: i64,
    pub completion_percentage: i32,
    pub average_score: i32,
}

impl CourseProgress {
    pub fn is_complete(&self) -> bool {
        self.completion_percentage == 100
    }

    pub fn all_modules_completed(&self) -> bool {
        self.total_modules > 0 && self.completed_modules >= self.total_modules
    }
}

pub fn aggregate(rows: &[ModuleProgress], total_modules: i64) -> CourseProgress {
    let completed_modules = rows.iter().filter(|r| r.completed).count() as i64;

    let completion_percentage = if total_modules > 0 {
        (completed_modules as f64 / total_modules as f64 * 100.0).round() as i32
    } else {
        0
    };

    let scores: Vec<f64> = rows.iter().filter_map(ModuleProgress::test_percentage).collect();
    let average_score = if scores.is_empty() {
        0
    } else {
        (scores.iter().sum::<f64>() / scores.len() as f64).round() as i32
    };

    CourseProgress {
        total_modules,
        completed_modules,
        completion_percentage,
        average_score,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn row(completed: bool, test: Option<(i32, i32)>) -> ModuleProgress {
        ModuleProgress {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            course_id: Uuid::nil(),
            module_id: Uuid::new_v4(),
            pre_test_score: None,
            pre_test_total: None,
            test_score: test.map(|t| t.0),
            test_total: test.map(|t| t.1),
            video_completed: false,
            completed,
            completed_at: None,
        }
    }

    #[test]
    fn zero_modules_is_zero_percent() {
        let p = aggregate(&[], 0);
        assert_eq!(p.completion_percentage, 0);
        assert_eq!(p.average_score, 0);
        assert!(!p.all_modules_completed());
    }

    #[test]
    fn no_scored_tests_means_zero_average() {
        let rows = vec![row(true, None), row(true, None)];
        let p = aggregate(&rows, 2);
        assert_eq!(p.completion_percentage, 100);
        assert_eq!(p.average_score, 0);
    }

    #[test]
    fn average_of_percentages_is_rounded() {
        let rows = vec![row(true, Some((8, 10))), row(true, Some((9, 10))), row(true, None)];
        let p = aggregate(&rows, 3);
        assert_eq!(p.completed_modules, 3);
        assert_eq!(p.completion_percentage, 100);
        assert_eq!(p.average_score, 85);

        let rows = vec![row(true, Some((2, 3))), row(false, None)];
        let p = aggregate(&rows, 3);
        assert_eq!(p.completion_percentage, 33);
        assert_eq!(p.average_score, 67);
    }

    #[test]
    fn zero_total_test_is_ignored() {
        let rows = vec![row(true, Some((0, 0))), row(true, Some((5, 10)))];
        assert_eq!(aggregate(&rows, 2).average_score, 50);
    }

    #[test]
    fn gates() {
        let gates = ModuleGates { has_pre_test: false, has_video: true, has_test: true };
        let mut p = row(false, None);
        assert!(!gates.is_satisfied_by(&p));
        p.video_completed = true;
        assert!(!gates.is_satisfied_by(&p));
        p.test_score = Some(3);
        p.test_total = Some(5);
        assert!(gates.is_satisfied_by(&p));

        assert!(ModuleGates::default().is_satisfied_by(&row(false, None)));
    }

    #[test]
    fn serializes_camel_case_with_rfc3339_completion() {
        let mut p = row(true, Some((9, 10)));
        p.completed_at = Some(time::macros::datetime!(2026-10-05 10:00 UTC));
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["testScore"], 9);
        assert_eq!(v["videoCompleted"], false);
        assert_eq!(v["completedAt"], "2026-10-05T10:00:00Z");
    }
}
