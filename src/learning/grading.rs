use serde::{Serialize, Serializer};
use std::fmt;

/// Minimum average score that counts as a pass and unlocks a certificate.
pub const PASSING_SCORE: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    A,
    BPlus,
    B,
    CPlus,
    C,
    DPlus,
    D,
    F,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

const THRESHOLDS: [(f64, Grade); 7] = [
    (90.0, Grade::A),
    (80.0, Grade::BPlus),
    (75.0, Grade::B),
    (70.0, Grade::CPlus),
    (65.0, Grade::C),
    (60.0, Grade::DPlus),
    (55.0, Grade::D),
];

pub fn calculate_grade(score: f64) -> Grade {
    THRESHOLDS
        .iter()
        .find(|(min, _)| score >= *min)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::F)
}

pub fn is_passed(score: f64) -> bool {
    score >= PASSING_SCORE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        let cases = [
            (100.0, "A"),
            (90.0, "A"),
            (89.9, "B+"),
            (89.0, "B+"),
            (80.0, "B+"),
            (79.0, "B"),
            (75.0, "B"),
            (74.0, "C+"),
            (70.0, "C+"),
            (69.0, "C"),
            (65.0, "C"),
            (64.0, "D+"),
            (60.0, "D+"),
            (59.0, "D"),
            (55.0, "D"),
            (54.0, "F"),
            (0.0, "F"),
        ];
        for (score, expected) in cases {
            assert_eq!(calculate_grade(score).as_str(), expected, "score {}", score);
        }
    }

    #[test]
    fn grade_never_improves_as_score_drops() {
        let mut previous = calculate_grade(100.0);
        for tenth in (0..=1000).rev() {
            let grade = calculate_grade(tenth as f64 / 10.0);
            assert!(grade >= previous, "grade improved at {}", tenth);
            previous = grade;
        }
    }

    #[test]
    fn pass_threshold() {
        for (score, passed) in [
            (0.0, false),
            (54.0, false),
            (55.0, false),
            (69.0, false),
            (70.0, true),
            (70.5, true),
            (100.0, true),
        ] {
            assert_eq!(is_passed(score), passed, "score {}", score);
        }
    }

    #[test]
    fn serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Grade::BPlus).unwrap(), "\"B+\"");
    }
}
