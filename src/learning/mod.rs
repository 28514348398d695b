//! Pure building blocks shared by courses, certificates and transcripts.

pub mod codes;
pub mod grading;
pub mod progress;

pub use codes::CodeKind;
pub use grading::{calculate_grade, is_passed, Grade};
pub use progress::{aggregate, CourseProgress, ModuleGates, ModuleProgress};
