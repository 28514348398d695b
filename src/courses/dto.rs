use serde::{Deserialize, Serialize};

use super::repo_types::{Course, CourseModule, EnrolledCourse, Enrollment};
use crate::learning::{CourseProgress, ModuleProgress};

#[derive(Debug, Deserialize)]
pub struct NewCourseRequest {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewModuleRequest {
    pub title: String,
    pub position: Option<i32>,
    #[serde(default)]
    pub has_pre_test: bool,
    #[serde(default)]
    pub has_video: bool,
    #[serde(default)]
    pub has_test: bool,
}

/// Body of pre-test and test submissions.
#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub score: i32,
    pub total: i32,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 20 }

#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub success: bool,
    pub courses: Vec<Course>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetails {
    #[serde(flatten)]
    pub course: Course,
    pub modules: Vec<CourseModule>,
}

#[derive(Debug, Serialize)]
pub struct CourseResponse {
    pub success: bool,
    pub course: CourseDetails,
}

#[derive(Debug, Serialize)]
pub struct ModuleResponse {
    pub success: bool,
    pub module: CourseModule,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub success: bool,
    pub enrollment: Enrollment,
}

#[derive(Debug, Serialize)]
pub struct EnrolledCoursesResponse {
    pub success: bool,
    pub courses: Vec<EnrolledCourse>,
}

#[derive(Debug, Serialize)]
pub struct ModuleProgressResponse {
    pub success: bool,
    pub progress: ModuleProgress,
}

#[derive(Debug, Serialize)]
pub struct CourseProgressView {
    #[serde(flatten)]
    pub summary: CourseProgress,
    pub modules: Vec<ModuleProgress>,
}

#[derive(Debug, Serialize)]
pub struct CourseProgressResponse {
    pub success: bool,
    pub progress: CourseProgressView,
}
