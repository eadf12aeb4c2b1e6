//! Flattened presentation metadata for downstream dashboard tooling.
//!
//! Exports a per-student registry of the courses seen in every quarter, with
//! display names cleaned of course codes and leading period numbers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{FetchResult, Quarter};

/// Strip the course code and the leading period number from a portal course
/// name: `"AR017C - 1 Art 7"` becomes `"Art 7"`.
pub fn clean_course_name(name: &str) -> String {
    let name = match name.rsplit_once(" - ") {
        Some((_, tail)) => tail.trim(),
        None => name.trim(),
    };
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) => {
            rest.trim_start().to_string()
        }
        _ => name.to_string(),
    }
}

/// Identifier-safe form of a cleaned name: lowercase, spaces to underscores,
/// everything else except alphanumerics dropped.
pub fn slug(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseEntry {
    pub clean_name: String,
    pub display_name: String,
    pub original_name: String,
    pub course_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuarterCourses {
    pub course_count: usize,
    pub courses: Vec<CourseEntry>,
}

/// One student's course registry across all fetched quarters.
#[derive(Debug, Clone, Serialize)]
pub struct StudentRegistry {
    pub student_id: String,
    pub quarters: BTreeMap<Quarter, QuarterCourses>,
    pub last_updated: DateTime<Utc>,
}

/// Flatten a fetch result into the registry the dashboard generator reads.
pub fn build_registry(result: &FetchResult) -> StudentRegistry {
    let quarters = result
        .quarters
        .iter()
        .map(|(quarter, period)| {
            let courses: Vec<CourseEntry> = period
                .courses
                .iter()
                .map(|course| {
                    let display_name = clean_course_name(&course.name);
                    CourseEntry {
                        clean_name: slug(&display_name),
                        display_name,
                        original_name: course.name.clone(),
                        course_index: course.course_index,
                    }
                })
                .collect();
            (
                *quarter,
                QuarterCourses {
                    course_count: courses.len(),
                    courses,
                },
            )
        })
        .collect();

    StudentRegistry {
        student_id: result
            .student_id
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        quarters,
        last_updated: result.fetched_at,
    }
}
