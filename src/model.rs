//! Grade data model.
//!
//! Every fetch builds a fresh immutable tree of these values; nothing here is
//! mutated after construction. Internally computed numbers and the numbers the
//! portal reports about itself are kept side by side as two independent truth
//! sources.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A grading quarter (marking period).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// All quarters in school-year order.
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
            Quarter::Q4 => 4,
        }
    }

    /// Parse a label like `"Q2"` (case-insensitive).
    pub fn parse(s: &str) -> Option<Quarter> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Q1" | "1" => Some(Quarter::Q1),
            "Q2" | "2" => Some(Quarter::Q2),
            "Q3" | "3" => Some(Quarter::Q3),
            "Q4" | "4" => Some(Quarter::Q4),
            _ => None,
        }
    }

    /// Parse a report-card-run dropdown value like `"2-2026"`.
    ///
    /// Returns the quarter together with the school year encoded in the value.
    pub fn from_dropdown_value(value: &str) -> Option<(Quarter, Option<u16>)> {
        let mut parts = value.splitn(2, '-');
        let quarter = Quarter::parse(parts.next()?)?;
        let year = parts.next().and_then(|y| y.trim().parse().ok());
        Some((quarter, year))
    }

    /// The dropdown value for this quarter in a given school year.
    pub fn dropdown_value(&self, school_year: u16) -> String {
        format!("{}-{}", self.number(), school_year)
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three fixed grading buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    Practice,
    Process,
    Product,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Practice, Category::Process, Category::Product];

    /// Fixed relative weight of this category in the overall grade.
    pub fn weight(&self) -> f64 {
        match self {
            Category::Practice => 0.20,
            Category::Process => 0.30,
            Category::Product => 0.50,
        }
    }

    /// Match a raw category label from the portal (case-insensitive).
    pub fn from_label(label: &str) -> Option<Category> {
        match label.trim().to_ascii_uppercase().as_str() {
            "PRACTICE" => Some(Category::Practice),
            "PROCESS" => Some(Category::Process),
            "PRODUCT" => Some(Category::Product),
            _ => None,
        }
    }
}

/// Status of a single assignment, derived from its raw score text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignmentStatus {
    Scored,
    NotHandedIn,
    NotYetGraded,
    TooLateToCount,
    ScoreBelowFifty,
    Exempt,
}

/// A single assignment row.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub title: String,
    pub due_date: String,
    pub assigned_date: String,
    pub category: String,
    pub raw_score: String,
    pub score: Option<f64>,
    pub total_points: Option<f64>,
    /// Present only when both score and total points are present and
    /// total points > 0.
    pub percentage: Option<f64>,
    pub status: AssignmentStatus,
}

/// Accumulated points for one category.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CategoryStats {
    pub earned: f64,
    pub possible: f64,
    /// None when no possible points were accumulated.
    pub percentage: Option<f64>,
}

/// Earned/possible accumulation across the three categories.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CategoryBreakdown {
    pub practice: CategoryStats,
    pub process: CategoryStats,
    pub product: CategoryStats,
}

impl CategoryBreakdown {
    pub fn get(&self, category: Category) -> &CategoryStats {
        match category {
            Category::Practice => &self.practice,
            Category::Process => &self.process,
            Category::Product => &self.product,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut CategoryStats {
        match category {
            Category::Practice => &mut self.practice,
            Category::Process => &mut self.process,
            Category::Product => &mut self.product,
        }
    }
}

/// One row of the portal's own category table, kept as raw text.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedCategory {
    pub category: String,
    pub points_earned: String,
    pub points_possible: String,
    pub percentage: String,
    pub weight: String,
    pub weighted_average: Option<String>,
}

/// A single course within one quarter.
#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub name: String,
    /// Stable 0-based slot index within the rendered document.
    pub course_index: usize,
    pub total_assignments: usize,
    pub not_handed_in: usize,
    pub not_yet_graded: usize,
    pub too_late_to_count: usize,
    pub score_below_fifty: usize,
    /// Weighted percentage computed from the assignment rows.
    pub overall_percentage: Option<f64>,
    /// The portal's own reported numbers; never reconciled with ours.
    pub reported_percentage: Option<f64>,
    pub reported_points_earned: Option<String>,
    pub reported_points_possible: Option<String>,
    pub reported_categories: Vec<ReportedCategory>,
    pub assignments: Vec<Assignment>,
    pub category_breakdown: CategoryBreakdown,
    pub last_updated: Option<NaiveDate>,
    pub days_since_update: Option<i64>,
}

impl Course {
    /// A placeholder for a roster entry with no graded work yet: all counters
    /// at zero, everything else empty or None.
    pub fn placeholder(name: impl Into<String>, course_index: usize) -> Self {
        Course {
            name: name.into(),
            course_index,
            total_assignments: 0,
            not_handed_in: 0,
            not_yet_graded: 0,
            too_late_to_count: 0,
            score_below_fifty: 0,
            overall_percentage: None,
            reported_percentage: None,
            reported_points_earned: None,
            reported_points_possible: None,
            reported_categories: Vec::new(),
            assignments: Vec::new(),
            category_breakdown: CategoryBreakdown::default(),
            last_updated: None,
            days_since_update: None,
        }
    }
}

/// Cross-course aggregates for one quarter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeriodSummary {
    pub course_count: usize,
    /// Arithmetic mean of computed course percentages (null-valued courses
    /// excluded, not treated as zero).
    pub average_percentage: Option<f64>,
    /// Mean weighted by each course's reported possible points.
    pub weighted_average_percentage: Option<f64>,
    pub latest_update_date: Option<NaiveDate>,
    pub days_since_latest_update: Option<i64>,
}

/// All courses of one quarter, in roster order, plus the summary.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodResult {
    pub courses: Vec<Course>,
    pub summary: PeriodSummary,
}

/// The full multi-quarter result of one orchestrated fetch.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    /// Quarters that could be fetched; a failing quarter is simply absent.
    pub quarters: BTreeMap<Quarter, PeriodResult>,
    /// Always timezone-aware.
    pub fetched_at: DateTime<Utc>,
    /// The resolved student id for the subject that was fetched.
    pub student_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_parse_and_display() {
        assert_eq!(Quarter::parse("q3"), Some(Quarter::Q3));
        assert_eq!(Quarter::parse("Q2"), Some(Quarter::Q2));
        assert_eq!(Quarter::parse("Q5"), None);
        assert_eq!(Quarter::Q4.to_string(), "Q4");
    }

    #[test]
    fn quarter_dropdown_round_trip() {
        assert_eq!(
            Quarter::from_dropdown_value("2-2026"),
            Some((Quarter::Q2, Some(2026)))
        );
        assert_eq!(Quarter::from_dropdown_value("junk"), None);
        assert_eq!(Quarter::Q3.dropdown_value(2026), "3-2026");
    }

    #[test]
    fn category_labels_and_weights() {
        assert_eq!(Category::from_label(" practice "), Some(Category::Practice));
        assert_eq!(Category::from_label("Homework"), None);
        let total: f64 = Category::ALL.iter().map(|c| c.weight()).sum();
        assert!((total - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn placeholder_course_is_zero_valued() {
        let course = Course::placeholder("2 Spanish II", 3);
        assert_eq!(course.course_index, 3);
        assert_eq!(course.total_assignments, 0);
        assert!(course.overall_percentage.is_none());
        assert!(course.assignments.is_empty());
        assert!(course.category_breakdown.practice.percentage.is_none());
    }
}
