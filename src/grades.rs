//! Grade computation engine.
//!
//! Pure functions over extracted assignment records: status classification,
//! per-category accumulation, the weighted overall percentage and the
//! cross-course quarter summary.

use chrono::NaiveDate;

use crate::model::{
    Assignment, AssignmentStatus, Category, CategoryBreakdown, Course, PeriodSummary,
};

/// Round to 2 decimals, the precision every derived percentage carries.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

type StatusRule = (fn(&str) -> bool, AssignmentStatus);

/// Raw-score classification, first match wins. Explicit status markers are
/// checked before any numeric parsing; keep this list in precedence order.
const STATUS_RULES: [StatusRule; 5] = [
    (|s: &str| s.contains("NHI"), AssignmentStatus::NotHandedIn),
    (|s: &str| s.contains("TLTC"), AssignmentStatus::TooLateToCount),
    (|s: &str| s.contains('X'), AssignmentStatus::Exempt),
    (|s: &str| s.contains("SBF"), AssignmentStatus::ScoreBelowFifty),
    (
        |s: &str| s.contains("NYG") || s.is_empty(),
        AssignmentStatus::NotYetGraded,
    ),
];

/// Derive an assignment's status from its raw score text.
pub fn classify_raw_score(raw: &str) -> AssignmentStatus {
    let upper = raw.trim().to_ascii_uppercase();
    for (matches, status) in STATUS_RULES {
        if matches(&upper) {
            return status;
        }
    }
    if upper.parse::<f64>().is_ok() {
        AssignmentStatus::Scored
    } else {
        AssignmentStatus::NotYetGraded
    }
}

fn contributes(status: AssignmentStatus) -> bool {
    matches!(
        status,
        AssignmentStatus::Scored
            | AssignmentStatus::NotHandedIn
            | AssignmentStatus::ScoreBelowFifty
            | AssignmentStatus::TooLateToCount
    )
}

/// Accumulate earned/possible points per category.
///
/// NotYetGraded and Exempt assignments contribute nothing; a category with
/// zero possible points gets a null percentage.
pub fn category_stats(assignments: &[Assignment]) -> CategoryBreakdown {
    let mut breakdown = CategoryBreakdown::default();

    for assignment in assignments {
        let Some(category) = Category::from_label(&assignment.category) else {
            continue;
        };
        if !contributes(assignment.status) {
            continue;
        }
        let stats = breakdown.get_mut(category);
        if let Some(score) = assignment.score {
            stats.earned += score;
        }
        if let Some(total) = assignment.total_points {
            if total > 0.0 {
                stats.possible += total;
            }
        }
    }

    for category in Category::ALL {
        let stats = breakdown.get_mut(category);
        stats.percentage = if stats.possible > 0.0 {
            Some(round2(stats.earned / stats.possible * 100.0))
        } else {
            None
        };
    }

    breakdown
}

/// Weighted overall percentage across the categories that contributed.
///
/// Each category's fractional score is weighted by its fixed weight; weights
/// of empty categories are excluded from the denominator. None when no
/// category has possible points.
pub fn weighted_overall(breakdown: &CategoryBreakdown) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for category in Category::ALL {
        let stats = breakdown.get(category);
        if stats.possible > 0.0 {
            weighted_sum += stats.earned / stats.possible * category.weight();
            total_weight += category.weight();
        }
    }

    if total_weight > 0.0 {
        Some(round2(weighted_sum / total_weight * 100.0))
    } else {
        None
    }
}

/// Cross-course aggregates for one quarter.
///
/// Courses with a null computed percentage are excluded from both means, not
/// treated as zero; a course with unparsable reported points is excluded
/// from the weighted mean only.
pub fn period_summary(courses: &[Course], today: NaiveDate) -> PeriodSummary {
    if courses.is_empty() {
        return PeriodSummary::default();
    }

    let mut grade_sum = 0.0;
    let mut grade_count = 0usize;
    let mut weighted_sum = 0.0;
    let mut weighted_possible = 0.0;
    let mut most_recent: Option<NaiveDate> = None;

    for course in courses {
        if let Some(percentage) = course.overall_percentage {
            grade_sum += percentage;
            grade_count += 1;

            if let Some(possible) = course
                .reported_points_possible
                .as_deref()
                .and_then(|text| text.trim().parse::<f64>().ok())
            {
                if possible > 0.0 {
                    weighted_sum += percentage * possible;
                    weighted_possible += possible;
                }
            }
        }

        if let Some(updated) = course.last_updated {
            most_recent = Some(most_recent.map_or(updated, |m| m.max(updated)));
        }
    }

    PeriodSummary {
        course_count: courses.len(),
        average_percentage: (grade_count > 0).then(|| round2(grade_sum / grade_count as f64)),
        weighted_average_percentage: (weighted_possible > 0.0)
            .then(|| round2(weighted_sum / weighted_possible)),
        latest_update_date: most_recent,
        days_since_latest_update: most_recent.map(|date| (today - date).num_days()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(category: &str, raw: &str, total: &str) -> Assignment {
        let status = classify_raw_score(raw);
        let score = match status {
            AssignmentStatus::NotHandedIn
            | AssignmentStatus::TooLateToCount
            | AssignmentStatus::ScoreBelowFifty => Some(0.0),
            AssignmentStatus::Exempt | AssignmentStatus::NotYetGraded => None,
            AssignmentStatus::Scored => raw.parse().ok(),
        };
        let total_points = total.parse().ok();
        let percentage = match (score, total_points) {
            (Some(s), Some(t)) if t > 0.0 => Some(round2(s / t * 100.0)),
            _ => None,
        };
        Assignment {
            title: "t".to_string(),
            due_date: String::new(),
            assigned_date: String::new(),
            category: category.to_string(),
            raw_score: raw.to_string(),
            score,
            total_points,
            percentage,
            status,
        }
    }

    #[test]
    fn classification_precedence() {
        assert_eq!(classify_raw_score("NHI"), AssignmentStatus::NotHandedIn);
        assert_eq!(classify_raw_score("tltc"), AssignmentStatus::TooLateToCount);
        assert_eq!(classify_raw_score("X"), AssignmentStatus::Exempt);
        assert_eq!(classify_raw_score("SBF"), AssignmentStatus::ScoreBelowFifty);
        assert_eq!(classify_raw_score("NYG"), AssignmentStatus::NotYetGraded);
        assert_eq!(classify_raw_score(""), AssignmentStatus::NotYetGraded);
        assert_eq!(classify_raw_score("87.5"), AssignmentStatus::Scored);
        // Unparsable text is treated as not yet graded, never an error.
        assert_eq!(classify_raw_score("see me"), AssignmentStatus::NotYetGraded);
        // Markers win over anything that might also parse.
        assert_eq!(classify_raw_score(" nhi "), AssignmentStatus::NotHandedIn);
    }

    #[test]
    fn category_percentage_null_iff_no_possible_points() {
        let breakdown = category_stats(&[
            assignment("Practice", "9", "10"),
            assignment("Practice", "8", "10"),
            assignment("Process", "NHI", "0"),
        ]);
        assert_eq!(breakdown.practice.percentage, Some(85.0));
        assert_eq!(breakdown.practice.earned, 17.0);
        assert_eq!(breakdown.practice.possible, 20.0);
        assert!(breakdown.process.percentage.is_none());
        assert!(breakdown.product.percentage.is_none());
    }

    #[test]
    fn excluded_statuses_accumulate_nothing() {
        let breakdown = category_stats(&[
            assignment("Product", "X", "100"),
            assignment("Product", "NYG", "50"),
            assignment("Product", "90", "100"),
        ]);
        assert_eq!(breakdown.product.earned, 90.0);
        assert_eq!(breakdown.product.possible, 100.0);
    }

    #[test]
    fn extra_credit_can_exceed_one_hundred() {
        let breakdown = category_stats(&[assignment("Practice", "12", "10")]);
        assert_eq!(breakdown.practice.percentage, Some(120.0));
    }

    #[test]
    fn weighted_overall_skips_empty_categories() {
        // Scenario: 90/100 Product plus an NHI with zero possible points in
        // Process. Only Product's weight contributes, so overall is 90.
        let breakdown = category_stats(&[
            assignment("Product", "90", "100"),
            assignment("Process", "NHI", "0"),
        ]);
        assert_eq!(breakdown.process.percentage, None);
        assert_eq!(weighted_overall(&breakdown), Some(90.0));
    }

    #[test]
    fn weighted_overall_null_when_nothing_contributed() {
        let breakdown = category_stats(&[assignment("Product", "NYG", "")]);
        assert_eq!(weighted_overall(&breakdown), None);
        assert_eq!(weighted_overall(&CategoryBreakdown::default()), None);
    }

    #[test]
    fn weighted_overall_mixes_weights() {
        // Practice 100%, Product 80%: (1.0*0.2 + 0.8*0.5) / 0.7 = 0.857...
        let breakdown = category_stats(&[
            assignment("Practice", "10", "10"),
            assignment("Product", "80", "100"),
        ]);
        assert_eq!(weighted_overall(&breakdown), Some(85.71));
    }

    fn course_with(percentage: Option<f64>, possible: Option<&str>) -> Course {
        Course {
            overall_percentage: percentage,
            reported_points_possible: possible.map(str::to_string),
            ..Course::placeholder("c", 0)
        }
    }

    #[test]
    fn summary_excludes_null_courses_from_means() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        let mut with_date = course_with(Some(90.0), Some("200"));
        with_date.last_updated = NaiveDate::from_ymd_opt(2025, 11, 5);
        let courses = vec![
            with_date,
            course_with(Some(70.0), Some("100")),
            course_with(None, Some("300")),
        ];
        let summary = period_summary(&courses, today);
        assert_eq!(summary.course_count, 3);
        assert_eq!(summary.average_percentage, Some(80.0));
        // (90*200 + 70*100) / 300
        assert_eq!(summary.weighted_average_percentage, Some(83.33));
        assert_eq!(
            summary.latest_update_date,
            NaiveDate::from_ymd_opt(2025, 11, 5)
        );
        assert_eq!(summary.days_since_latest_update, Some(15));
    }

    #[test]
    fn summary_tolerates_unparsable_reported_points() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        let courses = vec![
            course_with(Some(90.0), Some("not a number")),
            course_with(Some(80.0), Some("100")),
        ];
        let summary = period_summary(&courses, today);
        assert_eq!(summary.average_percentage, Some(85.0));
        // Only the parsable course participates in the weighted mean.
        assert_eq!(summary.weighted_average_percentage, Some(80.0));
    }

    #[test]
    fn empty_course_list_yields_empty_summary() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        let summary = period_summary(&[], today);
        assert_eq!(summary.course_count, 0);
        assert!(summary.average_percentage.is_none());
        assert!(summary.weighted_average_percentage.is_none());
        assert!(summary.latest_update_date.is_none());
    }
}
