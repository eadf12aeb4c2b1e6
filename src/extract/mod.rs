//! Document extractor.
//!
//! Turns the rendered assignments view into raw course records. Everything
//! here is tolerant by construction: a missing element or malformed row
//! degrades to `None`/omission for that field or row and never aborts the
//! rest of the document.

pub mod html;

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::grades;
use crate::model::{
    Assignment, AssignmentStatus, Course, Quarter, ReportedCategory,
};

use self::html as h;

/// The portal renders at most this many inline assignment tables.
pub const MAX_COURSE_SLOTS: usize = 8;

/// One structural course block from the rendered document, independent of
/// whether it has an assignment table. This is the authoritative roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    /// 0-based position of the block in the document.
    pub slot: usize,
}

/// Discover the course roster from the `AssignmentClass` blocks.
///
/// Every block counts toward the slot index even when its header anchor is
/// missing, so slots stay aligned with the numbered assignment tables.
pub fn extract_roster(document: &str) -> Vec<RosterEntry> {
    let marker = "class=\"AssignmentClass\"";
    let mut starts = Vec::new();
    let mut from = 0;
    while let Some(pos) = h::find_ci(document, marker, from) {
        starts.push(pos);
        from = pos + marker.len();
    }

    let mut roster = Vec::new();
    for (slot, &start) in starts.iter().enumerate() {
        let end = starts.get(slot + 1).copied().unwrap_or(document.len());
        let block = &document[start..end];
        if let Some(name) = course_header_name(block) {
            if !name.is_empty() {
                debug!("roster slot {}: {}", slot, name);
                roster.push(RosterEntry { name, slot });
            }
        }
    }
    debug!("found {} courses in roster", roster.len());
    roster
}

fn course_header_name(block: &str) -> Option<String> {
    let pos = h::find_ci(block, "sg-header-heading", 0)?;
    let lt = block[..pos].rfind('<')?;
    let open_end = block[lt..].find('>')? + lt + 1;
    let close = h::find_ci(block, "</a", open_end)?;
    Some(h::text_of(&block[open_end..close]))
}

/// Which quarter the document currently shows, read from the selected option
/// of the report-card-run dropdown, together with the school year encoded in
/// the option value.
pub fn detect_quarter(document: &str) -> Option<(Quarter, Option<u16>)> {
    let dropdown = h::element_by_id(document, "plnMain_ddlReportCardRuns")?;
    let selected = h::tag_blocks(dropdown, "option")
        .into_iter()
        .find(|(open, _)| h::find_ci(open, "selected", 0).is_some())?;
    let value = h::attr_value(selected.0, "value")?;
    Quarter::from_dropdown_value(&value)
}

/// Extract up to [`MAX_COURSE_SLOTS`] graded courses. Slot names come from
/// the roster where available.
pub fn extract_graded_courses(
    document: &str,
    roster: &[RosterEntry],
    today: NaiveDate,
) -> Vec<Course> {
    (0..MAX_COURSE_SLOTS)
        .filter_map(|slot| {
            let name = roster
                .iter()
                .find(|entry| entry.slot == slot)
                .map(|entry| entry.name.as_str());
            extract_course(document, slot, name, today)
        })
        .collect()
}

/// Extract the course occupying `slot`, or None when no assignment table is
/// rendered there.
pub fn extract_course(
    document: &str,
    slot: usize,
    name: Option<&str>,
    today: NaiveDate,
) -> Option<Course> {
    let table_id = format!(
        "plnMain_rptAssigmnetsByCourse_dgCourseAssignments_{}",
        slot
    );
    let table = h::element_by_id(document, &table_id)?;

    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| format!("Course {}", slot + 1));

    let assignments: Vec<Assignment> = data_rows(table)
        .into_iter()
        .filter_map(|cells| parse_assignment_row(&cells))
        .collect();

    let category_breakdown = grades::category_stats(&assignments);
    let overall_percentage = grades::weighted_overall(&category_breakdown);
    let (last_updated, days_since_update) =
        match slot_text(document, "lblLastUpdDate", slot)
            .and_then(|text| parse_last_updated(&text, today))
        {
            Some((date, days)) => (Some(date), Some(days)),
            None => (None, None),
        };

    let count = |status: AssignmentStatus| {
        assignments.iter().filter(|a| a.status == status).count()
    };

    Some(Course {
        total_assignments: assignments.len(),
        not_handed_in: count(AssignmentStatus::NotHandedIn),
        not_yet_graded: count(AssignmentStatus::NotYetGraded),
        too_late_to_count: count(AssignmentStatus::TooLateToCount),
        score_below_fifty: count(AssignmentStatus::ScoreBelowFifty),
        overall_percentage,
        reported_percentage: reported_overall(document, slot),
        reported_points_earned: slot_text(document, "lblStuPoints", slot),
        reported_points_possible: slot_text(document, "lblMaxPoints", slot),
        reported_categories: reported_categories(document, slot),
        assignments,
        category_breakdown,
        last_updated,
        days_since_update,
        name,
        course_index: slot,
    })
}

/// Cell texts of every data row in an assignment/category table, raw inner
/// html kept alongside for link extraction.
fn data_rows(table: &str) -> Vec<Vec<(String, String)>> {
    h::tag_blocks(table, "tr")
        .into_iter()
        .filter(|(open, _)| h::find_ci(open, "sg-asp-table-data-row", 0).is_some())
        .map(|(_, inner)| {
            h::tag_blocks(inner, "td")
                .into_iter()
                .map(|(_, cell)| (h::text_of(cell), cell.to_string()))
                .collect()
        })
        .collect()
}

/// Map one table row onto an Assignment by fixed column position:
/// due date, assigned date, title link, category, raw score, total points,
/// with an extra score column read only for below-fifty rows.
fn parse_assignment_row(cells: &[(String, String)]) -> Option<Assignment> {
    if cells.len() < 6 {
        return None;
    }

    // The title lives in a link; rows without one are filler.
    let title = h::tag_blocks(&cells[2].1, "a")
        .first()
        .map(|(_, inner)| h::text_of(inner))
        .filter(|t| !t.is_empty())?;

    let due_date = cells[0].0.clone();
    let assigned_date = cells[1].0.clone();
    let category = cells[3].0.clone();
    let raw_score = cells[4].0.clone();
    let total_points_text = &cells[5].0;

    let status = grades::classify_raw_score(&raw_score);
    let score = match status {
        AssignmentStatus::NotHandedIn | AssignmentStatus::TooLateToCount => Some(0.0),
        AssignmentStatus::Exempt | AssignmentStatus::NotYetGraded => None,
        // Below-fifty rows carry the real score in a trailing column.
        AssignmentStatus::ScoreBelowFifty => Some(
            cells
                .get(7)
                .and_then(|(text, _)| text.parse::<f64>().ok())
                .unwrap_or(0.0),
        ),
        AssignmentStatus::Scored => raw_score.trim().parse::<f64>().ok(),
    };

    let total_points = if total_points_text.eq_ignore_ascii_case("n/a") {
        None
    } else {
        total_points_text.parse::<f64>().ok()
    };

    let percentage = match (score, total_points) {
        (Some(s), Some(t)) if t > 0.0 => Some(grades::round2(s / t * 100.0)),
        _ => None,
    };

    Some(Assignment {
        title,
        due_date,
        assigned_date,
        category,
        raw_score,
        score,
        total_points,
        percentage,
        status,
    })
}

fn slot_span_id(label: &str, slot: usize) -> String {
    format!("plnMain_rptAssigmnetsByCourse_{}_{}", label, slot)
}

fn slot_text(document: &str, label: &str, slot: usize) -> Option<String> {
    let inner = h::element_by_id(document, &slot_span_id(label, slot))?;
    let text = h::text_of(inner);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// The portal's own overall percentage for a slot.
fn reported_overall(document: &str, slot: usize) -> Option<f64> {
    slot_text(document, "lblOverallAverage", slot)
        .and_then(|text| text.parse::<f64>().ok())
        .map(grades::round2)
}

/// The portal's own category table for a slot, kept as raw text columns.
fn reported_categories(document: &str, slot: usize) -> Vec<ReportedCategory> {
    let table_id = format!("plnMain_rptAssigmnetsByCourse_dgCourseCategories_{}", slot);
    let Some(table) = h::element_by_id(document, &table_id) else {
        return Vec::new();
    };
    data_rows(table)
        .into_iter()
        .filter(|cells| cells.len() >= 5)
        .map(|cells| ReportedCategory {
            category: cells[0].0.clone(),
            points_earned: cells[1].0.clone(),
            points_possible: cells[2].0.clone(),
            percentage: cells[3].0.clone(),
            weight: cells[4].0.clone(),
            weighted_average: cells.get(5).map(|(text, _)| text.clone()),
        })
        .collect()
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2}/\d{1,2}/\d{4})").expect("static regex"))
}

/// Pull a `MM/DD/YYYY` date out of a free-text label like
/// `"(Last Updated: 11/05/2025)"` and derive days elapsed.
pub fn parse_last_updated(text: &str, today: NaiveDate) -> Option<(NaiveDate, i64)> {
    let captured = date_regex().captures(text)?.get(1)?.as_str();
    let date = NaiveDate::parse_from_str(captured, "%m/%d/%Y").ok()?;
    Some((date, (today - date).num_days()))
}

/// Resolve the student id shown in the document, trying the banner, hidden
/// inputs, form actions and inline script variables in that order.
pub fn extract_student_id(document: &str) -> Option<String> {
    if let Some(id) = banner_student_id(document) {
        debug!("student id from banner: {}", id);
        return Some(id);
    }

    static INPUT_RE: OnceLock<Regex> = OnceLock::new();
    let input_re = INPUT_RE.get_or_init(|| {
        Regex::new(r#"(?i)<input[^>]*id="[^"]*studentid[^"]*"[^>]*>"#).expect("static regex")
    });
    if let Some(tag) = input_re.find(document) {
        if let Some(value) = h::attr_value(tag.as_str(), "value") {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }

    static ACTION_RE: OnceLock<Regex> = OnceLock::new();
    let action_re = ACTION_RE.get_or_init(|| {
        Regex::new(r#"(?i)action="[^"]*studentid=(\d+)"#).expect("static regex")
    });
    if let Some(caps) = action_re.captures(document) {
        return Some(caps[1].to_string());
    }

    static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
    let script_re = SCRIPT_RE.get_or_init(|| {
        Regex::new(r#"(?i)studentId["']?\s*[:=]\s*["']?(\d+)"#).expect("static regex")
    });
    if let Some(caps) = script_re.captures(document) {
        return Some(caps[1].to_string());
    }

    warn!("could not resolve a student id from the document");
    None
}

fn banner_student_id(document: &str) -> Option<String> {
    let pos = h::find_ci(document, "sg-banner", 0)?;
    let lt = document[..pos].rfind('<')?;
    let gt = document[lt..].find('>')? + lt + 1;
    let value = h::attr_value(&document[lt..gt], "data-student-id")?;
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
    }

    fn course_block(slot: usize, name: &str, rows: &str) -> String {
        format!(
            r##"<div class="AssignmentClass">
                 <div class="sg-header sg-header-square">
                   <a class="sg-header-heading" href="#">{name}</a>
                   <span id="plnMain_rptAssigmnetsByCourse_lblHdrAverage_{slot}">avg</span>
                 </div>
                 <table id="plnMain_rptAssigmnetsByCourse_dgCourseAssignments_{slot}">
                   <tr class="sg-asp-table-header-row"><td>Due</td></tr>
                   {rows}
                 </table>
               </div>"##
        )
    }

    fn row(title: &str, category: &str, raw: &str, total: &str) -> String {
        format!(
            r##"<tr class="sg-asp-table-data-row">
                 <td>11/05/2025</td><td>11/01/2025</td>
                 <td><a href="#">{title}</a></td>
                 <td>{category}</td><td>{raw}</td><td>{total}</td>
               </tr>"##
        )
    }

    #[test]
    fn roster_includes_courses_without_tables() {
        let html = format!(
            r#"{}<div class="AssignmentClass">
                  <div class="sg-header"><a class="sg-header-heading">3 Art 7</a></div>
               </div>"#,
            course_block(0, "1 Math 7", &row("HW 1", "Practice", "9", "10"))
        );
        let roster = extract_roster(&html);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].name, "1 Math 7");
        assert_eq!(roster[1], RosterEntry { name: "3 Art 7".to_string(), slot: 1 });
    }

    #[test]
    fn course_without_table_extracts_none() {
        let html = r#"<div class="AssignmentClass">
            <a class="sg-header-heading">3 Art 7</a></div>"#;
        assert!(extract_course(html, 0, Some("3 Art 7"), today()).is_none());
    }

    #[test]
    fn extracts_assignments_by_column_position() {
        let rows = format!(
            "{}{}",
            row("HW 1", "Practice", "9", "10"),
            row("Quiz 1", "Product", "45.5", "50")
        );
        let html = course_block(0, "1 Math 7", &rows);
        let course = extract_course(&html, 0, Some("1 Math 7"), today()).unwrap();
        assert_eq!(course.total_assignments, 2);
        let a = &course.assignments[0];
        assert_eq!(a.title, "HW 1");
        assert_eq!(a.due_date, "11/05/2025");
        assert_eq!(a.assigned_date, "11/01/2025");
        assert_eq!(a.category, "Practice");
        assert_eq!(a.score, Some(9.0));
        assert_eq!(a.total_points, Some(10.0));
        assert_eq!(a.percentage, Some(90.0));
        assert_eq!(a.status, AssignmentStatus::Scored);
        assert_eq!(course.assignments[1].percentage, Some(91.0));
    }

    #[test]
    fn malformed_row_is_skipped_not_fatal() {
        let rows = format!(
            r#"{}<tr class="sg-asp-table-data-row"><td>broken</td></tr>{}"#,
            row("HW 1", "Practice", "9", "10"),
            // No link in the title cell.
            r#"<tr class="sg-asp-table-data-row">
                 <td>a</td><td>b</td><td>no link</td><td>c</td><td>5</td><td>10</td>
               </tr>"#
        );
        let html = course_block(0, "1 Math 7", &rows);
        let course = extract_course(&html, 0, Some("1 Math 7"), today()).unwrap();
        assert_eq!(course.total_assignments, 1);
    }

    #[test]
    fn na_total_points_becomes_none() {
        let html = course_block(0, "1 Math 7", &row("HW", "Practice", "9", "N/A"));
        let course = extract_course(&html, 0, None, today()).unwrap();
        let a = &course.assignments[0];
        assert_eq!(a.total_points, None);
        assert_eq!(a.percentage, None);
    }

    #[test]
    fn sbf_row_reads_trailing_score_column() {
        let rows = r#"<tr class="sg-asp-table-data-row">
            <td>11/05/2025</td><td>11/01/2025</td>
            <td><a>Essay</a></td><td>Product</td><td>SBF</td><td>100</td>
            <td></td><td>32</td>
        </tr>"#;
        let html = course_block(0, "1 ELA 7", rows);
        let course = extract_course(&html, 0, None, today()).unwrap();
        let a = &course.assignments[0];
        assert_eq!(a.status, AssignmentStatus::ScoreBelowFifty);
        assert_eq!(a.score, Some(32.0));
        assert_eq!(a.percentage, Some(32.0));
    }

    #[test]
    fn reported_summary_fields_tolerate_absence() {
        let summary = format!(
            r#"{}
            <span id="plnMain_rptAssigmnetsByCourse_lblOverallAverage_0">94.35</span>
            <span id="plnMain_rptAssigmnetsByCourse_lblStuPoints_0">188.70</span>
            <span id="plnMain_rptAssigmnetsByCourse_lblMaxPoints_0">200.00</span>
            <span id="plnMain_rptAssigmnetsByCourse_lblLastUpdDate_0">(Last Updated: 11/05/2025)</span>"#,
            course_block(0, "1 Math 7", &row("HW", "Practice", "9", "10"))
        );
        let course = extract_course(&summary, 0, None, today()).unwrap();
        assert_eq!(course.reported_percentage, Some(94.35));
        assert_eq!(course.reported_points_earned.as_deref(), Some("188.70"));
        assert_eq!(course.reported_points_possible.as_deref(), Some("200.00"));
        assert_eq!(course.last_updated, NaiveDate::from_ymd_opt(2025, 11, 5));
        assert_eq!(course.days_since_update, Some(15));

        // Same document, slot 1 absent entirely.
        assert!(extract_course(&summary, 1, None, today()).is_none());
    }

    #[test]
    fn reported_category_table_parses_rows() {
        let html = format!(
            r#"{}
            <table id="plnMain_rptAssigmnetsByCourse_dgCourseCategories_0">
              <tr class="sg-asp-table-data-row">
                <td>Product</td><td>90.00</td><td>100.00</td><td>90.00%</td><td>0.50</td><td>45.00</td>
              </tr>
            </table>"#,
            course_block(0, "1 Math 7", &row("HW", "Practice", "9", "10"))
        );
        let course = extract_course(&html, 0, None, today()).unwrap();
        assert_eq!(course.reported_categories.len(), 1);
        assert_eq!(course.reported_categories[0].category, "Product");
        assert_eq!(
            course.reported_categories[0].weighted_average.as_deref(),
            Some("45.00")
        );
    }

    #[test]
    fn detects_selected_quarter_and_year() {
        let html = r#"<select name="ctl00$plnMain$ddlReportCardRuns" id="plnMain_ddlReportCardRuns">
            <option value="1-2026">1st Qtr</option>
            <option selected="selected" value="2-2026">2nd Qtr</option>
        </select>"#;
        assert_eq!(detect_quarter(html), Some((Quarter::Q2, Some(2026))));
        assert_eq!(detect_quarter("<html></html>"), None);
    }

    #[test]
    fn last_updated_requires_a_parsable_date() {
        assert_eq!(
            parse_last_updated("(Last Updated: 11/05/2025)", today()),
            Some((NaiveDate::from_ymd_opt(2025, 11, 5).unwrap(), 15))
        );
        assert_eq!(parse_last_updated("Last Updated: yesterday", today()), None);
        assert_eq!(parse_last_updated("", today()), None);
    }

    #[test]
    fn student_id_lookup_order() {
        let banner = r#"<div class="sg-banner" data-student-id="111">x</div>"#;
        assert_eq!(extract_student_id(banner).as_deref(), Some("111"));

        let hidden = r#"<input type="hidden" id="ctlStudentId" value="222">"#;
        assert_eq!(extract_student_id(hidden).as_deref(), Some("222"));

        let action = r#"<form action="/HomeAccess/Home?studentId=333"></form>"#;
        assert_eq!(extract_student_id(action).as_deref(), Some("333"));

        let script = r#"<script>var studentId = 444;</script>"#;
        assert_eq!(extract_student_id(script).as_deref(), Some("444"));

        assert_eq!(extract_student_id("<html></html>"), None);
    }
}
