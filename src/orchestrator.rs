//! Multi-period fetch orchestration.
//!
//! Drives the session, extractor and engine once per quarter and assembles
//! the full [`FetchResult`]. A failing quarter is skipped, not fatal; the
//! fetch as a whole fails only when login fails, the verified identity is
//! wrong, or zero quarters could be retrieved.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::backend::AutomationBackend;
use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::extract::{self, RosterEntry};
use crate::grades;
use crate::model::{Course, FetchResult, PeriodResult, Quarter};
use crate::session::Session;

/// How one merged course was identified.
///
/// Name is the primary identity; the slot index is an explicit, logged
/// fallback for the case where the graded record at the same slot carries a
/// different name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeKey {
    ByName(String),
    ByIndex(usize),
}

/// Orchestrates a whole multi-quarter fetch for one subject.
pub struct GradeFetcher<B> {
    session: Session<B>,
    requested_student_id: Option<String>,
    identity_verified: bool,
}

impl<B: AutomationBackend> GradeFetcher<B> {
    pub fn new(backend: B, config: Config) -> Self {
        Self {
            requested_student_id: config.student_id.clone(),
            session: Session::new(backend, config),
            identity_verified: false,
        }
    }

    /// Run one full fetch: login (unless the session is still live), then
    /// every quarter in order.
    pub async fn fetch_all(&mut self) -> Result<FetchResult> {
        if !self.session.is_logged_in() {
            info!("not logged in, starting scripted login");
            if !self.session.authenticate().await? {
                return Err(FetchError::Authentication {
                    final_url: self
                        .session
                        .last_final_url()
                        .unwrap_or_default()
                        .to_string(),
                });
            }
            // The verification banner, when present, settles identity before
            // any quarter is fetched.
            self.verify_identity(None)?;
        }

        let fetched_at = Utc::now();
        let today = fetched_at.date_naive();
        let mut quarters = BTreeMap::new();

        for quarter in Quarter::ALL {
            let document = match self.session.fetch_quarter_document(quarter).await {
                Ok(document) => document,
                Err(err) => {
                    warn!(
                        "{}",
                        FetchError::period_unavailable(quarter, err.to_string())
                    );
                    continue;
                }
            };

            self.verify_identity(Some(&document))?;

            let period = build_period(&document, today);
            info!(
                "{}: {} courses ({} with graded work)",
                quarter,
                period.courses.len(),
                period
                    .courses
                    .iter()
                    .filter(|c| c.total_assignments > 0)
                    .count()
            );
            quarters.insert(quarter, period);
        }

        if quarters.is_empty() {
            return Err(FetchError::FetchFailed {
                message: "no quarter data could be fetched".to_string(),
            });
        }

        Ok(FetchResult {
            quarters,
            fetched_at,
            student_id: self
                .session
                .detected_student_id()
                .map(str::to_string)
                .or_else(|| self.requested_student_id.clone()),
        })
    }

    /// One-time identity check: the detected student id (banner first, then
    /// the document) must match the requested one. Runs opportunistically on
    /// the first document that reveals an id.
    fn verify_identity(&mut self, document: Option<&str>) -> Result<()> {
        if self.identity_verified {
            return Ok(());
        }

        let detected = self
            .session
            .detected_student_id()
            .map(str::to_string)
            .or_else(|| document.and_then(extract::extract_student_id));

        let Some(detected) = detected else {
            // Nothing to verify against yet; try again on the next document.
            return Ok(());
        };
        self.session.record_student_id(detected.clone());

        if let Some(requested) = &self.requested_student_id {
            if requested != &detected {
                return Err(FetchError::IdentityMismatch {
                    requested: requested.clone(),
                    detected,
                });
            }
        }
        self.identity_verified = true;
        Ok(())
    }
}

/// Extract and merge one quarter's document into a [`PeriodResult`].
pub fn build_period(document: &str, today: NaiveDate) -> PeriodResult {
    let roster = extract::extract_roster(document);
    let graded = extract::extract_graded_courses(document, &roster, today);
    let courses = merge_courses(&roster, graded);
    let summary = grades::period_summary(&courses, today);
    PeriodResult { courses, summary }
}

/// Reconcile the authoritative roster with the graded extraction results.
///
/// Every roster entry produces exactly one merged course, in roster order: a
/// graded record matched by name carries over unchanged, a same-slot record
/// with a diverging name is taken by index (logged), and anything else
/// becomes a zero-valued placeholder.
pub fn merge_courses(roster: &[RosterEntry], graded: Vec<Course>) -> Vec<Course> {
    let slot_names: HashMap<usize, String> = graded
        .iter()
        .map(|course| (course.course_index, course.name.clone()))
        .collect();
    let mut by_name: HashMap<String, Course> = graded
        .into_iter()
        .map(|course| (course.name.clone(), course))
        .collect();

    roster
        .iter()
        .map(|entry| {
            let taken = match resolve_key(entry, &by_name, &slot_names) {
                Some(MergeKey::ByName(name)) => by_name.remove(&name).inspect(|course| {
                    if course.course_index != entry.slot {
                        warn!(
                            "course '{}' matched by name but sits at slot {} (roster slot {})",
                            course.name, course.course_index, entry.slot
                        );
                    }
                }),
                Some(MergeKey::ByIndex(slot)) => slot_names
                    .get(&slot)
                    .and_then(|name| by_name.remove(name))
                    .inspect(|course| {
                        warn!(
                            "roster name '{}' not in graded records; falling back to slot {} ('{}')",
                            entry.name, slot, course.name
                        );
                    }),
                None => None,
            };
            taken.unwrap_or_else(|| Course::placeholder(entry.name.clone(), entry.slot))
        })
        .collect()
}

fn resolve_key(
    entry: &RosterEntry,
    by_name: &HashMap<String, Course>,
    slot_names: &HashMap<usize, String>,
) -> Option<MergeKey> {
    if by_name.contains_key(&entry.name) {
        return Some(MergeKey::ByName(entry.name.clone()));
    }
    let name_at_slot = slot_names.get(&entry.slot)?;
    by_name
        .contains_key(name_at_slot)
        .then(|| MergeKey::ByIndex(entry.slot))
}
