//! Update coordination across scheduled refreshes.
//!
//! Keeps one live fetcher (and with it the login session) alive between
//! refreshes, retains the last good result when a refresh fails, and narrows
//! the full multi-quarter result down to the quarter the consumer configured.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::backend::AutomationBackend;
use crate::config::Config;
use crate::error::Result;
use crate::model::{Course, FetchResult, PeriodSummary, Quarter};
use crate::orchestrator::GradeFetcher;

/// The narrowed, consumer-facing slice of one fetch.
#[derive(Debug, Clone, Serialize)]
pub struct QuarterView {
    pub quarter: Quarter,
    pub courses: Vec<Course>,
    pub summary: PeriodSummary,
    /// When the quarter was missing from the fetch, the courses above are
    /// zero-valued placeholders built from the most recently seen roster.
    pub is_placeholder: bool,
    pub fetched_at: DateTime<Utc>,
    pub student_id: Option<String>,
    /// Every quarter the underlying fetch did retrieve.
    pub available_quarters: Vec<Quarter>,
}

/// Owns the fetcher across refreshes and serves narrowed views.
pub struct UpdateCoordinator<B> {
    fetcher: GradeFetcher<B>,
    quarter: Quarter,
    last_good: Option<FetchResult>,
}

impl<B: AutomationBackend> UpdateCoordinator<B> {
    pub fn new(backend: B, config: Config) -> Self {
        Self {
            quarter: config.quarter(),
            fetcher: GradeFetcher::new(backend, config),
            last_good: None,
        }
    }

    /// The full result of the last successful refresh.
    pub fn last_result(&self) -> Option<&FetchResult> {
        self.last_good.as_ref()
    }

    /// Run one refresh and return the narrowed view.
    ///
    /// A failed refresh serves the retained last good result instead of
    /// erroring, as long as one exists; the error only surfaces while there
    /// is nothing to fall back to.
    pub async fn refresh(&mut self) -> Result<QuarterView> {
        match self.fetcher.fetch_all().await {
            Ok(result) => {
                info!(
                    "refresh done: {} quarters, student id {}",
                    result.quarters.len(),
                    result.student_id.as_deref().unwrap_or("unknown")
                );
                self.last_good = Some(result);
            }
            Err(err) => match &self.last_good {
                Some(last) => {
                    warn!(
                        "refresh failed ({}); serving data fetched at {}",
                        err, last.fetched_at
                    );
                }
                None => return Err(err),
            },
        }

        match &self.last_good {
            Some(result) => Ok(narrow(result, self.quarter)),
            // Unreachable: a missing last_good returned the error above.
            None => Err(crate::error::FetchError::FetchFailed {
                message: "no fetch result available".to_string(),
            }),
        }
    }

    /// Manually triggered refresh. Same code path as the scheduled one.
    pub async fn refresh_now(&mut self) -> Result<QuarterView> {
        info!("manual refresh requested");
        self.refresh().await
    }
}

/// Narrow a full fetch result to one quarter.
///
/// When that quarter is absent, synthesize a placeholder view from the most
/// recently seen roster so the consumer keeps a stable course list.
fn narrow(result: &FetchResult, quarter: Quarter) -> QuarterView {
    let available_quarters: Vec<Quarter> = result.quarters.keys().copied().collect();

    if let Some(period) = result.quarters.get(&quarter) {
        return QuarterView {
            quarter,
            courses: period.courses.clone(),
            summary: period.summary.clone(),
            is_placeholder: false,
            fetched_at: result.fetched_at,
            student_id: result.student_id.clone(),
            available_quarters,
        };
    }

    warn!(
        "quarter {} not in fetched data ({:?} available); synthesizing placeholders",
        quarter, available_quarters
    );
    let courses: Vec<Course> = result
        .quarters
        .last_key_value()
        .map(|(_, period)| {
            period
                .courses
                .iter()
                .map(|course| Course::placeholder(course.name.clone(), course.course_index))
                .collect()
        })
        .unwrap_or_default();

    QuarterView {
        quarter,
        summary: PeriodSummary {
            course_count: courses.len(),
            ..PeriodSummary::default()
        },
        courses,
        is_placeholder: true,
        fetched_at: result.fetched_at,
        student_id: result.student_id.clone(),
        available_quarters,
    }
}

/// Re-interpret a timestamp recovered from a previously exported view.
///
/// Accepts RFC 3339; a timestamp without an offset is assumed to be UTC
/// rather than discarded.
pub fn repair_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(aware) = DateTime::parse_from_rfc3339(text) {
        return Some(aware.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            warn!("timestamp '{}' has no offset, assuming UTC", text);
            return Some(naive.and_utc());
        }
    }
    None
}
