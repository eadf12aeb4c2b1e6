//! # HAC Grades
//!
//! Browserless fetch core for Home Access Center gradebooks: drives a remote
//! browser-automation service through a scripted login, extracts the
//! assignment tables from the rendered pages and computes category-weighted
//! grades across all four quarters.
//!
//! ## Layers
//!
//! - `backend/` - transport to the automation service: script templates and
//!   the HTTP client, behind the [`backend::AutomationBackend`] trait
//! - `session` - one subject's login state: retry schedule, cookie jar,
//!   cached initial document
//! - `extract/` - tolerant scraping of the rendered portal HTML
//! - `grades` - pure computation: status classification, category weighting,
//!   period summaries
//! - `orchestrator` - one full multi-quarter fetch, roster/grade merging and
//!   identity verification
//! - `coordinator` - refresh lifecycle: session reuse, last-known-good
//!   retention, narrowing to the configured quarter
//! - `metadata` - flattened course registry for dashboard tooling

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod grades;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod orchestrator;
pub mod session;

pub use backend::{AutomationBackend, BrowserlessClient};
pub use config::Config;
pub use coordinator::{QuarterView, UpdateCoordinator};
pub use error::{FetchError, Result};
pub use model::{Course, FetchResult, PeriodResult, Quarter};
pub use orchestrator::GradeFetcher;
pub use session::Session;
