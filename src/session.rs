//! Remote automation session.
//!
//! Owns one subject's transport state: the cookie jar, the cached initial
//! document and the retry/backoff machinery around the scripted login. All
//! caches are instance fields; nothing is shared between subjects.

use std::sync::Arc;

use rand::Rng;
use reqwest::cookie::Jar;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::backend::script::{self, ScriptParams};
use crate::backend::{AutomationBackend, ScriptOutcome};
use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::extract;
use crate::model::Quarter;

/// Attempt ceiling for the scripted login.
pub const MAX_LOGIN_ATTEMPTS: usize = 12;

/// Backoff schedule in seconds, one entry per attempt. Front-loaded to ride
/// out a cold automation backend during system boot.
pub const RETRY_DELAY_SECS: [u64; MAX_LOGIN_ATTEMPTS] =
    [5, 10, 15, 20, 30, 45, 60, 90, 120, 150, 180, 240];

/// The initial document captured at login, with the quarter it shows.
struct CachedDocument {
    html: String,
    quarter: Option<Quarter>,
}

/// One subject's authenticated browsing session.
pub struct Session<B> {
    backend: B,
    config: Config,
    cookie_jar: Arc<Jar>,
    cached: Option<CachedDocument>,
    detected_student_id: Option<String>,
    school_year: u16,
    last_final_url: Option<String>,
}

impl<B: AutomationBackend> Session<B> {
    pub fn new(backend: B, config: Config) -> Self {
        let school_year = config.school_year;
        Self {
            backend,
            config,
            cookie_jar: Arc::new(Jar::default()),
            cached: None,
            detected_student_id: None,
            school_year,
            last_final_url: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Student id read from the verification banner, when the portal showed
    /// one.
    pub fn detected_student_id(&self) -> Option<&str> {
        self.detected_student_id.as_deref()
    }

    /// Final URL of the last completed login attempt.
    pub fn last_final_url(&self) -> Option<&str> {
        self.last_final_url.as_deref()
    }

    /// The cookie jar that imported cookies land in; shared with any direct
    /// portal client built for this subject.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        Arc::clone(&self.cookie_jar)
    }

    pub fn is_logged_in(&self) -> bool {
        self.cached.is_some()
    }

    fn script_params(&self) -> ScriptParams<'_> {
        ScriptParams {
            school_url: self.config.school_url_trimmed(),
            username: &self.config.username,
            password: &self.config.password,
            student_id: self.config.student_id.as_deref(),
        }
    }

    /// Drive the scripted login, retrying transport failures on the fixed
    /// schedule.
    ///
    /// Returns `Ok(false)` when the portal rejected the credentials (landed
    /// on the error page or stayed on the login page); that outcome is never
    /// retried. Transport errors are retried up to the attempt ceiling;
    /// every other failure aborts on the spot.
    pub async fn authenticate(&mut self) -> Result<bool> {
        let login_script = script::login_script(&self.script_params());

        for attempt in 0..MAX_LOGIN_ATTEMPTS {
            // After the first attempt, probe liveness first so a cold
            // backend costs a sleep, not an automation call.
            if attempt > 0 && !self.backend.is_ready().await {
                let delay = RETRY_DELAY_SECS[attempt];
                info!(
                    "automation backend not ready yet (attempt {}/{}), checking again in {}s",
                    attempt + 1,
                    MAX_LOGIN_ATTEMPTS,
                    delay
                );
                sleep(Duration::from_secs(delay)).await;
                continue;
            }

            // Stagger concurrent subjects a little on the very first try.
            if attempt == 0 && self.config.stagger_max_secs > 0.0 {
                let jitter = rand::thread_rng().gen_range(0.0..self.config.stagger_max_secs);
                debug!("waiting {:.1}s before login to stagger requests", jitter);
                sleep(Duration::from_secs_f64(jitter)).await;
            }

            let result = self.backend.run_script(&login_script).await;
            match result {
                Ok(outcome) => return self.complete_login(outcome),
                Err(err) if err.is_transient() => {
                    if attempt + 1 < MAX_LOGIN_ATTEMPTS {
                        let delay = RETRY_DELAY_SECS[attempt];
                        warn!(
                            "cannot reach automation backend (attempt {}/{}): {}; retrying in {}s",
                            attempt + 1,
                            MAX_LOGIN_ATTEMPTS,
                            err,
                            delay
                        );
                        sleep(Duration::from_secs(delay)).await;
                    } else {
                        error!(
                            "automation backend unreachable after {} attempts",
                            MAX_LOGIN_ATTEMPTS
                        );
                        return Err(err);
                    }
                }
                Err(err) => {
                    error!("login script failed: {}", err);
                    return Err(err);
                }
            }
        }

        Err(FetchError::FetchFailed {
            message: format!("login retry schedule exhausted after {} attempts", MAX_LOGIN_ATTEMPTS),
        })
    }

    fn complete_login(&mut self, outcome: ScriptOutcome) -> Result<bool> {
        debug!("browser login completed, final url: {}", outcome.url);
        self.last_final_url = Some(outcome.url.clone());

        if outcome.url.contains("/Error") {
            error!("login failed, redirected to error page: {}", outcome.url);
            return Ok(false);
        }
        if outcome.url.contains("/LogOn") {
            error!("login failed, still on login page (invalid credentials)");
            return Ok(false);
        }

        self.import_cookies(&outcome.cookies);

        let quarter = extract::detect_quarter(&outcome.html).map(|(quarter, year)| {
            if let Some(year) = year {
                self.school_year = year;
            }
            quarter
        });

        if let Some(id) = outcome.selected_student_id.filter(|id| !id.is_empty()) {
            info!("student id from verification banner: {}", id);
            self.detected_student_id = Some(id);
        }

        info!(
            "login successful, landed on {} (initial quarter: {})",
            outcome.url,
            quarter.map_or("unknown".to_string(), |q| q.to_string())
        );
        self.cached = Some(CachedDocument {
            html: outcome.html,
            quarter,
        });
        Ok(true)
    }

    fn import_cookies(&self, cookies: &[crate::backend::BrowserCookie]) {
        let Ok(url) = reqwest::Url::parse(self.config.school_url_trimmed()) else {
            warn!("cannot import cookies, school url is not parsable");
            return;
        };
        for cookie in cookies {
            let mut header = format!("{}={}; Path={}", cookie.name, cookie.value,
                cookie.path.as_deref().unwrap_or("/"));
            if let Some(domain) = cookie.domain.as_deref() {
                header.push_str("; Domain=");
                header.push_str(domain.trim_start_matches('.'));
            }
            self.cookie_jar.add_cookie_str(&header, &url);
        }
        debug!("imported {} cookies", cookies.len());
    }

    /// Record the student id resolved later from a document, if the banner
    /// never supplied one.
    pub fn record_student_id(&mut self, id: String) {
        if self.detected_student_id.is_none() {
            info!("resolved student id from document: {}", id);
            self.detected_student_id = Some(id);
        }
    }

    /// Which quarter the cached initial document shows.
    pub fn cached_quarter(&self) -> Option<Quarter> {
        self.cached.as_ref().and_then(|doc| doc.quarter)
    }

    /// Rendered document for a quarter.
    ///
    /// Reuses the initial login capture when it already shows the requested
    /// quarter; otherwise drives a second scripted procedure that selects the
    /// quarter in the dropdown and refreshes. Quarter fetches are not
    /// retried; a failure surfaces so the orchestrator can skip the quarter.
    pub async fn fetch_quarter_document(&mut self, quarter: Quarter) -> Result<String> {
        if let Some(cached) = &self.cached {
            if cached.quarter == Some(quarter) {
                debug!("using cached login document for {}", quarter);
                return Ok(cached.html.clone());
            }
        }

        let value = quarter.dropdown_value(self.school_year);
        let quarter_script = script::quarter_script(&self.script_params(), &value);
        let outcome = self.backend.run_script(&quarter_script).await?;
        if outcome.html.is_empty() {
            return Err(FetchError::backend(format!(
                "empty document for quarter {}",
                quarter
            )));
        }
        debug!(
            "fetched {} bytes of html for {}",
            outcome.html.len(),
            quarter
        );
        Ok(outcome.html)
    }
}
