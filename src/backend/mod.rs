//! Automation backend layer.
//!
//! Owns the HTTP transport to the remote browser-automation service
//! (browserless). Knows nothing about grades; it sends a script and hands
//! back whatever the browser captured.

pub mod script;

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{FetchError, Result};

/// Total budget for one scripted login + navigation sequence.
const CALL_TIMEOUT: Duration = Duration::from_secs(90);
/// Budget for the liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A transport cookie captured by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// What a scripted procedure returned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptOutcome {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub cookies: Vec<BrowserCookie>,
    #[serde(default)]
    pub html: String,
    #[serde(rename = "selectedStudentId")]
    pub selected_student_id: Option<String>,
}

/// Capability to probe and drive the remote automation service.
///
/// The production implementation is [`BrowserlessClient`]; tests substitute
/// scripted stubs.
pub trait AutomationBackend {
    /// Lightweight liveness check. Must never block longer than the probe
    /// budget.
    fn is_ready(&self) -> impl std::future::Future<Output = bool> + Send;

    /// Run a scripted browser procedure and return what it captured.
    fn run_script(
        &self,
        script: &str,
    ) -> impl std::future::Future<Output = Result<ScriptOutcome>> + Send;
}

/// HTTP client for the browserless `/function` endpoint.
pub struct BrowserlessClient {
    http: reqwest::Client,
    function_url: String,
    health_url: String,
}

impl BrowserlessClient {
    pub fn new(function_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(FetchError::transport)?;
        Ok(Self {
            http,
            function_url: function_url.to_string(),
            // The service root answers even when /function would queue.
            health_url: function_url.replace("/function", "/"),
        })
    }
}

/// A raw `{error}` payload from the script wrapper.
#[derive(Debug, Deserialize)]
struct ScriptError {
    error: Option<String>,
}

fn classify_reqwest(err: reqwest::Error) -> FetchError {
    if err.is_connect() || err.is_timeout() {
        FetchError::transport(err)
    } else {
        FetchError::backend(err.to_string())
    }
}

impl AutomationBackend for BrowserlessClient {
    async fn is_ready(&self) -> bool {
        match self
            .http
            .get(&self.health_url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            // 404 still means the server is up and answering.
            Ok(response) => {
                let status = response.status();
                status.is_success() || status == reqwest::StatusCode::NOT_FOUND
            }
            Err(_) => false,
        }
    }

    async fn run_script(&self, script: &str) -> Result<ScriptOutcome> {
        debug!("sending browserless request to {}", self.function_url);

        let response = self
            .http
            .post(&self.function_url)
            .header("Content-Type", "application/javascript")
            .body(script.to_string())
            .timeout(CALL_TIMEOUT)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::backend(format!(
                "browserless request failed with status {}",
                status
            )));
        }

        let body = response.text().await.map_err(classify_reqwest)?;

        // The script wrapper reports its own failures as `{error}`.
        if let Ok(ScriptError { error: Some(msg) }) = serde_json::from_str::<ScriptError>(&body) {
            return Err(FetchError::backend(msg));
        }

        let outcome: ScriptOutcome = serde_json::from_str(&body)
            .map_err(|e| FetchError::backend(format!("unexpected browserless response: {}", e)))?;

        debug!(
            "browserless call done: final url {}, {} cookies, {} bytes of html",
            outcome.url,
            outcome.cookies.len(),
            outcome.html.len()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_outcome_decodes_backend_shape() {
        let json = r#"{
            "url": "https://hac.example.org/HomeAccess/Content/Student/Assignments.aspx",
            "cookies": [{"name": "ASP.NET_SessionId", "value": "abc", "domain": "hac.example.org"}],
            "html": "<html></html>",
            "selectedStudentId": "123456"
        }"#;
        let outcome: ScriptOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.cookies.len(), 1);
        assert_eq!(outcome.selected_student_id.as_deref(), Some("123456"));
    }

    #[test]
    fn missing_fields_default() {
        let outcome: ScriptOutcome = serde_json::from_str(r#"{"html": "x"}"#).unwrap();
        assert!(outcome.url.is_empty());
        assert!(outcome.cookies.is_empty());
        assert!(outcome.selected_student_id.is_none());
    }

    #[test]
    fn health_url_derived_from_function_url() {
        let client = BrowserlessClient::new("http://host:3000/function").unwrap();
        assert_eq!(client.health_url, "http://host:3000/");
    }
}
