//! Jenkins remote-trigger client.
//!
//! Builds are started with `POST <base>/job/<job>/build`, carrying the job's
//! remote-trigger token as the `token` query parameter when configured. The
//! known-jobs registry is the top-level job list from
//! `GET <base>/api/json?tree=jobs[name]`.

use std::collections::HashSet;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::trigger::BuildTrigger;
use crate::types::JobId;

/// Longest response body kept in a [`TriggerError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Errors talking to Jenkins.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Jenkins answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("cannot build URL for job {job:?} under {base}")]
    InvalidUrl { base: Url, job: String },
}

/// Username and password (or API token) for HTTP basic auth.
#[derive(Clone)]
pub struct BasicAuth {
    pub user: String,
    pub password: Option<String>,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    name: String,
}

/// [`BuildTrigger`] backed by the Jenkins HTTP API.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    http: Client,
    base: Url,
    auth: Option<BasicAuth>,
    token: Option<String>,
}

impl JenkinsClient {
    pub fn new(http: Client, base: Url) -> Self {
        JenkinsClient {
            http,
            base,
            auth: None,
            token: None,
        }
    }

    pub fn with_auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// `<base>/job/<job>/build`, with the job name percent-encoded as one
    /// path segment.
    pub fn build_url(&self, job: &JobId) -> Result<Url, TriggerError> {
        self.url_with_segments(&["job", job.as_str(), "build"])
            .ok_or_else(|| TriggerError::InvalidUrl {
                base: self.base.clone(),
                job: job.to_string(),
            })
    }

    fn registry_url(&self) -> Result<Url, TriggerError> {
        let mut url = self
            .url_with_segments(&["api", "json"])
            .ok_or_else(|| TriggerError::InvalidUrl {
                base: self.base.clone(),
                job: String::new(),
            })?;
        url.query_pairs_mut().append_pair("tree", "jobs[name]");
        Ok(url)
    }

    fn url_with_segments(&self, segments: &[&str]) -> Option<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(segments);
        Some(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(auth) => request.basic_auth(&auth.user, auth.password.as_ref()),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TriggerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TriggerError::Status {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        })
    }
}

impl BuildTrigger for JenkinsClient {
    type Error = TriggerError;

    async fn known_jobs(&self) -> Result<Option<HashSet<JobId>>, TriggerError> {
        let url = self.registry_url()?;
        let response = self.authorize(self.http.get(url)).send().await?;
        let list: JobList = Self::check(response).await?.json().await?;
        debug!(jobs = list.jobs.len(), "Fetched Jenkins job registry");
        Ok(Some(
            list.jobs.into_iter().map(|entry| JobId::new(entry.name)).collect(),
        ))
    }

    async fn trigger(&self, job: &JobId) -> Result<(), TriggerError> {
        let url = self.build_url(job)?;
        let mut request = self.authorize(self.http.post(url));
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }
        let response = request.send().await?;
        Self::check(response).await?;
        Ok(())
    }
}
