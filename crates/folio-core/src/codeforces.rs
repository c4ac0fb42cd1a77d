//! Codeforces public API client.
//!
//! Every method answers with `{"status": "OK", "result": ...}` or
//! `{"status": "FAILED", "comment": "..."}`.

use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activity::ActivityRecord;
use crate::config::{Config, DEFAULT_CODEFORCES_API, DEFAULT_CODEFORCES_HANDLE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub handle: String,

    #[serde(default)]
    pub rating: Option<i64>,

    #[serde(default)]
    pub max_rating: Option<i64>,

    #[serde(default)]
    pub rank: Option<String>,

    #[serde(default)]
    pub max_rank: Option<String>,

    #[serde(default)]
    pub contribution: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
    pub contest_id: i64,
    pub contest_name: String,

    #[serde(default)]
    pub rank: i64,

    pub rating_update_time_seconds: i64,
    pub old_rating: i64,
    pub new_rating: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(default)]
    pub contest_id: Option<i64>,

    #[serde(default)]
    pub index: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub rating: Option<i64>,

    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub creation_time_seconds: i64,

    #[serde(default)]
    pub problem: Option<Problem>,

    #[serde(default)]
    pub verdict: Option<String>,
}

impl Submission {
    pub fn activity(&self) -> ActivityRecord {
        ActivityRecord::new(self.creation_time_seconds)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,

    #[serde(default)]
    comment: Option<String>,

    result: Option<T>,
}

fn open_envelope<T>(envelope: Envelope<T>, method: &str) -> anyhow::Result<T> {
    if envelope.status != "OK" {
        let comment = envelope
            .comment
            .unwrap_or_else(|| format!("{method} request failed"));
        return Err(anyhow!("codeforces {method}: {comment}"));
    }
    envelope
        .result
        .ok_or_else(|| anyhow!("codeforces {method}: response had no result"))
}

/// The three lookups the dashboard needs, kept behind a trait so
/// commands can run against canned data.
pub trait ProfileSource {
    fn handle(&self) -> &str;
    fn user_info(&self) -> anyhow::Result<User>;
    fn rating_history(&self) -> anyhow::Result<Vec<RatingChange>>;
    fn submissions(&self) -> anyhow::Result<Vec<Submission>>;
}

#[derive(Debug, Clone)]
pub struct CodeforcesClient {
    client: reqwest::blocking::Client,
    base_url: String,
    handle: String,
}

impl CodeforcesClient {
    pub fn new(base_url: &str, handle: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("cannot create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            handle: handle.to_string(),
        })
    }

    #[tracing::instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let base_url = cfg
            .get("codeforces.api")
            .unwrap_or_else(|| DEFAULT_CODEFORCES_API.to_string());
        let handle = cfg
            .get("codeforces.handle")
            .unwrap_or_else(|| DEFAULT_CODEFORCES_HANDLE.to_string());
        let timeout = cfg.http_timeout()?;
        info!(base_url = %base_url, handle = %handle, ?timeout, "configured codeforces client");
        Self::new(&base_url, &handle, timeout)
    }

    #[tracing::instrument(skip(self, query))]
    fn call<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> anyhow::Result<T> {
        let url = format!("{}/{method}", self.base_url);
        debug!(url = %url, ?query, "requesting");
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .with_context(|| format!("GET {url}"))?;

        // failed calls still carry a JSON envelope with the reason
        let status = resp.status();
        let envelope: Envelope<T> = match resp.json() {
            Ok(envelope) => envelope,
            Err(err) if !status.is_success() => {
                return Err(anyhow!("GET {url} returned {status}: {err}"));
            }
            Err(err) => {
                return Err(err).with_context(|| format!("parse {method} response"));
            }
        };
        open_envelope(envelope, method)
    }
}

impl ProfileSource for CodeforcesClient {
    fn handle(&self) -> &str {
        &self.handle
    }

    fn user_info(&self) -> anyhow::Result<User> {
        let users: Vec<User> = self.call("user.info", &[("handles", self.handle.as_str())])?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("codeforces user.info: no user named {}", self.handle))
    }

    fn rating_history(&self) -> anyhow::Result<Vec<RatingChange>> {
        self.call("user.rating", &[("handle", self.handle.as_str())])
    }

    fn submissions(&self) -> anyhow::Result<Vec<Submission>> {
        self.call("user.status", &[("handle", self.handle.as_str())])
    }
}
