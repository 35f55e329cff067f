//! Hand-off of agent outcomes to an application history store.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use url::Url;

use crate::agent::AgentOutcome;
use crate::error::Result;

const TRACKING_PARAMS: &[&str] = &["gh_src", "source", "ref", "referrer", "lever-source", "gclid", "fbclid"];

/// Receives one outcome per application attempt, keyed by normalized URL.
#[async_trait]
pub trait OutcomeRecorder: Send + Sync {
    async fn record(&self, url: &str, outcome: &AgentOutcome) -> Result<()>;
}

/// Keeps outcomes in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    entries: Mutex<Vec<(String, AgentOutcome)>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, AgentOutcome)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl OutcomeRecorder for MemoryRecorder {
    async fn record(&self, url: &str, outcome: &AgentOutcome) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((url.to_string(), outcome.clone()));
        Ok(())
    }
}

/// Canonical form of a job URL: no fragment, no tracking parameters, no
/// trailing slash. Unparseable input is returned trimmed.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(if path.is_empty() { "/" } else { path.as_str() });

    let mut out = url.to_string();
    if url.query().is_none() && out.ends_with('/') {
        out.pop();
    }
    out
}
