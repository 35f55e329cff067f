//! Idempotency ledger for one application attempt.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::FillConfig;

/// Where a fill came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillModule {
    Rules,
    Ai,
    Agent,
}

impl fmt::Display for FillModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rules => "rules",
            Self::Ai => "ai",
            Self::Agent => "agent",
        })
    }
}

/// Outcome of one fill attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillRecord {
    pub selector: String,
    pub label: String,
    /// Truncated for display.
    pub value: String,
    pub success: bool,
    pub module: FillModule,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Which selectors have been filled, attempted or failed.
///
/// Owned by one application attempt and passed by `&mut` to every fill
/// pass. Call [`FieldTracker::reset`] before starting on a new form.
#[derive(Debug, Clone)]
pub struct FieldTracker {
    filled: HashSet<String>,
    attempted: HashSet<String>,
    failed: BTreeMap<String, String>,
    records: Vec<FillRecord>,
    display_chars: usize,
}

impl Default for FieldTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldTracker {
    pub fn new() -> Self {
        Self::with_config(&FillConfig::default())
    }

    /// Truncates record values at `config.display_chars`.
    pub fn with_config(config: &FillConfig) -> Self {
        Self::with_display_chars(config.display_chars)
    }

    /// Values longer than `display_chars` are truncated in records.
    pub fn with_display_chars(display_chars: usize) -> Self {
        Self {
            filled: HashSet::new(),
            attempted: HashSet::new(),
            failed: BTreeMap::new(),
            records: Vec::new(),
            display_chars,
        }
    }

    pub fn reset(&mut self) {
        self.filled.clear();
        self.attempted.clear();
        self.failed.clear();
        self.records.clear();
    }

    pub fn is_filled(&self, selector: &str) -> bool {
        self.filled.contains(selector)
    }

    pub fn was_attempted(&self, selector: &str) -> bool {
        self.attempted.contains(selector)
    }

    pub fn record_success(&mut self, selector: &str, label: &str, value: &str, module: FillModule) {
        self.attempted.insert(selector.to_string());
        self.filled.insert(selector.to_string());
        self.failed.remove(selector);
        self.push(selector, label, value, module, None);
    }

    pub fn record_failure(
        &mut self,
        selector: &str,
        label: &str,
        value: &str,
        module: FillModule,
        reason: &str,
    ) {
        self.attempted.insert(selector.to_string());
        self.failed.insert(selector.to_string(), reason.to_string());
        self.push(selector, label, value, module, Some(reason.to_string()));
    }

    fn push(
        &mut self,
        selector: &str,
        label: &str,
        value: &str,
        module: FillModule,
        reason: Option<String>,
    ) {
        self.records.push(FillRecord {
            selector: selector.to_string(),
            label: label.to_string(),
            value: truncate(value, self.display_chars),
            success: reason.is_none(),
            module,
            timestamp: Utc::now(),
            reason,
        });
    }

    pub fn records(&self) -> &[FillRecord] {
        &self.records
    }

    pub fn filled_count(&self) -> usize {
        self.filled.len()
    }

    /// Selectors whose latest attempt failed, with the reason.
    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failed
    }

    pub fn summary(&self) -> FillSummary {
        let successes = self.records.iter().filter(|r| r.success).count();
        FillSummary {
            filled: successes,
            failed: self
                .failed
                .iter()
                .map(|(selector, reason)| {
                    let label = self
                        .records
                        .iter()
                        .rev()
                        .find(|r| r.selector == *selector)
                        .map_or_else(|| selector.clone(), |r| r.label.clone());
                    (label, reason.clone())
                })
                .collect(),
            by_module: self.records.iter().filter(|r| r.success).fold(
                BTreeMap::new(),
                |mut acc, r| {
                    *acc.entry(r.module.to_string()).or_insert(0) += 1;
                    acc
                },
            ),
        }
    }
}

/// End-of-run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillSummary {
    pub filled: usize,
    /// `(label, reason)` for fields that never succeeded.
    pub failed: Vec<(String, String)>,
    pub by_module: BTreeMap<String, usize>,
}

impl fmt::Display for FillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} filled, {} failed", self.filled, self.failed.len())?;
        if !self.by_module.is_empty() {
            let parts: Vec<String> = self
                .by_module
                .iter()
                .map(|(module, n)| format!("{module}: {n}"))
                .collect();
            write!(f, " ({})", parts.join(", "))?;
        }
        for (label, reason) in &self.failed {
            write!(f, "\n  - {label}: {reason}")?;
        }
        Ok(())
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let mut out: String = value.chars().take(max).collect();
        out.push_str("...");
        out
    }
}
