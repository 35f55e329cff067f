//! Observe / decide / act loop driven by an external decision oracle.

mod action;
mod guard;
mod prompt;

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify;
use crate::config::AgentConfig;
use crate::dom::{ElementHandle, PageActions};
use crate::error::Result;
use crate::extract::{self, clickable};
use crate::field::{Button, Field, FieldKind, FormSnapshot, Widget};
use crate::fill::{self, FillExecutor, FillOutcome};
use crate::history::{normalize_url, OutcomeRecorder};
use crate::oracle::Oracle;
use crate::resolve::JobContext;
use crate::tracker::{FieldTracker, FillModule};

pub use action::{
    parse_action, parse_embedded, parse_fenced, parse_keywords, parse_structured, ActionType,
    AgentAction, ParseSource,
};
pub use guard::LoopGuard;
pub use prompt::{build_prompt, compact_snapshot, HistoryEntry};

const SCROLL_STEP: i32 = 600;
const MAX_WAIT: Duration = Duration::from_secs(5);
const CLICK_TARGETS: &str = "a, button, [role=\"button\"], [role=\"option\"], [role=\"tab\"], \
    [role=\"radio\"], [role=\"checkbox\"], label, li";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentState {
    Observing,
    Deciding,
    Acting,
    Done,
    NeedsHelp,
    Failed,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::NeedsHelp | Self::Failed)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutcome {
    pub success: bool,
    pub state: AgentState,
    pub steps_taken: usize,
    pub reason: String,
    pub history: Vec<HistoryEntry>,
}

/// Why an action did not take. Page errors are folded in as text.
type Attempt = std::result::Result<(), String>;

/// One autonomous application attempt against one page.
pub struct AgentLoop<'a, D: PageActions + ?Sized> {
    dom: &'a D,
    oracle: &'a dyn Oracle,
    profile_summary: String,
    job: JobContext,
    config: AgentConfig,
    state: AgentState,
    recorder: Option<&'a dyn OutcomeRecorder>,
}

impl<'a, D> AgentLoop<'a, D>
where
    D: PageActions + ?Sized,
{
    pub fn new(
        dom: &'a D,
        oracle: &'a dyn Oracle,
        profile_summary: impl Into<String>,
        config: AgentConfig,
    ) -> Self {
        Self {
            dom,
            oracle,
            profile_summary: profile_summary.into(),
            job: JobContext::default(),
            config,
            state: AgentState::Observing,
            recorder: None,
        }
    }

    pub fn job(mut self, job: JobContext) -> Self {
        self.job = job;
        self
    }

    /// Hand the final outcome to `recorder`, keyed by the normalized page URL.
    pub fn recorder(mut self, recorder: &'a dyn OutcomeRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Run until done, needs-help or failed.
    ///
    /// Page-interaction problems end the run as a failed outcome. Only an
    /// oracle transport error is returned as `Err`.
    pub async fn run(&mut self, tracker: &mut FieldTracker) -> Result<AgentOutcome> {
        let started = Instant::now();
        let failure_budget = self.config.max_consecutive_failures * 2;
        let mut guard = LoopGuard::new(self.config.loop_window, self.config.loop_threshold);
        let mut history: Vec<HistoryEntry> = Vec::new();
        let mut failure_points = 0;
        info!(max_steps = self.config.max_steps, "agent run started");

        for step in 1..=self.config.max_steps {
            if let Some(budget) = self.config.run_budget {
                if started.elapsed() >= budget {
                    let reason = format!("run budget of {budget:?} exhausted");
                    return Ok(self.finish(AgentState::Failed, step - 1, reason, history).await);
                }
            }

            self.state = AgentState::Observing;
            let snapshot = match self.observe().await {
                Ok(Observation::Page(snapshot)) => snapshot,
                Ok(Observation::AccountCreation) => {
                    let reason = "account creation required before applying".to_string();
                    return Ok(self.finish(AgentState::NeedsHelp, step - 1, reason, history).await);
                }
                Err(e) => {
                    let reason = format!("observation failed: {e}");
                    return Ok(self.finish(AgentState::Failed, step - 1, reason, history).await);
                }
            };

            self.state = AgentState::Deciding;
            let recent = &history[history.len().saturating_sub(self.config.history_window)..];
            let prompt = build_prompt(&snapshot, &self.profile_summary, &self.job, recent);
            let response =
                match tokio::time::timeout(self.config.oracle_timeout, self.oracle.complete(&prompt)).await {
                    Ok(response) => response?,
                    Err(_) => {
                        warn!(step, timeout = ?self.config.oracle_timeout, "oracle timed out");
                        failure_points += 2;
                        if failure_points >= failure_budget {
                            let reason = "too many consecutive failures".to_string();
                            return Ok(self.finish(AgentState::Failed, step, reason, history).await);
                        }
                        continue;
                    }
                };

            let (action, source) = parse_action(&response);
            debug!(step, action = action.kind.as_str(), target = ?action.target, ?source, "decided");
            match action.kind {
                ActionType::Done => {
                    let reason = non_empty(&action.reason, "application complete");
                    return Ok(self.finish(AgentState::Done, step, reason, history).await);
                }
                ActionType::NeedHelp => {
                    let reason = non_empty(&action.reason, "oracle asked for help");
                    return Ok(self.finish(AgentState::NeedsHelp, step, reason, history).await);
                }
                _ => {}
            }

            if guard.observe(action.key()) {
                warn!(step, key = %action.key(), "action loop detected");
                history.push(HistoryEntry {
                    step,
                    action,
                    result: "loop detected".into(),
                });
                let reason = "action loop detected".to_string();
                return Ok(self.finish(AgentState::Failed, step, reason, history).await);
            }

            self.state = AgentState::Acting;
            let result = self.act(tracker, &snapshot, &action).await;
            let result = match result {
                Ok(()) => {
                    failure_points = 0;
                    "ok".to_string()
                }
                Err(reason) => {
                    failure_points += if action.kind == ActionType::ClickButton { 1 } else { 2 };
                    warn!(step, action = action.kind.as_str(), target = ?action.target, %reason, "action failed");
                    reason
                }
            };
            info!(step, action = action.kind.as_str(), target = ?action.target, %result, "acted");
            history.push(HistoryEntry { step, action, result });

            if failure_points >= failure_budget {
                let reason = "too many consecutive failures".to_string();
                return Ok(self.finish(AgentState::Failed, step, reason, history).await);
            }
            if !self.config.step_delay.is_zero() {
                tokio::time::sleep(self.config.step_delay).await;
            }
        }

        let steps = self.config.max_steps;
        Ok(self
            .finish(AgentState::Failed, steps, "step limit reached".into(), history)
            .await)
    }

    async fn observe(&self) -> Result<Observation> {
        let classification = classify::inspect(self.dom).await?;
        if classification.account_creation {
            info!("account creation page; stopping for a human");
            return Ok(Observation::AccountCreation);
        }
        Ok(Observation::Page(extract::observe(self.dom).await?))
    }

    async fn act(&self, tracker: &mut FieldTracker, snapshot: &FormSnapshot, action: &AgentAction) -> Attempt {
        let timeout = self.config.fill.action_timeout;
        let attempt = match action.kind {
            // Fills carry their own timeout and record into the tracker.
            ActionType::FillField | ActionType::SelectOption => {
                return self.fill(tracker, snapshot, action).await;
            }
            ActionType::ClickButton => {
                tokio::time::timeout(timeout, self.click_button(snapshot, action.target.as_deref())).await
            }
            ActionType::ClickElement => {
                tokio::time::timeout(timeout, self.click_element(action.target.as_deref())).await
            }
            ActionType::Scroll => {
                let down = action.value.as_deref().map_or(true, |v| !v.trim().eq_ignore_ascii_case("up"));
                let pixels = if down { SCROLL_STEP } else { -SCROLL_STEP };
                tokio::time::timeout(timeout, async { self.dom.scroll_by(pixels).await.map(Ok) }).await
            }
            ActionType::Wait => {
                tokio::time::sleep(wait_duration(action.value.as_deref())).await;
                return Ok(());
            }
            ActionType::Done | ActionType::NeedHelp => return Ok(()),
        };
        match attempt {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {timeout:?}")),
        }
    }

    async fn fill(&self, tracker: &mut FieldTracker, snapshot: &FormSnapshot, action: &AgentAction) -> Attempt {
        let Some(target) = action.target.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Err("no target given".into());
        };
        let value = action.value.as_deref().unwrap_or_default();
        let field = match self.target_field(&snapshot.fields, target).await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(format!("no field matching {target:?}")),
            Err(e) => return Err(e.to_string()),
        };
        let executor = FillExecutor::new(self.dom, self.config.fill.clone());
        match executor.fill(tracker, &field, value, FillModule::Agent).await {
            FillOutcome::Filled | FillOutcome::AlreadyFilled => Ok(()),
            FillOutcome::Failed(reason) => Err(reason),
        }
    }

    /// Observed field by selector, label or `label[for]`; else any element
    /// the target resolves to as a selector, outside the autofill UI.
    async fn target_field(&self, fields: &[Field], target: &str) -> Result<Option<Field>> {
        if let Some(field) = fill::locate(self.dom, fields, target).await? {
            return Ok(Some(field));
        }
        let Ok(Some(handle)) = self.dom.resolve(target).await else {
            return Ok(None);
        };
        if self.dom.in_ui_layer(handle).await? {
            debug!(target, "target is part of the autofill UI");
            return Ok(None);
        }
        Ok(Some(self.bare_field(handle, target).await?))
    }

    async fn bare_field(&self, handle: ElementHandle, selector: &str) -> Result<Field> {
        let tag = self.dom.tag_name(handle).await?;
        let role = self.dom.attribute(handle, "role").await?;
        let (kind, widget) = match (tag.as_str(), role.as_deref()) {
            ("select", _) => (FieldKind::Select, Widget::Native),
            ("textarea", _) => (FieldKind::Textarea, Widget::Native),
            (_, Some("radio")) => (FieldKind::Radio, Widget::AriaRadio),
            (_, Some("combobox" | "listbox")) if tag != "input" => (FieldKind::Select, Widget::CustomDropdown),
            _ => {
                let input_type = self.dom.attribute(handle, "type").await?.unwrap_or_default();
                (FieldKind::from_input_type(&input_type).unwrap_or(FieldKind::Text), Widget::Native)
            }
        };
        Ok(Field {
            widget,
            ..Field::new(selector, kind, selector)
        })
    }

    async fn click_button(&self, snapshot: &FormSnapshot, target: Option<&str>) -> Result<Attempt> {
        let Some(target) = target.filter(|t| !t.trim().is_empty()) else {
            return Ok(Err("no button named".into()));
        };
        let Some(button) = match_button(&snapshot.buttons, target) else {
            return Ok(Err(format!("no offered button matches {target:?}")));
        };
        let Some(handle) = self.dom.resolve(&button.selector).await? else {
            return Ok(Err(format!("button {:?} disappeared", button.text)));
        };
        if !clickable(self.dom, handle).await? {
            return Ok(Err(format!("button {:?} is not clickable", button.text)));
        }
        debug!(selector = %button.selector, text = %button.text, "clicking button");
        self.dom.click(handle).await?;
        Ok(Ok(()))
    }

    async fn click_element(&self, target: Option<&str>) -> Result<Attempt> {
        let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Err("no element named".into()));
        };
        // Free text is rarely a valid selector; a parse error just means "try text".
        let mut found = self.dom.resolve(target).await.ok().flatten();
        if found.is_none() {
            let wanted = target.to_lowercase();
            for handle in self.dom.query_all(CLICK_TARGETS).await? {
                if self.dom.text(handle).await?.to_lowercase() == wanted {
                    found = Some(handle);
                    break;
                }
            }
        }
        let Some(handle) = found else {
            return Ok(Err(format!("no element matches {target:?}")));
        };
        if !clickable(self.dom, handle).await? {
            return Ok(Err(format!("element {target:?} is not clickable")));
        }
        self.dom.click(handle).await?;
        Ok(Ok(()))
    }

    async fn finish(
        &mut self,
        state: AgentState,
        steps_taken: usize,
        reason: String,
        history: Vec<HistoryEntry>,
    ) -> AgentOutcome {
        self.state = state;
        let outcome = AgentOutcome {
            success: state == AgentState::Done,
            state,
            steps_taken,
            reason,
            history,
        };
        info!(success = outcome.success, state = ?state, steps = steps_taken, reason = %outcome.reason, "agent run finished");

        if let Some(recorder) = self.recorder {
            let url = match self.dom.url().await {
                Ok(url) => normalize_url(&url),
                Err(e) => {
                    warn!(error = %e, "could not read page url for history");
                    String::new()
                }
            };
            if let Err(e) = recorder.record(&url, &outcome).await {
                warn!(%url, error = %e, "failed to record outcome");
            }
        }
        outcome
    }
}

enum Observation {
    Page(FormSnapshot),
    AccountCreation,
}

/// Offered button whose text equals `target`, else the first one whose text
/// contains it or is contained in it (case-insensitive).
pub fn match_button<'b>(buttons: &'b [Button], target: &str) -> Option<&'b Button> {
    let wanted = target.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    buttons
        .iter()
        .find(|b| b.text.to_lowercase() == wanted)
        .or_else(|| {
            buttons.iter().find(|b| {
                let text = b.text.to_lowercase();
                text.contains(&wanted) || wanted.contains(&text)
            })
        })
}

fn wait_duration(value: Option<&str>) -> Duration {
    let seconds = value
        .and_then(|v| v.trim().trim_end_matches('s').trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .unwrap_or(1.0);
    Duration::from_secs_f64(seconds).min(MAX_WAIT)
}

fn non_empty(text: &str, default: &str) -> String {
    if text.trim().is_empty() {
        default.to_string()
    } else {
        text.trim().to_string()
    }
}
