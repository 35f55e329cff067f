//! Per-kind fill strategies with at-most-once semantics per selector.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::FillConfig;
use crate::dom::{id_selector, ElementHandle, PageActions, SelectBy};
use crate::error::Result;
use crate::extract::{linked_listbox, own_label, OPTION_SELECTOR};
use crate::field::{Field, FieldKind, FieldOption, Widget};
use crate::resolve::{match_option, token_overlap_match};
use crate::tracker::{FieldTracker, FillModule};

/// Result of one [`FillExecutor::fill`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    Filled,
    /// The selector was already filled in this session; the page was not touched.
    AlreadyFilled,
    Failed(String),
}

impl FillOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Why an attempt did not take. Page errors are folded in as text.
type Attempt = std::result::Result<(), String>;

const TYPEAHEAD_PANEL_SELECTOR: &str = "[role=\"combobox\"], [aria-haspopup=\"listbox\"]";

const CHECKED_WORDS: &[&str] = &["check", "checked", "yes", "true", "1", "on", "agree", "i agree"];

/// Drives the interaction sequence for one field at a time.
pub struct FillExecutor<'a, D: PageActions + ?Sized> {
    dom: &'a D,
    config: FillConfig,
}

impl<'a, D> FillExecutor<'a, D>
where
    D: PageActions + ?Sized,
{
    pub fn new(dom: &'a D, config: FillConfig) -> Self {
        Self { dom, config }
    }

    pub fn dom(&self) -> &'a D {
        self.dom
    }

    /// Fill `field` with `value` and record the attempt in `tracker`.
    ///
    /// A selector the tracker already holds as filled returns
    /// [`FillOutcome::AlreadyFilled`] without any page interaction and
    /// without a new record.
    pub async fn fill(
        &self,
        tracker: &mut FieldTracker,
        field: &Field,
        value: &str,
        module: FillModule,
    ) -> FillOutcome {
        if tracker.is_filled(&field.selector) {
            debug!(selector = %field.selector, label = %field.label, "already filled; skipping");
            return FillOutcome::AlreadyFilled;
        }

        let attempt = tokio::time::timeout(self.config.action_timeout, self.attempt(field, value)).await;
        let failure = match attempt {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(reason))) => Some(reason),
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {:?}", self.config.action_timeout)),
        };

        match failure {
            None => {
                debug!(selector = %field.selector, label = %field.label, %module, "filled");
                tracker.record_success(&field.selector, &field.label, value, module);
                FillOutcome::Filled
            }
            Some(reason) => {
                warn!(selector = %field.selector, label = %field.label, %module, %reason, "fill failed");
                tracker.record_failure(&field.selector, &field.label, value, module, &reason);
                FillOutcome::Failed(reason)
            }
        }
    }

    async fn attempt(&self, field: &Field, value: &str) -> Result<Attempt> {
        let Some(handle) = self.dom.resolve(&field.selector).await? else {
            return Ok(Err("element not found".into()));
        };
        let needs_visible = !matches!(field.kind, FieldKind::File | FieldKind::Radio);
        if needs_visible && !self.dom.computed_visible(handle).await? {
            return Ok(Err("element not visible".into()));
        }

        match (field.kind, field.widget) {
            (FieldKind::Checkbox, _) => self.fill_checkbox(handle, value).await,
            (FieldKind::Radio, Widget::AriaRadio) => self.fill_aria_radio(handle, value).await,
            (FieldKind::Radio, _) => self.fill_native_radio(field, value).await,
            (FieldKind::Select, Widget::CustomDropdown) => self.fill_dropdown(handle, value).await,
            (FieldKind::Select, _) => self.fill_native_select(handle, value).await,
            (FieldKind::File, _) => {
                self.dom.set_files(handle, &[PathBuf::from(value)]).await?;
                Ok(Ok(()))
            }
            _ => self.fill_text(handle, value).await,
        }
    }

    async fn settle(&self) {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
    }

    async fn fill_text(&self, handle: ElementHandle, value: &str) -> Result<Attempt> {
        let before = self.dom.value(handle).await?;
        self.dom.focus(handle).await?;

        let typeahead = self.is_typeahead(handle).await? || self.open_panel(handle).await?.is_some();
        if typeahead {
            self.dom.set_value(handle, "").await?;
            self.dom.type_text(handle, value).await?;
            self.settle().await;
            if let Some(panel) = self.open_panel(handle).await? {
                let options = self.visible_options(Some(panel)).await?;
                if let Some(i) = pick(&options, value) {
                    self.dom.click(options[i].0).await?;
                } else if !options.is_empty() {
                    self.dom.press_key(handle, "ArrowDown").await?;
                    self.dom.press_key(handle, "Enter").await?;
                }
            }
        } else {
            self.dom.set_value(handle, value).await?;
        }

        let after = self.dom.value(handle).await?;
        if after != value && after == before {
            return Ok(Err("value unchanged after assignment".into()));
        }
        Ok(Ok(()))
    }

    async fn is_typeahead(&self, handle: ElementHandle) -> Result<bool> {
        Ok(self.dom.attribute(handle, "role").await?.as_deref() == Some("combobox")
            || self.dom.attribute(handle, "aria-autocomplete").await?.is_some())
    }

    /// Visible listbox linked to `handle` or its combobox container.
    async fn open_panel(&self, handle: ElementHandle) -> Result<Option<ElementHandle>> {
        let mut owners = vec![handle];
        if let Some(container) = self.dom.closest(handle, TYPEAHEAD_PANEL_SELECTOR).await? {
            if container != handle {
                owners.push(container);
            }
        }
        for owner in owners {
            if let Some(listbox) = linked_listbox(self.dom, owner).await? {
                if self.dom.computed_visible(listbox).await? {
                    return Ok(Some(listbox));
                }
            }
        }
        Ok(None)
    }

    /// Visible option elements inside `panel`, or anywhere on the page for
    /// menus rendered outside their control.
    async fn visible_options(
        &self,
        panel: Option<ElementHandle>,
    ) -> Result<Vec<(ElementHandle, FieldOption)>> {
        let handles = match panel {
            Some(panel) => self.dom.query_within(panel, OPTION_SELECTOR).await?,
            None => self.dom.query_all("[role=\"option\"]").await?,
        };
        let mut options = Vec::new();
        for handle in handles {
            if !self.dom.computed_visible(handle).await? {
                continue;
            }
            let text = self.dom.text(handle).await?;
            if text.is_empty() {
                continue;
            }
            let value = self
                .dom
                .attribute(handle, "data-value")
                .await?
                .unwrap_or_else(|| text.clone());
            options.push((handle, FieldOption::new(value, text)));
        }
        Ok(options)
    }

    async fn fill_native_select(&self, handle: ElementHandle, value: &str) -> Result<Attempt> {
        let options: Vec<FieldOption> = self
            .dom
            .native_options(handle)
            .await?
            .into_iter()
            .map(|o| FieldOption::new(o.value, o.text))
            .collect();
        let (label, option_value) = match match_option(&options, value) {
            Some(chosen) => (chosen.text.clone(), chosen.value.clone()),
            None => (value.to_string(), value.to_string()),
        };
        if self.dom.select_native(handle, &SelectBy::Label(label)).await? {
            return Ok(Ok(()));
        }
        if self.dom.select_native(handle, &SelectBy::Value(option_value)).await? {
            return Ok(Ok(()));
        }
        Ok(Err(format!("no option matching \"{value}\"")))
    }

    async fn fill_dropdown(&self, handle: ElementHandle, value: &str) -> Result<Attempt> {
        self.dom.click(handle).await?;
        self.settle().await;

        let mut panel = self.open_panel(handle).await?;
        let mut options = self.visible_options(panel).await?;
        if options.is_empty() && self.dom.tag_name(handle).await? == "input" {
            self.dom.type_text(handle, value).await?;
            self.settle().await;
            panel = self.open_panel(handle).await?;
            options = self.visible_options(panel).await?;
        }

        match pick(&options, value) {
            Some(i) => {
                self.dom.click(options[i].0).await?;
                Ok(Ok(()))
            }
            None => {
                self.dom.press_key(handle, "Escape").await?;
                Ok(Err(format!(
                    "no option matching \"{value}\" among {} shown",
                    options.len()
                )))
            }
        }
    }

    async fn fill_native_radio(&self, field: &Field, value: &str) -> Result<Attempt> {
        let mut members = Vec::new();
        for member in self.dom.query_all(&field.selector).await? {
            if self.dom.attribute(member, "type").await?.as_deref() != Some("radio") {
                continue;
            }
            let member_value = self.dom.value(member).await?;
            let text = own_label(self.dom, member)
                .await?
                .unwrap_or_else(|| member_value.clone());
            members.push((member, FieldOption::new(member_value, text)));
        }
        let Some(i) = pick(&members, value) else {
            return Ok(Err(format!("no option matching \"{value}\"")));
        };
        let member = members[i].0;
        let target = self.click_target(member).await?;
        self.dom.click(target).await?;
        if !self.dom.is_checked(member).await? {
            return Ok(Err("value unchanged after click".into()));
        }
        Ok(Ok(()))
    }

    /// The radio itself, or its label when the input is visually hidden.
    async fn click_target(&self, member: ElementHandle) -> Result<ElementHandle> {
        if self.dom.computed_visible(member).await? {
            return Ok(member);
        }
        if let Some(id) = self.dom.attribute(member, "id").await? {
            let selector = format!("label[for=\"{}\"]", id.replace('"', "\\\""));
            if let Some(label) = self.dom.resolve(&selector).await? {
                return Ok(label);
            }
        }
        Ok(self.dom.closest(member, "label").await?.unwrap_or(member))
    }

    async fn fill_aria_radio(&self, group: ElementHandle, value: &str) -> Result<Attempt> {
        let mut members = Vec::new();
        for member in self.dom.query_within(group, "[role=\"radio\"]").await? {
            let text = self.dom.text(member).await?;
            let member_value = self
                .dom
                .attribute(member, "data-value")
                .await?
                .unwrap_or_else(|| text.clone());
            members.push((member, FieldOption::new(member_value, text)));
        }
        let Some(i) = pick(&members, value) else {
            return Ok(Err(format!("no option matching \"{value}\"")));
        };
        let member = members[i].0;
        self.dom.click(member).await?;
        if self.dom.attribute(member, "aria-checked").await?.as_deref() != Some("true") {
            return Ok(Err("value unchanged after click".into()));
        }
        Ok(Ok(()))
    }

    async fn fill_checkbox(&self, handle: ElementHandle, value: &str) -> Result<Attempt> {
        let desired = wants_checked(value);
        if self.dom.is_checked(handle).await? == desired {
            return Ok(Ok(()));
        }
        self.dom.click(handle).await?;
        if self.dom.is_checked(handle).await? != desired {
            return Ok(Err("value unchanged after click".into()));
        }
        Ok(Ok(()))
    }
}

/// Whether a target value asks for a checked box.
pub fn wants_checked(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    CHECKED_WORDS.contains(&value.as_str())
}

/// Index of the option `value` names: rule-ordered match, then token overlap.
fn pick(options: &[(ElementHandle, FieldOption)], value: &str) -> Option<usize> {
    let plain: Vec<FieldOption> = options.iter().map(|(_, o)| o.clone()).collect();
    let chosen = match_option(&plain, value).or_else(|| token_overlap_match(&plain, value))?;
    plain.iter().position(|o| std::ptr::eq(o, chosen))
}

/// Locate a control the way an agent names it: selector, then label text,
/// then a `<label for>` whose text matches.
pub async fn locate<D>(dom: &D, fields: &[Field], target: &str) -> Result<Option<Field>>
where
    D: PageActions + ?Sized,
{
    let wanted = target.trim();
    if let Some(field) = fields.iter().find(|f| f.selector == wanted) {
        return Ok(Some(field.clone()));
    }
    let lowered = wanted.to_lowercase();
    if let Some(field) = fields
        .iter()
        .find(|f| f.label.to_lowercase() == lowered)
        .or_else(|| {
            fields
                .iter()
                .find(|f| !lowered.is_empty() && f.label.to_lowercase().contains(&lowered))
        })
    {
        return Ok(Some(field.clone()));
    }
    for label in dom.query_all("label[for]").await? {
        if !dom.text(label).await?.to_lowercase().contains(&lowered) || lowered.is_empty() {
            continue;
        }
        let Some(id) = dom.attribute(label, "for").await? else {
            continue;
        };
        let selector = id_selector(&id);
        if let Some(field) = fields.iter().find(|f| f.selector == selector) {
            return Ok(Some(field.clone()));
        }
    }
    Ok(None)
}
