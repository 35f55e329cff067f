//! Field extraction: every fillable control on the page as a canonical
//! [`Field`], deduplicated by selector.

mod dropdown;
mod label;
mod snapshot;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::dom::{attr_selector, DomInspector, ElementHandle, ObservationMode};
use crate::error::Result;
use crate::field::{Field, FieldKind, FieldOption, Widget};

pub use dropdown::{MAX_CONTAINERS_PER_PATTERN, MAX_OPTIONS};
pub use label::clean_label;
pub use snapshot::{discover_buttons, observe};

pub(crate) use dropdown::{linked_listbox, OPTION_SELECTOR};
pub(crate) use label::{own_label, resolve_label};
pub(crate) use snapshot::clickable;

/// Control families, scanned independently in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    TextLike,
    NativeSelect,
    CustomDropdown,
    RadioGroup,
    Checkbox,
    Textarea,
}

const SCANS: [Scan; 6] = [
    Scan::TextLike,
    Scan::NativeSelect,
    Scan::CustomDropdown,
    Scan::RadioGroup,
    Scan::Checkbox,
    Scan::Textarea,
];

/// Scans a document for fillable controls.
#[derive(Debug, Clone, Copy)]
pub struct FieldExtractor {
    mode: ObservationMode,
}

impl FieldExtractor {
    pub fn new(mode: ObservationMode) -> Self {
        Self { mode }
    }

    /// Visible controls only, for rule-based passes.
    pub fn visible() -> Self {
        Self::new(ObservationMode::RuleVisible)
    }

    /// All controls with visibility flagged, for agent observation.
    pub fn agent() -> Self {
        Self::new(ObservationMode::AgentFull)
    }

    pub fn mode(&self) -> ObservationMode {
        self.mode
    }

    /// Run every scan and deduplicate. A failing scan is logged and skipped.
    pub async fn extract<D>(&self, dom: &D) -> Vec<Field>
    where
        D: DomInspector + ?Sized,
    {
        let mut ctx = ScanContext {
            mode: self.mode,
            position: 0,
        };
        let mut fields = Vec::new();
        for scan in SCANS {
            match ctx.run(dom, scan).await {
                Ok(found) => {
                    debug!(?scan, count = found.len(), "scan complete");
                    fields.extend(found);
                }
                Err(e) => warn!(?scan, error = %e, "scan failed; skipping"),
            }
        }
        dedup_by_selector(fields)
    }
}

/// Keep the first record per selector, replacing it only with a later one
/// that has resolved options when the first has none.
pub fn dedup_by_selector(fields: Vec<Field>) -> Vec<Field> {
    let mut out: Vec<Field> = Vec::with_capacity(fields.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for field in fields {
        match seen.get(&field.selector) {
            Some(&i) => {
                if !out[i].has_resolved_options() && field.has_resolved_options() {
                    out[i] = field;
                }
            }
            None => {
                seen.insert(field.selector.clone(), out.len());
                out.push(field);
            }
        }
    }
    out
}

/// Shortest selector that addresses exactly this element: id, then name,
/// then the handle itself.
pub async fn stable_selector<D>(dom: &D, handle: ElementHandle) -> Result<String>
where
    D: DomInspector + ?Sized,
{
    if let Some(id) = dom.attribute(handle, "id").await?.filter(|v| !v.is_empty()) {
        let selector = crate::dom::id_selector(&id);
        if dom.query_all(&selector).await?.len() == 1 {
            return Ok(selector);
        }
    }
    if let Some(name) = dom.attribute(handle, "name").await?.filter(|v| !v.is_empty()) {
        let tag = dom.tag_name(handle).await?;
        let selector = attr_selector(&tag, "name", &name);
        if dom.query_all(&selector).await?.len() == 1 {
            return Ok(selector);
        }
    }
    Ok(handle.selector())
}

struct ScanContext {
    mode: ObservationMode,
    position: usize,
}

impl ScanContext {
    fn next_position(&mut self) -> usize {
        self.position += 1;
        self.position
    }

    async fn run<D>(&mut self, dom: &D, scan: Scan) -> Result<Vec<Field>>
    where
        D: DomInspector + ?Sized,
    {
        match scan {
            Scan::TextLike => self.scan_inputs(dom).await,
            Scan::NativeSelect => self.scan_selects(dom).await,
            Scan::CustomDropdown => self.scan_dropdowns(dom).await,
            Scan::RadioGroup => {
                let mut fields = self.scan_native_radios(dom).await?;
                fields.extend(self.scan_aria_radios(dom).await?);
                Ok(fields)
            }
            Scan::Checkbox => self.scan_checkboxes(dom).await,
            Scan::Textarea => self.scan_textareas(dom).await,
        }
    }

    /// Visibility gate shared by every scan. `None` means skip.
    async fn admit<D>(&self, dom: &D, handle: ElementHandle) -> Result<Option<bool>>
    where
        D: DomInspector + ?Sized,
    {
        if dom.in_ui_layer(handle).await? {
            return Ok(None);
        }
        let visible = dom.computed_visible(handle).await?;
        if !visible && self.mode == ObservationMode::RuleVisible {
            return Ok(None);
        }
        Ok(Some(visible))
    }

    async fn base_field<D>(
        &mut self,
        dom: &D,
        handle: ElementHandle,
        kind: FieldKind,
        visible: bool,
    ) -> Result<Field>
    where
        D: DomInspector + ?Sized,
    {
        Ok(self.labelled_field(dom, handle, kind, visible).await?.0)
    }

    /// A field plus whether its label fell back to the positional name.
    async fn labelled_field<D>(
        &mut self,
        dom: &D,
        handle: ElementHandle,
        kind: FieldKind,
        visible: bool,
    ) -> Result<(Field, bool)>
    where
        D: DomInspector + ?Sized,
    {
        let position = self.next_position();
        let label = resolve_label(dom, handle, position).await;
        let required = dom.attribute(handle, "required").await?.is_some()
            || dom.attribute(handle, "aria-required").await?.as_deref() == Some("true")
            || label.starred;
        let field = Field {
            selector: stable_selector(dom, handle).await?,
            kind,
            label: label.text,
            required,
            current_value: String::new(),
            options: None,
            group_name: None,
            widget: Widget::Native,
            name: dom.attribute(handle, "name").await?.filter(|n| !n.is_empty()),
            is_visible: visible,
        };
        Ok((field, label.positional))
    }

    async fn scan_inputs<D>(&mut self, dom: &D) -> Result<Vec<Field>>
    where
        D: DomInspector + ?Sized,
    {
        let mut fields = Vec::new();
        for handle in dom.query_all("input").await? {
            let input_type = dom.attribute(handle, "type").await?.unwrap_or_default();
            let Some(kind) = FieldKind::from_input_type(&input_type) else {
                continue;
            };
            if matches!(kind, FieldKind::Radio | FieldKind::Checkbox) {
                continue;
            }
            let Some(visible) = self.admit(dom, handle).await? else {
                continue;
            };
            let mut field = self.base_field(dom, handle, kind, visible).await?;
            field.current_value = dom.value(handle).await?;
            fields.push(field);
        }
        Ok(fields)
    }

    async fn scan_textareas<D>(&mut self, dom: &D) -> Result<Vec<Field>>
    where
        D: DomInspector + ?Sized,
    {
        let mut fields = Vec::new();
        for handle in dom.query_all("textarea").await? {
            let Some(visible) = self.admit(dom, handle).await? else {
                continue;
            };
            let mut field = self
                .base_field(dom, handle, FieldKind::Textarea, visible)
                .await?;
            field.current_value = dom.value(handle).await?;
            fields.push(field);
        }
        Ok(fields)
    }

    async fn scan_selects<D>(&mut self, dom: &D) -> Result<Vec<Field>>
    where
        D: DomInspector + ?Sized,
    {
        let mut fields = Vec::new();
        for handle in dom.query_all("select").await? {
            let Some(visible) = self.admit(dom, handle).await? else {
                continue;
            };
            let mut field = self
                .base_field(dom, handle, FieldKind::Select, visible)
                .await?;
            let native = dom.native_options(handle).await?;
            field.current_value = native
                .iter()
                .find(|o| o.selected)
                .map(|o| o.value.clone())
                .unwrap_or_default();
            field.options = Some(
                native
                    .into_iter()
                    .map(|o| FieldOption::new(o.value, o.text))
                    .collect(),
            );
            fields.push(field);
        }
        Ok(fields)
    }

    async fn scan_dropdowns<D>(&mut self, dom: &D) -> Result<Vec<Field>>
    where
        D: DomInspector + ?Sized,
    {
        let mut fields = Vec::new();
        for pattern in dropdown::DROPDOWN_PATTERNS {
            let containers = dom.query_all(pattern).await?;
            for container in containers.into_iter().take(MAX_CONTAINERS_PER_PATTERN) {
                if dom.tag_name(container).await? == "select" {
                    continue;
                }
                let Some(visible) = self.admit(dom, container).await? else {
                    continue;
                };
                let target = if dom.tag_name(container).await? == "input" {
                    container
                } else {
                    dom.query_within(container, "input")
                        .await?
                        .into_iter()
                        .next()
                        .unwrap_or(container)
                };
                let (mut field, positional) = self
                    .labelled_field(dom, target, FieldKind::Select, visible)
                    .await?;
                if positional && target != container {
                    let position = self.position;
                    field.label = resolve_label(dom, container, position).await.text;
                }
                field.widget = Widget::CustomDropdown;
                field.current_value = dropdown::displayed_value(dom, container, target).await?;
                let mut options = dropdown::dropdown_options(dom, container).await?;
                if options.is_empty() && target != container {
                    options = dropdown::dropdown_options(dom, target).await?;
                }
                field.options = Some(options);
                fields.push(field);
            }
        }
        Ok(fields)
    }

    async fn scan_native_radios<D>(&mut self, dom: &D) -> Result<Vec<Field>>
    where
        D: DomInspector + ?Sized,
    {
        let mut groups: Vec<(Option<String>, Vec<ElementHandle>)> = Vec::new();
        for handle in dom.query_all("input[type=\"radio\"]").await? {
            if dom.in_ui_layer(handle).await? {
                continue;
            }
            let name = dom.attribute(handle, "name").await?.filter(|n| !n.is_empty());
            match groups
                .iter_mut()
                .find(|(existing, _)| name.is_some() && *existing == name)
            {
                Some((_, members)) => members.push(handle),
                None => groups.push((name, vec![handle])),
            }
        }

        let mut fields = Vec::new();
        for (name, members) in groups {
            let mut visible = false;
            for &member in &members {
                visible |= dom.computed_visible(member).await?;
            }
            if !visible && self.mode == ObservationMode::RuleVisible {
                continue;
            }
            let position = self.next_position();
            let mut options = Vec::new();
            let mut current = String::new();
            let mut required = false;
            let mut member_ids = Vec::new();
            for &member in &members {
                let value = dom.value(member).await?;
                let text = label::own_label(dom, member)
                    .await?
                    .unwrap_or_else(|| value.clone());
                if dom.is_checked(member).await? {
                    current = value.clone();
                }
                required |= dom.attribute(member, "required").await?.is_some();
                if let Some(id) = dom.attribute(member, "id").await? {
                    member_ids.push(id);
                }
                options.push(FieldOption::new(value, text));
            }
            let label = self
                .group_label(dom, members[0], &member_ids, name.as_deref(), position)
                .await?;
            let selector = match &name {
                Some(name) => attr_selector("input", "name", name),
                None => stable_selector(dom, members[0]).await?,
            };
            fields.push(Field {
                selector,
                kind: FieldKind::Radio,
                required: required || label.ends_with('*'),
                label: clean_label(&label),
                current_value: current,
                options: Some(options),
                group_name: name.clone(),
                widget: Widget::Native,
                name,
                is_visible: visible,
            });
        }
        Ok(fields)
    }

    async fn group_label<D>(
        &self,
        dom: &D,
        first: ElementHandle,
        member_ids: &[String],
        name: Option<&str>,
        position: usize,
    ) -> Result<String>
    where
        D: DomInspector + ?Sized,
    {
        if let Some(fieldset) = dom.closest(first, "fieldset").await? {
            if let Some(legend) = dom.query_within(fieldset, "legend").await?.first() {
                let text = dom.text(*legend).await?;
                if !text.trim().is_empty() {
                    return Ok(text);
                }
            }
        }
        if let Some(group) = dom.closest(first, "[role=\"radiogroup\"]").await? {
            if let Some(text) = label::aria_label(dom, group).await? {
                return Ok(text);
            }
        }
        if let Some(text) = label::container_caption(dom, first, member_ids).await? {
            return Ok(text);
        }
        Ok(name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Field {position}")))
    }

    async fn scan_aria_radios<D>(&mut self, dom: &D) -> Result<Vec<Field>>
    where
        D: DomInspector + ?Sized,
    {
        let mut fields = Vec::new();
        for group in dom.query_all("[role=\"radiogroup\"]").await? {
            let members = dom.query_within(group, "[role=\"radio\"]").await?;
            if members.is_empty() {
                continue;
            }
            let Some(visible) = self.admit(dom, group).await? else {
                continue;
            };
            let mut field = self
                .base_field(dom, group, FieldKind::Radio, visible)
                .await?;
            let mut options = Vec::new();
            for &member in &members {
                let text = dom.text(member).await?.trim().to_string();
                let value = match dom.attribute(member, "data-value").await? {
                    Some(v) => v,
                    None => text.clone(),
                };
                if dom.attribute(member, "aria-checked").await?.as_deref() == Some("true") {
                    field.current_value = value.clone();
                }
                options.push(FieldOption::new(value, text));
            }
            field.options = Some(options);
            field.widget = Widget::AriaRadio;
            field.group_name = Some(field.selector.clone());
            fields.push(field);
        }
        Ok(fields)
    }

    async fn scan_checkboxes<D>(&mut self, dom: &D) -> Result<Vec<Field>>
    where
        D: DomInspector + ?Sized,
    {
        let mut fields = Vec::new();
        for handle in dom.query_all("input[type=\"checkbox\"], [role=\"checkbox\"]").await? {
            let Some(visible) = self.admit(dom, handle).await? else {
                continue;
            };
            let mut field = self
                .base_field(dom, handle, FieldKind::Checkbox, visible)
                .await?;
            if dom.is_checked(handle).await? {
                field.current_value = "true".into();
            }
            fields.push(field);
        }
        Ok(fields)
    }
}
