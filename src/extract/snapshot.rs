use tracing::debug;

use super::{stable_selector, FieldExtractor};
use crate::dom::{DomInspector, ElementHandle};
use crate::error::Result;
use crate::field::{Button, ButtonKind, FormSnapshot};

const BUTTON_SELECTOR: &str = "button, input[type=\"submit\"], input[type=\"button\"], \
    [role=\"button\"], a[class*=\"btn\"], a[class*=\"button\"]";

const ERROR_SELECTOR: &str = "[role=\"alert\"], .error, .field-error, .error-message, \
    [class*=\"error-message\"], [class*=\"invalid-feedback\"], [id*=\"error\"]";

const SECTION_SELECTOR: &str = "[aria-current=\"step\"], [aria-current=\"page\"], \
    .active-step, [class*=\"step--active\"]";

const MAX_ERRORS: usize = 10;
const MAX_ERROR_CHARS: usize = 200;

/// One agent observation: every field (visibility flagged), the clickable
/// buttons, visible error messages and the current section.
pub async fn observe<D>(dom: &D) -> Result<FormSnapshot>
where
    D: DomInspector + ?Sized,
{
    let fields = FieldExtractor::agent().extract(dom).await;
    let buttons = discover_buttons(dom).await?;
    let errors = discover_errors(dom).await?;
    let current_section = current_section(dom).await?;
    let snapshot = FormSnapshot {
        url: dom.url().await?,
        title: dom.title().await?,
        fields,
        buttons,
        errors,
        current_section,
    };
    debug!(
        url = %snapshot.url,
        fields = snapshot.fields.len(),
        buttons = snapshot.buttons.len(),
        errors = snapshot.errors.len(),
        "observed page"
    );
    Ok(snapshot)
}

/// Enabled, visible buttons outside the tool's own UI.
pub async fn discover_buttons<D>(dom: &D) -> Result<Vec<Button>>
where
    D: DomInspector + ?Sized,
{
    let mut buttons: Vec<Button> = Vec::new();
    for handle in dom.query_all(BUTTON_SELECTOR).await? {
        if !clickable(dom, handle).await? {
            continue;
        }
        let text = button_text(dom, handle).await?;
        if text.is_empty() {
            continue;
        }
        let selector = stable_selector(dom, handle).await?;
        if buttons.iter().any(|b| b.selector == selector) {
            continue;
        }
        buttons.push(Button {
            kind: ButtonKind::from_text(&text),
            selector,
            text,
        });
    }
    Ok(buttons)
}

pub(crate) async fn clickable<D>(dom: &D, handle: ElementHandle) -> Result<bool>
where
    D: DomInspector + ?Sized,
{
    Ok(!dom.in_ui_layer(handle).await?
        && dom.computed_visible(handle).await?
        && !dom.is_disabled(handle).await?
        && dom.attribute(handle, "aria-hidden").await?.as_deref() != Some("true"))
}

async fn button_text<D>(dom: &D, handle: ElementHandle) -> Result<String>
where
    D: DomInspector + ?Sized,
{
    let text = dom.text(handle).await?;
    if !text.trim().is_empty() {
        return Ok(text.trim().to_string());
    }
    for attr in ["value", "aria-label", "title"] {
        if let Some(v) = dom.attribute(handle, attr).await? {
            if !v.trim().is_empty() {
                return Ok(v.trim().to_string());
            }
        }
    }
    Ok(String::new())
}

async fn discover_errors<D>(dom: &D) -> Result<Vec<String>>
where
    D: DomInspector + ?Sized,
{
    let mut errors: Vec<String> = Vec::new();
    for handle in dom.query_all(ERROR_SELECTOR).await? {
        if errors.len() >= MAX_ERRORS {
            break;
        }
        if dom.in_ui_layer(handle).await? || !dom.computed_visible(handle).await? {
            continue;
        }
        let text = dom.text(handle).await?;
        let text: String = text.trim().chars().take(MAX_ERROR_CHARS).collect();
        if !text.is_empty() && !errors.contains(&text) {
            errors.push(text);
        }
    }
    Ok(errors)
}

async fn current_section<D>(dom: &D) -> Result<Option<String>>
where
    D: DomInspector + ?Sized,
{
    for selector in [SECTION_SELECTOR, "h2", "h1"] {
        for handle in dom.query_all(selector).await? {
            if dom.in_ui_layer(handle).await? || !dom.computed_visible(handle).await? {
                continue;
            }
            let text = dom.text(handle).await?;
            if !text.trim().is_empty() {
                return Ok(Some(text.trim().to_string()));
            }
        }
    }
    Ok(None)
}
