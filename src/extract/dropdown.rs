use crate::dom::{id_selector, DomInspector, ElementHandle};
use crate::error::Result;
use crate::field::FieldOption;

/// Container selectors of the dropdown libraries seen on ATS pages.
pub(crate) const DROPDOWN_PATTERNS: &[&str] = &[
    "[role=\"combobox\"]",
    "[aria-haspopup=\"listbox\"]",
    ".select2-selection",
    "[class*=\"select__control\"]",
    ".chosen-single",
    "[data-automation-id=\"selectWidget\"]",
];

/// Containers inspected per pattern.
pub const MAX_CONTAINERS_PER_PATTERN: usize = 10;

/// Options kept per dropdown.
pub const MAX_OPTIONS: usize = 20;

pub(crate) const OPTION_SELECTOR: &str = "[role=\"option\"], [class*=\"option\"]";

const SINGLE_VALUE_SELECTOR: &str = "[class*=\"single-value\"], [class*=\"singleValue\"], \
    .select2-selection__rendered, .chosen-single span";

/// Listbox linked through `aria-controls` / `aria-owns`.
pub(crate) async fn linked_listbox<D>(dom: &D, handle: ElementHandle) -> Result<Option<ElementHandle>>
where
    D: DomInspector + ?Sized,
{
    for attr in ["aria-controls", "aria-owns"] {
        let Some(ids) = dom.attribute(handle, attr).await? else {
            continue;
        };
        for id in ids.split_whitespace() {
            if let Some(listbox) = dom.resolve(&id_selector(id)).await? {
                return Ok(Some(listbox));
            }
        }
    }
    Ok(None)
}

/// Options of a custom dropdown: ARIA-linked listbox first, then
/// option-shaped descendants. Capped at [`MAX_OPTIONS`].
pub(crate) async fn dropdown_options<D>(dom: &D, container: ElementHandle) -> Result<Vec<FieldOption>>
where
    D: DomInspector + ?Sized,
{
    let mut handles = Vec::new();
    if let Some(listbox) = linked_listbox(dom, container).await? {
        handles = dom.query_within(listbox, "[role=\"option\"]").await?;
    }
    if handles.is_empty() {
        handles = dom.query_within(container, OPTION_SELECTOR).await?;
    }
    options_from(dom, &handles, false).await
}

/// Turn option elements into [`FieldOption`]s, optionally visible-only.
pub(crate) async fn options_from<D>(
    dom: &D,
    handles: &[ElementHandle],
    visible_only: bool,
) -> Result<Vec<FieldOption>>
where
    D: DomInspector + ?Sized,
{
    let mut options: Vec<FieldOption> = Vec::new();
    for &handle in handles {
        if options.len() >= MAX_OPTIONS {
            break;
        }
        if visible_only && !dom.computed_visible(handle).await? {
            continue;
        }
        let text = dom.text(handle).await?.trim().to_string();
        if text.is_empty() || options.iter().any(|o| o.text == text) {
            continue;
        }
        let value = match dom.attribute(handle, "data-value").await? {
            Some(v) => v,
            None => dom.attribute(handle, "value").await?.unwrap_or_else(|| text.clone()),
        };
        options.push(FieldOption::new(value, text));
    }
    Ok(options)
}

/// Displayed selection of a custom dropdown.
pub(crate) async fn displayed_value<D>(
    dom: &D,
    container: ElementHandle,
    target: ElementHandle,
) -> Result<String>
where
    D: DomInspector + ?Sized,
{
    let value = dom.value(target).await?;
    if !value.trim().is_empty() {
        return Ok(value.trim().to_string());
    }
    if container != target {
        let value = dom.value(container).await?;
        if !value.trim().is_empty() {
            return Ok(value.trim().to_string());
        }
    }
    for shown in dom.query_within(container, SINGLE_VALUE_SELECTOR).await? {
        let text = dom.text(shown).await?;
        if !text.trim().is_empty() {
            return Ok(text.trim().to_string());
        }
    }
    Ok(String::new())
}
