use crate::dom::{attr_selector, id_selector, DomInspector, ElementHandle};
use crate::error::Result;

/// Ancestors that usually wrap one question together with its caption.
pub(crate) const CONTAINER_SELECTOR: &str = "fieldset, .field, .form-group, .form-field, \
    .application-question, [class*=\"question\"], [class*=\"field\"], \
    [data-automation-id*=\"formField\"], li";

const CONTAINER_LABEL_SELECTOR: &str = "label, legend, [class*=\"label\"]";

const MAX_LABEL_CHARS: usize = 120;

/// A resolved caption and whether it carried a required marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Label {
    pub text: String,
    pub starred: bool,
    /// No channel produced a caption; `text` is the `Field {position}` fallback.
    pub positional: bool,
}

impl Label {
    fn positional(position: usize) -> Self {
        Self {
            text: format!("Field {position}"),
            starred: false,
            positional: true,
        }
    }
}

/// Resolve a caption for `handle`.
///
/// First non-empty channel wins: ARIA, explicit `<label>` association,
/// placeholder, the nearest container's caption, raw name/id, then
/// `Field {position}`.
pub(crate) async fn resolve_label<D>(dom: &D, handle: ElementHandle, position: usize) -> Label
where
    D: DomInspector + ?Sized,
{
    match label_channels(dom, handle).await {
        Ok(Some(raw)) => Label {
            starred: raw.trim_end().ends_with('*'),
            text: clean_label(&raw),
            positional: false,
        },
        Ok(None) => Label::positional(position),
        Err(e) => {
            tracing::debug!(error = %e, "label resolution failed; using positional name");
            Label::positional(position)
        }
    }
}

async fn label_channels<D>(dom: &D, handle: ElementHandle) -> Result<Option<String>>
where
    D: DomInspector + ?Sized,
{
    if let Some(text) = aria_label(dom, handle).await? {
        return Ok(Some(text));
    }

    let id = non_empty(dom.attribute(handle, "id").await?);
    if let Some(id) = &id {
        for label in dom.query_all(&attr_selector("label", "for", id)).await? {
            if let Some(text) = non_empty(Some(dom.text(label).await?)) {
                return Ok(Some(text));
            }
        }
    }
    if let Some(wrapper) = dom.closest(handle, "label").await? {
        if wrapper != handle {
            if let Some(text) = non_empty(Some(dom.text(wrapper).await?)) {
                return Ok(Some(text));
            }
        }
    }

    if let Some(placeholder) = non_empty(dom.attribute(handle, "placeholder").await?) {
        return Ok(Some(placeholder));
    }

    if let Some(text) = container_caption(dom, handle, &[]).await? {
        return Ok(Some(text));
    }

    Ok(non_empty(dom.attribute(handle, "name").await?).or(id))
}

/// A control's own caption: ARIA, `<label for>`, or a wrapping `<label>`.
/// Never looks at the surrounding container.
pub(crate) async fn own_label<D>(dom: &D, handle: ElementHandle) -> Result<Option<String>>
where
    D: DomInspector + ?Sized,
{
    if let Some(text) = aria_label(dom, handle).await? {
        return Ok(Some(clean_label(&text)));
    }
    if let Some(id) = non_empty(dom.attribute(handle, "id").await?) {
        for label in dom.query_all(&attr_selector("label", "for", &id)).await? {
            if let Some(text) = non_empty(Some(dom.text(label).await?)) {
                return Ok(Some(clean_label(&text)));
            }
        }
    }
    if let Some(wrapper) = dom.closest(handle, "label").await? {
        if wrapper != handle {
            return Ok(non_empty(Some(dom.text(wrapper).await?)).map(|t| clean_label(&t)));
        }
    }
    Ok(None)
}

/// `aria-label`, else the joined text of `aria-labelledby` targets.
pub(crate) async fn aria_label<D>(dom: &D, handle: ElementHandle) -> Result<Option<String>>
where
    D: DomInspector + ?Sized,
{
    if let Some(text) = non_empty(dom.attribute(handle, "aria-label").await?) {
        return Ok(Some(text));
    }
    let Some(ids) = dom.attribute(handle, "aria-labelledby").await? else {
        return Ok(None);
    };
    let mut parts = Vec::new();
    for id in ids.split_whitespace() {
        if let Some(target) = dom.resolve(&id_selector(id)).await? {
            let text = dom.text(target).await?;
            if !text.trim().is_empty() {
                parts.push(text.trim().to_string());
            }
        }
    }
    Ok(non_empty(Some(parts.join(" "))))
}

/// Caption of the nearest labelled container, skipping `<label for=...>`
/// elements that belong to one of `exclude_ids`.
pub(crate) async fn container_caption<D>(
    dom: &D,
    handle: ElementHandle,
    exclude_ids: &[String],
) -> Result<Option<String>>
where
    D: DomInspector + ?Sized,
{
    let Some(container) = dom.closest(handle, CONTAINER_SELECTOR).await? else {
        return Ok(None);
    };
    for caption in dom.query_within(container, CONTAINER_LABEL_SELECTOR).await? {
        if let Some(target) = dom.attribute(caption, "for").await? {
            if exclude_ids.contains(&target) {
                continue;
            }
        }
        // A caption wrapping a control is that control's own label.
        if !dom.query_within(caption, "input, select, textarea").await?.is_empty() {
            continue;
        }
        if let Some(text) = non_empty(Some(dom.text(caption).await?)) {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// Collapse whitespace, drop required markers, cap the length.
pub fn clean_label(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(['*', ' ', ':']).trim();
    match trimmed.char_indices().nth(MAX_LABEL_CHARS) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_label_strips_markers() {
        assert_eq!(clean_label("  First   Name *\n"), "First Name");
        assert_eq!(clean_label("Email:"), "Email");
        assert_eq!(clean_label(&"x".repeat(300)).len(), MAX_LABEL_CHARS);
    }
}
