use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::page::Page as CrPage;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::dom::{DomInspector, ElementHandle, NativeOption, PageActions, SelectBy, HANDLE_ATTR};
use crate::element::Element;
use crate::error::{Error, Result};

/// In-page registry that hands out `data-af-id` handles. Handles live as
/// long as the document does.
const HANDLE_PRELUDE: &str = r#"
const __af = window.__applyPilot || (window.__applyPilot = {
    next: 1,
    id(el) {
        let v = el.getAttribute('__ATTR__');
        if (!v) { v = String(this.next++); el.setAttribute('__ATTR__', v); }
        return Number(v);
    },
    el(id) {
        const el = document.querySelector('[__ATTR__="' + id + '"]');
        if (!el) throw new Error('stale element handle ' + id);
        return el;
    },
});
"#;

#[derive(Deserialize)]
struct JsOption {
    value: String,
    text: String,
    selected: bool,
}

/// A live chromiumoxide page behind the [`DomInspector`] and
/// [`PageActions`] interfaces.
pub struct Page {
    inner: CrPage,
    default_timeout: Duration,
}

impl Page {
    pub(crate) fn new(inner: CrPage, default_timeout: Duration) -> Self {
        Self { inner, default_timeout }
    }

    /// Returns a reference to the underlying chromiumoxide Page.
    pub fn inner(&self) -> &CrPage {
        &self.inner
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Navigate to the given URL and wait for the page to load.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    pub async fn reload(&self) -> Result<()> {
        self.inner
            .reload()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Wait for a navigation to complete.
    pub async fn wait_for_navigation(&self) -> Result<()> {
        self.inner
            .wait_for_navigation()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Wait for an element matching `selector` to appear.
    /// Polls every 100ms up to the configured default timeout.
    pub async fn wait_for_selector(&self, selector: &str) -> Result<ElementHandle> {
        let interval = Duration::from_millis(100);
        let start = std::time::Instant::now();
        loop {
            if let Some(handle) = self.resolve(selector).await? {
                return Ok(handle);
            }
            if start.elapsed() >= self.default_timeout {
                return Err(Error::Timeout(format!("selector {selector}")));
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Full HTML of the current document.
    pub async fn html(&self) -> Result<String> {
        self.inner
            .content()
            .await
            .map_err(|e| Error::JsError(e.to_string()))
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// Run `body` (a function body that `return`s a JSON-serialisable value)
    /// with the handle registry in scope.
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        let prelude = HANDLE_PRELUDE.replace("__ATTR__", HANDLE_ATTR);
        let js = format!("(() => {{ {prelude}\nreturn JSON.stringify((() => {{ {body} }})()); }})()");
        let result = self
            .inner
            .evaluate(js)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        let json: String = result
            .into_value()
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Like [`Page::eval`] with `el` bound to the element behind `handle`.
    async fn eval_on<T: DeserializeOwned>(&self, handle: ElementHandle, body: &str) -> Result<T> {
        self.eval(&format!("const el = __af.el({});\n{body}", handle.0))
            .await
    }

    async fn element(&self, handle: ElementHandle) -> Result<Element> {
        let el = self
            .inner
            .find_element(handle.selector())
            .await
            .map_err(|e| Error::ElementNotFound(e.to_string()))?;
        Ok(Element::new(el))
    }
}

fn js_str(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn handles(ids: Vec<u64>) -> Vec<ElementHandle> {
    ids.into_iter().map(ElementHandle).collect()
}

#[async_trait]
impl DomInspector for Page {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let sel = js_str(selector)?;
        let ids: Vec<u64> = self
            .eval(&format!(
                "return Array.from(document.querySelectorAll({sel})).map(e => __af.id(e));"
            ))
            .await
            .map_err(|e| Error::InvalidSelector {
                selector: selector.to_string(),
                reason: e.to_string(),
            })?;
        Ok(handles(ids))
    }

    async fn query_within(&self, scope: ElementHandle, selector: &str) -> Result<Vec<ElementHandle>> {
        let sel = js_str(selector)?;
        let ids: Vec<u64> = self
            .eval_on(
                scope,
                &format!("return Array.from(el.querySelectorAll({sel})).map(e => __af.id(e));"),
            )
            .await?;
        Ok(handles(ids))
    }

    async fn closest(&self, handle: ElementHandle, selector: &str) -> Result<Option<ElementHandle>> {
        let sel = js_str(selector)?;
        let id: Option<u64> = self
            .eval_on(
                handle,
                &format!("const c = el.closest({sel}); return c ? __af.id(c) : null;"),
            )
            .await?;
        Ok(id.map(ElementHandle))
    }

    async fn computed_visible(&self, handle: ElementHandle) -> Result<bool> {
        self.eval_on(
            handle,
            "const r = el.getBoundingClientRect();
             const s = window.getComputedStyle(el);
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';",
        )
        .await
    }

    async fn text(&self, handle: ElementHandle) -> Result<String> {
        self.eval_on(
            handle,
            "return (el.innerText || el.textContent || '').replace(/\\s+/g, ' ').trim();",
        )
        .await
    }

    async fn attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<String>> {
        let name = js_str(name)?;
        self.eval_on(handle, &format!("return el.getAttribute({name});"))
            .await
    }

    async fn tag_name(&self, handle: ElementHandle) -> Result<String> {
        self.eval_on(handle, "return el.tagName.toLowerCase();").await
    }

    async fn value(&self, handle: ElementHandle) -> Result<String> {
        self.eval_on(handle, "return String(el.value ?? '');").await
    }

    async fn is_checked(&self, handle: ElementHandle) -> Result<bool> {
        self.eval_on(
            handle,
            "return !!el.checked || el.getAttribute('aria-checked') === 'true';",
        )
        .await
    }

    async fn is_disabled(&self, handle: ElementHandle) -> Result<bool> {
        self.eval_on(
            handle,
            "return !!el.disabled || el.getAttribute('aria-disabled') === 'true';",
        )
        .await
    }

    async fn native_options(&self, handle: ElementHandle) -> Result<Vec<NativeOption>> {
        let options: Vec<JsOption> = self
            .eval_on(
                handle,
                "return Array.from(el.options || []).map(o => ({
                    value: o.value, text: (o.text || '').trim(), selected: o.selected
                }));",
            )
            .await?;
        Ok(options
            .into_iter()
            .map(|o| NativeOption {
                value: o.value,
                text: o.text,
                selected: o.selected,
            })
            .collect())
    }

    async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    async fn title(&self) -> Result<String> {
        self.eval("return document.title || '';").await
    }

    async fn body_text(&self) -> Result<String> {
        self.eval("return document.body ? document.body.innerText : '';")
            .await
    }
}

#[async_trait]
impl PageActions for Page {
    async fn click(&self, handle: ElementHandle) -> Result<()> {
        // Mouse clicks fail on zero-size controls such as styled-away radio
        // inputs; those still accept a synthetic click.
        if let Err(e) = self.element(handle).await?.click().await {
            debug!(handle = handle.0, error = %e, "trusted click failed, dispatching in page");
            self.eval_on::<bool>(handle, "el.click(); return true;").await?;
        }
        Ok(())
    }

    async fn focus(&self, handle: ElementHandle) -> Result<()> {
        self.element(handle).await?.focus().await
    }

    async fn set_value(&self, handle: ElementHandle, value: &str) -> Result<()> {
        let value = js_str(value)?;
        // Go through the prototype setter so framework-managed inputs see it.
        self.eval_on::<bool>(
            handle,
            &format!(
                "const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
                    : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype
                    : HTMLInputElement.prototype;
                 const desc = Object.getOwnPropertyDescriptor(proto, 'value');
                 if (desc && desc.set) {{ desc.set.call(el, {value}); }} else {{ el.value = {value}; }}
                 el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                 return true;"
            ),
        )
        .await?;
        Ok(())
    }

    async fn type_text(&self, handle: ElementHandle, text: &str) -> Result<()> {
        let element = self.element(handle).await?;
        element.focus().await?;
        element.type_text(text).await
    }

    async fn press_key(&self, handle: ElementHandle, key: &str) -> Result<()> {
        self.element(handle).await?.press_key(key).await
    }

    async fn select_native(&self, handle: ElementHandle, by: &SelectBy) -> Result<bool> {
        let (field, wanted) = match by {
            SelectBy::Label(label) => ("(o.text || '').trim().toLowerCase()", label.trim().to_lowercase()),
            SelectBy::Value(value) => ("o.value", value.clone()),
        };
        let wanted = js_str(&wanted)?;
        self.eval_on(
            handle,
            &format!(
                "const i = Array.from(el.options || []).findIndex(o => {field} === {wanted});
                 if (i < 0) return false;
                 el.selectedIndex = i;
                 el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                 return true;"
            ),
        )
        .await
    }

    async fn set_files(&self, handle: ElementHandle, files: &[PathBuf]) -> Result<()> {
        let element = self.element(handle).await?;
        let files = files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        let mut params = SetFileInputFilesParams::new(files);
        params.backend_node_id = Some(element.backend_node_id());
        self.inner.execute(params).await?;
        Ok(())
    }

    async fn scroll_by(&self, pixels: i32) -> Result<()> {
        self.eval::<bool>(&format!("window.scrollBy(0, {pixels}); return true;"))
            .await?;
        Ok(())
    }
}
