//! Capability interface over a live or static document.
//!
//! All form-understanding logic (classification, extraction, filling, the
//! agent loop) is written against [`DomInspector`] and [`PageActions`], so it
//! runs the same against a real browser [`crate::Page`] and an in-memory
//! [`HtmlDom`].

mod html;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use html::{HtmlDom, Interaction, InteractionKind};

/// Attribute used to address an element by its handle.
pub const HANDLE_ATTR: &str = "data-af-id";

/// Marks the tool's own injected UI; nothing under it is extracted or clicked.
pub const UI_LAYER_SELECTOR: &str = "[data-autofill-ui]";

/// Opaque reference to one element, stable for the lifetime of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

impl ElementHandle {
    /// Selector that addresses exactly this element.
    pub fn selector(self) -> String {
        format!("[{HANDLE_ATTR}=\"{}\"]", self.0)
    }

    /// Parse a selector produced by [`ElementHandle::selector`].
    pub fn from_selector(selector: &str) -> Option<Self> {
        let rest = selector.trim().strip_prefix('[')?.strip_suffix(']')?;
        let value = rest.strip_prefix(HANDLE_ATTR)?.strip_prefix('=')?;
        let value = value.trim_matches(|c| c == '"' || c == '\'');
        value.parse().ok().map(ElementHandle)
    }
}

/// Whether extraction keeps hidden controls.
///
/// Rule-based passes only ever see what a user could see. The agent observes
/// everything so it can ask for the click that reveals a hidden section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationMode {
    AgentFull,
    RuleVisible,
}

/// How a native `<select>` option is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectBy {
    Label(String),
    Value(String),
}

/// One `<option>` of a native select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeOption {
    pub value: String,
    pub text: String,
    pub selected: bool,
}

/// Read-only view of a document.
#[async_trait]
pub trait DomInspector: Send + Sync {
    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// Descendants of `scope` matching `selector`, in document order.
    async fn query_within(&self, scope: ElementHandle, selector: &str)
        -> Result<Vec<ElementHandle>>;

    /// Nearest inclusive ancestor of `handle` matching `selector`.
    async fn closest(&self, handle: ElementHandle, selector: &str)
        -> Result<Option<ElementHandle>>;

    /// Has a layout box and is not `visibility:hidden`.
    async fn computed_visible(&self, handle: ElementHandle) -> Result<bool>;

    /// Rendered text, whitespace collapsed.
    async fn text(&self, handle: ElementHandle) -> Result<String>;

    async fn attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<String>>;

    /// Lowercase tag name.
    async fn tag_name(&self, handle: ElementHandle) -> Result<String>;

    /// Current `value` property (not the attribute).
    async fn value(&self, handle: ElementHandle) -> Result<String>;

    async fn is_checked(&self, handle: ElementHandle) -> Result<bool>;

    async fn is_disabled(&self, handle: ElementHandle) -> Result<bool>;

    /// Options of a native `<select>`.
    async fn native_options(&self, handle: ElementHandle) -> Result<Vec<NativeOption>>;

    async fn url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    async fn body_text(&self) -> Result<String>;

    /// First element matching `selector`.
    async fn resolve(&self, selector: &str) -> Result<Option<ElementHandle>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    /// Whether `handle` belongs to the tool's own injected UI.
    async fn in_ui_layer(&self, handle: ElementHandle) -> Result<bool> {
        Ok(self.closest(handle, UI_LAYER_SELECTOR).await?.is_some())
    }
}

/// Interactions with a document. Every call is a suspension point.
#[async_trait]
pub trait PageActions: DomInspector {
    async fn click(&self, handle: ElementHandle) -> Result<()>;

    async fn focus(&self, handle: ElementHandle) -> Result<()>;

    /// Replace the value and fire `input`/`change`.
    async fn set_value(&self, handle: ElementHandle, value: &str) -> Result<()>;

    /// Type keystrokes into the element, appending to its value.
    async fn type_text(&self, handle: ElementHandle, text: &str) -> Result<()>;

    /// Press a named key ("Enter", "Escape", "ArrowDown") on the element.
    async fn press_key(&self, handle: ElementHandle, key: &str) -> Result<()>;

    /// Returns `false` when no option matched.
    async fn select_native(&self, handle: ElementHandle, by: &SelectBy) -> Result<bool>;

    async fn set_files(&self, handle: ElementHandle, files: &[PathBuf]) -> Result<()>;

    /// Positive scrolls down.
    async fn scroll_by(&self, pixels: i32) -> Result<()>;
}

/// `[name="value"]` with the value quoted for CSS.
pub fn attr_selector(tag: &str, attr: &str, value: &str) -> String {
    format!("{tag}[{attr}=\"{}\"]", css_escape(value))
}

/// Selector for an element id, using `#id` only when it is a plain identifier.
pub fn id_selector(id: &str) -> String {
    let plain = id
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        format!("#{id}")
    } else {
        attr_selector("", "id", id)
    }
}

fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
