use chromiumoxide::cdp::browser_protocol::dom::BackendNodeId;
use chromiumoxide::element::Element as CrElement;

use crate::error::{Error, Result};

/// A resolved chromiumoxide element used for real input events.
///
/// Reads go through in-page evaluation on [`crate::Page`]; this type only
/// carries the interactions that need trusted CDP input.
pub struct Element {
    inner: CrElement,
}

impl Element {
    pub(crate) fn new(inner: CrElement) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &CrElement {
        &self.inner
    }

    /// Click this element (scrolls into view first).
    pub async fn click(&self) -> Result<()> {
        self.inner.click().await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Type text into this element as key events.
    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.inner.type_str(text).await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Press a key on this element (e.g. "Enter", "Escape", "ArrowDown").
    pub async fn press_key(&self, key: &str) -> Result<()> {
        self.inner.press_key(key).await.map_err(Error::CdpError)?;
        Ok(())
    }

    pub async fn focus(&self) -> Result<()> {
        self.inner.focus().await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Backend node id, needed by `DOM.setFileInputFiles`.
    pub fn backend_node_id(&self) -> BackendNodeId {
        self.inner.backend_node_id.clone()
    }
}
