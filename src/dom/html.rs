use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

use super::{DomInspector, ElementHandle, NativeOption, PageActions, SelectBy};
use crate::error::{Error, Result};

/// A static HTML document with just enough behaviour to be filled.
///
/// Parsed once with `scraper`; mutable state (values, checked state,
/// revealed panels) lives in an overlay. Clicks follow ARIA wiring:
/// `aria-controls` toggles the controlled element, clicking a
/// `role="option"` writes its text to the combobox that owns the listbox.
/// Every interaction is recorded.
pub struct HtmlDom {
    url: String,
    title: String,
    document: Mutex<Html>,
    nodes: Vec<Node>,
    state: Mutex<State>,
}

struct Node {
    id: NodeId,
    tag: String,
    attrs: Vec<(String, String)>,
    parent: Option<usize>,
    content: Vec<Content>,
}

enum Content {
    Text(String),
    Child(usize),
}

#[derive(Default)]
struct State {
    values: HashMap<usize, String>,
    checked: HashMap<usize, bool>,
    selected: HashMap<usize, usize>,
    attrs: HashMap<(usize, String), String>,
    shown: HashSet<usize>,
    hidden: HashSet<usize>,
    interactions: Vec<Interaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Click,
    Focus,
    SetValue,
    TypeText,
    PressKey,
    Select,
    SetFiles,
    Scroll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub kind: InteractionKind,
    pub handle: Option<ElementHandle>,
    pub detail: String,
}

impl HtmlDom {
    pub fn parse(url: impl Into<String>, html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut nodes = Vec::new();
        collect(document.root_element(), None, &mut nodes);
        let mut dom = Self {
            url: url.into(),
            title: String::new(),
            document: Mutex::new(document),
            nodes,
            state: Mutex::new(State::default()),
        };
        if let Some(idx) = dom.nodes.iter().position(|n| n.tag == "title") {
            let mut out = String::new();
            dom.raw_text(idx, &mut out);
            dom.title = collapse(&out);
        }
        dom
    }

    /// Every interaction performed so far, in order.
    pub fn interactions(&self) -> Vec<Interaction> {
        self.lock().interactions.clone()
    }

    pub fn interaction_count(&self) -> usize {
        self.lock().interactions.len()
    }

    pub fn clear_interactions(&self) {
        self.lock().interactions.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn node(&self, handle: ElementHandle) -> Result<usize> {
        let idx = handle.0 as usize;
        if idx < self.nodes.len() {
            Ok(idx)
        } else {
            Err(Error::ElementNotFound(handle.selector()))
        }
    }

    fn attr_in(&self, state: &State, idx: usize, name: &str) -> Option<String> {
        if let Some(value) = state.attrs.get(&(idx, name.to_string())) {
            return Some(value.clone());
        }
        self.nodes[idx].attr(name).map(str::to_string)
    }

    fn select(&self, selector: &str) -> Result<Vec<usize>> {
        if let Some(handle) = ElementHandle::from_selector(selector) {
            return Ok(self.node(handle).map(|idx| vec![idx]).unwrap_or_default());
        }
        let parsed = parse_selector(selector)?;
        let document = self.document();
        let matched: HashSet<NodeId> = document.select(&parsed).map(|el| el.id()).collect();
        Ok((0..self.nodes.len())
            .filter(|&idx| matched.contains(&self.nodes[idx].id))
            .collect())
    }

    fn document(&self) -> MutexGuard<'_, Html> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_ancestor(&self, ancestor: usize, mut idx: usize) -> bool {
        while let Some(parent) = self.nodes[idx].parent {
            if parent == ancestor {
                return true;
            }
            idx = parent;
        }
        false
    }

    fn hidden_self(&self, state: &State, idx: usize) -> bool {
        if state.hidden.contains(&idx) {
            return true;
        }
        if state.shown.contains(&idx) {
            return false;
        }
        let node = &self.nodes[idx];
        if matches!(
            node.tag.as_str(),
            "head" | "script" | "style" | "template" | "title" | "meta" | "noscript"
        ) {
            return true;
        }
        if node.attr("hidden").is_some() {
            return true;
        }
        if node.tag == "input"
            && node
                .attr("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
        {
            return true;
        }
        node.attr("style").is_some_and(|style| {
            let style: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            style.contains("display:none") || style.contains("visibility:hidden")
        })
    }

    fn visible_in(&self, state: &State, idx: usize) -> bool {
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            if self.hidden_self(state, i) {
                return false;
            }
            cursor = self.nodes[i].parent;
        }
        true
    }

    /// Text of the subtree regardless of visibility.
    fn raw_text(&self, idx: usize, out: &mut String) {
        for content in &self.nodes[idx].content {
            match content {
                Content::Text(text) => {
                    out.push_str(text);
                    out.push(' ');
                }
                Content::Child(child) => self.raw_text(*child, out),
            }
        }
    }

    /// Rendered text: hidden subtrees are skipped.
    fn rendered_text(&self, state: &State, idx: usize, out: &mut String) {
        if self.hidden_self(state, idx) {
            return;
        }
        for content in &self.nodes[idx].content {
            match content {
                Content::Text(text) => {
                    out.push_str(text);
                    out.push(' ');
                }
                Content::Child(child) => self.rendered_text(state, *child, out),
            }
        }
    }

    fn text_in(&self, state: &State, idx: usize) -> String {
        let mut out = String::new();
        self.rendered_text(state, idx, &mut out);
        collapse(&out)
    }

    fn option_nodes(&self, select: usize) -> Vec<usize> {
        (select + 1..self.nodes.len())
            .filter(|&i| self.nodes[i].tag == "option" && self.is_ancestor(select, i))
            .collect()
    }

    fn option_value(&self, idx: usize) -> String {
        match self.nodes[idx].attr("value") {
            Some(value) => value.to_string(),
            None => {
                let mut out = String::new();
                self.raw_text(idx, &mut out);
                collapse(&out)
            }
        }
    }

    fn selected_option(&self, state: &State, select: usize) -> Option<usize> {
        if let Some(&chosen) = state.selected.get(&select) {
            return Some(chosen);
        }
        let options = self.option_nodes(select);
        options
            .iter()
            .copied()
            .find(|&o| self.nodes[o].attr("selected").is_some())
            .or_else(|| options.first().copied())
    }

    fn value_in(&self, state: &State, idx: usize) -> String {
        if let Some(value) = state.values.get(&idx) {
            return value.clone();
        }
        let node = &self.nodes[idx];
        match node.tag.as_str() {
            "select" => self
                .selected_option(state, idx)
                .map(|o| self.option_value(o))
                .unwrap_or_default(),
            "textarea" => {
                let mut out = String::new();
                self.raw_text(idx, &mut out);
                out.trim().to_string()
            }
            "input" => {
                let kind = node.attr("type").unwrap_or("text").to_ascii_lowercase();
                match node.attr("value") {
                    Some(v) => v.to_string(),
                    None if kind == "checkbox" || kind == "radio" => "on".to_string(),
                    None => String::new(),
                }
            }
            _ => String::new(),
        }
    }

    fn checked_in(&self, state: &State, idx: usize) -> bool {
        if let Some(&checked) = state.checked.get(&idx) {
            return checked;
        }
        self.nodes[idx].attr("checked").is_some()
            || self.attr_in(state, idx, "aria-checked").as_deref() == Some("true")
    }

    fn disabled_in(&self, state: &State, idx: usize) -> bool {
        if self.attr_in(state, idx, "aria-disabled").as_deref() == Some("true") {
            return true;
        }
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            let node = &self.nodes[i];
            if node.attr("disabled").is_some()
                && matches!(
                    node.tag.as_str(),
                    "input" | "select" | "textarea" | "button" | "fieldset" | "option"
                )
            {
                return true;
            }
            cursor = node.parent;
        }
        false
    }

    fn by_id(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.attr("id") == Some(id))
    }

    fn record(&self, state: &mut State, kind: InteractionKind, idx: Option<usize>, detail: &str) {
        state.interactions.push(Interaction {
            kind,
            handle: idx.map(|i| ElementHandle(i as u64)),
            detail: detail.to_string(),
        });
    }

    fn set_shown(&self, state: &mut State, idx: usize, shown: bool) {
        if shown {
            state.hidden.remove(&idx);
            state.shown.insert(idx);
        } else {
            state.shown.remove(&idx);
            state.hidden.insert(idx);
        }
    }

    /// Element controlled by `idx` through `aria-controls`/`aria-owns`.
    fn controlled(&self, state: &State, idx: usize) -> Option<usize> {
        self.attr_in(state, idx, "aria-controls")
            .or_else(|| self.attr_in(state, idx, "aria-owns"))
            .and_then(|ids| ids.split_whitespace().find_map(|id| self.by_id(id)))
    }

    fn reveal_controlled(&self, state: &mut State, idx: usize) {
        if let Some(target) = self.controlled(state, idx) {
            self.set_shown(state, target, true);
            state
                .attrs
                .insert((idx, "aria-expanded".into()), "true".into());
        }
    }

    fn choose_option(&self, state: &mut State, option: usize) {
        let text = self.text_in(state, option);
        state
            .attrs
            .insert((option, "aria-selected".into()), "true".into());
        let listbox = self.closest_where(option, |n| n.attr("role") == Some("listbox"));
        let Some(listbox) = listbox else {
            return;
        };
        let listbox_id = self.nodes[listbox].attr("id").map(str::to_string);
        let owner = listbox_id.and_then(|id| {
            (0..self.nodes.len()).find(|&i| {
                ["aria-controls", "aria-owns"].iter().any(|attr| {
                    self.attr_in(state, i, attr)
                        .is_some_and(|v| v.split_whitespace().any(|part| part == id))
                })
            })
        });
        if let Some(owner) = owner {
            state.values.insert(owner, text);
            state
                .attrs
                .insert((owner, "aria-expanded".into()), "false".into());
        }
        self.set_shown(state, listbox, false);
    }

    fn closest_where(&self, idx: usize, pred: impl Fn(&Node) -> bool) -> Option<usize> {
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            if pred(&self.nodes[i]) {
                return Some(i);
            }
            cursor = self.nodes[i].parent;
        }
        None
    }

    fn activate(&self, state: &mut State, idx: usize, depth: u8) {
        if self.disabled_in(state, idx) {
            return;
        }
        let node = &self.nodes[idx];
        let input_type = node.attr("type").unwrap_or("").to_ascii_lowercase();
        match (node.tag.as_str(), input_type.as_str()) {
            ("input", "checkbox") => {
                let checked = self.checked_in(state, idx);
                state.checked.insert(idx, !checked);
                return;
            }
            ("input", "radio") => {
                if let Some(name) = node.attr("name") {
                    for other in 0..self.nodes.len() {
                        if self.nodes[other].tag == "input" && self.nodes[other].attr("name") == Some(name) {
                            state.checked.insert(other, false);
                        }
                    }
                }
                state.checked.insert(idx, true);
                return;
            }
            ("label", _) if depth == 0 => {
                let target = node
                    .attr("for")
                    .and_then(|id| self.by_id(id))
                    .or_else(|| {
                        (idx + 1..self.nodes.len()).find(|&i| {
                            self.nodes[i].tag == "input" && self.is_ancestor(idx, i)
                        })
                    });
                if let Some(target) = target {
                    self.activate(state, target, depth + 1);
                }
                return;
            }
            _ => {}
        }
        match self.attr_in(state, idx, "role").as_deref() {
            Some("radio") | Some("checkbox") => {
                let checked = self.attr_in(state, idx, "aria-checked").as_deref() == Some("true");
                if let Some(group) = self.closest_where(idx, |n| n.attr("role") == Some("radiogroup")) {
                    if !checked {
                        for other in group + 1..self.nodes.len() {
                            if self.is_ancestor(group, other)
                                && self.nodes[other].attr("role") == Some("radio")
                            {
                                state
                                    .attrs
                                    .insert((other, "aria-checked".into()), "false".into());
                            }
                        }
                    }
                }
                let next = if self.attr_in(state, idx, "role").as_deref() == Some("radio") {
                    true
                } else {
                    !checked
                };
                state
                    .attrs
                    .insert((idx, "aria-checked".into()), next.to_string());
                return;
            }
            _ => {}
        }
        if let Some(option) = self.closest_where(idx, |n| n.attr("role") == Some("option")) {
            self.choose_option(state, option);
            return;
        }
        if let Some(target) = self.controlled(state, idx) {
            let open = self.visible_in(state, target);
            self.set_shown(state, target, !open);
            state
                .attrs
                .insert((idx, "aria-expanded".into()), (!open).to_string());
        }
    }

    fn is_typeahead(&self, state: &State, idx: usize) -> bool {
        self.attr_in(state, idx, "role").as_deref() == Some("combobox")
            || self.attr_in(state, idx, "aria-autocomplete").is_some()
    }
}

impl Node {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn collect(el: ElementRef<'_>, parent: Option<usize>, nodes: &mut Vec<Node>) {
    let idx = nodes.len();
    nodes.push(Node {
        id: el.id(),
        tag: el.value().name().to_ascii_lowercase(),
        attrs: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect(),
        parent,
        content: Vec::new(),
    });
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let child_idx = nodes.len();
            nodes[idx].content.push(Content::Child(child_idx));
            collect(child_el, Some(idx), nodes);
        } else if let Some(text) = child.value().as_text() {
            nodes[idx].content.push(Content::Text(text.to_string()));
        }
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl DomInspector for HtmlDom {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        Ok(self
            .select(selector)?
            .into_iter()
            .map(|i| ElementHandle(i as u64))
            .collect())
    }

    async fn query_within(
        &self,
        scope: ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>> {
        let scope = self.node(scope)?;
        Ok(self
            .select(selector)?
            .into_iter()
            .filter(|&i| self.is_ancestor(scope, i))
            .map(|i| ElementHandle(i as u64))
            .collect())
    }

    async fn closest(
        &self,
        handle: ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>> {
        let idx = self.node(handle)?;
        let parsed = parse_selector(selector)?;
        let document = self.document();
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            let element = document.tree.get(self.nodes[i].id).and_then(ElementRef::wrap);
            if element.is_some_and(|el| parsed.matches(&el)) {
                return Ok(Some(ElementHandle(i as u64)));
            }
            cursor = self.nodes[i].parent;
        }
        Ok(None)
    }

    async fn computed_visible(&self, handle: ElementHandle) -> Result<bool> {
        let idx = self.node(handle)?;
        Ok(self.visible_in(&self.lock(), idx))
    }

    async fn text(&self, handle: ElementHandle) -> Result<String> {
        let idx = self.node(handle)?;
        let state = self.lock();
        if self.visible_in(&state, idx) {
            return Ok(self.text_in(&state, idx));
        }
        // Not rendered: like innerText, fall back to the raw text content.
        let mut out = String::new();
        self.raw_text(idx, &mut out);
        Ok(collapse(&out))
    }

    async fn attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<String>> {
        let idx = self.node(handle)?;
        Ok(self.attr_in(&self.lock(), idx, &name.to_ascii_lowercase()))
    }

    async fn tag_name(&self, handle: ElementHandle) -> Result<String> {
        let idx = self.node(handle)?;
        Ok(self.nodes[idx].tag.clone())
    }

    async fn value(&self, handle: ElementHandle) -> Result<String> {
        let idx = self.node(handle)?;
        Ok(self.value_in(&self.lock(), idx))
    }

    async fn is_checked(&self, handle: ElementHandle) -> Result<bool> {
        let idx = self.node(handle)?;
        Ok(self.checked_in(&self.lock(), idx))
    }

    async fn is_disabled(&self, handle: ElementHandle) -> Result<bool> {
        let idx = self.node(handle)?;
        Ok(self.disabled_in(&self.lock(), idx))
    }

    async fn native_options(&self, handle: ElementHandle) -> Result<Vec<NativeOption>> {
        let idx = self.node(handle)?;
        let state = self.lock();
        let selected = self.selected_option(&state, idx);
        Ok(self
            .option_nodes(idx)
            .into_iter()
            .map(|o| {
                let mut text = String::new();
                self.raw_text(o, &mut text);
                NativeOption {
                    value: self.option_value(o),
                    text: collapse(&text),
                    selected: Some(o) == selected,
                }
            })
            .collect())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.title.clone())
    }

    async fn body_text(&self) -> Result<String> {
        let state = self.lock();
        Ok(self
            .nodes
            .iter()
            .position(|n| n.tag == "body")
            .map(|body| self.text_in(&state, body))
            .unwrap_or_default())
    }
}

#[async_trait]
impl PageActions for HtmlDom {
    async fn click(&self, handle: ElementHandle) -> Result<()> {
        let idx = self.node(handle)?;
        let mut state = self.lock();
        self.record(&mut state, InteractionKind::Click, Some(idx), "");
        self.activate(&mut state, idx, 0);
        Ok(())
    }

    async fn focus(&self, handle: ElementHandle) -> Result<()> {
        let idx = self.node(handle)?;
        let mut state = self.lock();
        self.record(&mut state, InteractionKind::Focus, Some(idx), "");
        Ok(())
    }

    async fn set_value(&self, handle: ElementHandle, value: &str) -> Result<()> {
        let idx = self.node(handle)?;
        let mut state = self.lock();
        self.record(&mut state, InteractionKind::SetValue, Some(idx), value);
        let readonly = self.nodes[idx].attr("readonly").is_some();
        if readonly || self.disabled_in(&state, idx) {
            return Ok(());
        }
        state.values.insert(idx, value.to_string());
        if !value.is_empty() && self.is_typeahead(&state, idx) {
            self.reveal_controlled(&mut state, idx);
        }
        Ok(())
    }

    async fn type_text(&self, handle: ElementHandle, text: &str) -> Result<()> {
        let idx = self.node(handle)?;
        let mut state = self.lock();
        self.record(&mut state, InteractionKind::TypeText, Some(idx), text);
        if self.nodes[idx].attr("readonly").is_some() || self.disabled_in(&state, idx) {
            return Ok(());
        }
        let mut current = self.value_in(&state, idx);
        current.push_str(text);
        state.values.insert(idx, current);
        if self.is_typeahead(&state, idx) {
            self.reveal_controlled(&mut state, idx);
        }
        Ok(())
    }

    async fn press_key(&self, handle: ElementHandle, key: &str) -> Result<()> {
        let idx = self.node(handle)?;
        let mut state = self.lock();
        self.record(&mut state, InteractionKind::PressKey, Some(idx), key);
        match key {
            "Escape" => {
                let expanded: Vec<usize> = state
                    .attrs
                    .iter()
                    .filter(|((_, name), value)| name == "aria-expanded" && *value == "true")
                    .map(|((i, _), _)| *i)
                    .collect();
                for owner in expanded {
                    if let Some(target) = self.controlled(&state, owner) {
                        self.set_shown(&mut state, target, false);
                    }
                    state
                        .attrs
                        .insert((owner, "aria-expanded".into()), "false".into());
                }
            }
            "Enter" => {
                let first = self.controlled(&state, idx).and_then(|listbox| {
                    (listbox + 1..self.nodes.len()).find(|&i| {
                        self.is_ancestor(listbox, i)
                            && self.nodes[i].attr("role") == Some("option")
                            && self.visible_in(&state, i)
                    })
                });
                if let Some(option) = first {
                    self.choose_option(&mut state, option);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn select_native(&self, handle: ElementHandle, by: &SelectBy) -> Result<bool> {
        let idx = self.node(handle)?;
        let mut state = self.lock();
        let detail = match by {
            SelectBy::Label(label) => format!("label:{label}"),
            SelectBy::Value(value) => format!("value:{value}"),
        };
        self.record(&mut state, InteractionKind::Select, Some(idx), &detail);
        if self.disabled_in(&state, idx) {
            return Ok(false);
        }
        let found = self.option_nodes(idx).into_iter().find(|&o| match by {
            SelectBy::Label(label) => {
                let mut text = String::new();
                self.raw_text(o, &mut text);
                collapse(&text).eq_ignore_ascii_case(label.trim())
            }
            SelectBy::Value(value) => self.option_value(o) == *value,
        });
        match found {
            Some(option) => {
                state.selected.insert(idx, option);
                state.values.remove(&idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_files(&self, handle: ElementHandle, files: &[PathBuf]) -> Result<()> {
        let idx = self.node(handle)?;
        let mut state = self.lock();
        let names: Vec<String> = files
            .iter()
            .filter_map(|f| f.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        self.record(&mut state, InteractionKind::SetFiles, Some(idx), &names.join(","));
        if let Some(first) = names.first() {
            state.values.insert(idx, format!("C:\\fakepath\\{first}"));
        }
        Ok(())
    }

    async fn scroll_by(&self, pixels: i32) -> Result<()> {
        let mut state = self.lock();
        self.record(&mut state, InteractionKind::Scroll, None, &pixels.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"
        <html><head><title>Apply</title></head><body>
          <label for="email">Email</label><input id="email" name="email" value="a@b.c">
          <input type="checkbox" id="terms">
          <div id="hidden-part" hidden><input id="secret"></div>
          <select id="degree"><option value="">Select...</option><option value="ms">Master's</option></select>
          <div role="combobox" id="loc" aria-controls="loc-list" aria-expanded="false">Location</div>
          <ul role="listbox" id="loc-list" hidden><li role="option">Berlin</li><li role="option">Paris</li></ul>
        </body></html>"#;

    fn dom() -> HtmlDom {
        HtmlDom::parse("https://example.test/apply", FORM)
    }

    #[tokio::test]
    async fn reads_title_values_and_visibility() {
        let dom = dom();
        assert_eq!(dom.title().await.unwrap(), "Apply");
        let email = dom.resolve("#email").await.unwrap().unwrap();
        assert_eq!(dom.value(email).await.unwrap(), "a@b.c");
        let secret = dom.resolve("#secret").await.unwrap().unwrap();
        assert!(!dom.computed_visible(secret).await.unwrap());
        let degree = dom.resolve("#degree").await.unwrap().unwrap();
        assert_eq!(dom.value(degree).await.unwrap(), "");
    }

    #[tokio::test]
    async fn clicks_follow_aria_wiring() {
        let dom = dom();
        let combo = dom.resolve("#loc").await.unwrap().unwrap();
        let list = dom.resolve("#loc-list").await.unwrap().unwrap();
        dom.click(combo).await.unwrap();
        assert!(dom.computed_visible(list).await.unwrap());
        let options = dom.query_within(list, "[role=\"option\"]").await.unwrap();
        dom.click(options[1]).await.unwrap();
        assert_eq!(dom.value(combo).await.unwrap(), "Paris");
        assert!(!dom.computed_visible(list).await.unwrap());
        assert_eq!(dom.interaction_count(), 2);
    }

    #[tokio::test]
    async fn native_select_by_label() {
        let dom = dom();
        let degree = dom.resolve("#degree").await.unwrap().unwrap();
        let by = SelectBy::Label("master's".into());
        assert!(dom.select_native(degree, &by).await.unwrap());
        assert_eq!(dom.value(degree).await.unwrap(), "ms");
        let missing = SelectBy::Value("phd".into());
        assert!(!dom.select_native(degree, &missing).await.unwrap());
    }

    const NESTED: &str = r#"
        <html><body>
          <form id="apply"><div class="field required">
            <input name="job_application[email]" type="email">
          </div></form>
          <select name="Degree"></select>
        </body></html>"#;

    #[tokio::test]
    async fn css_selectors_match_attributes_and_combinators() {
        let dom = HtmlDom::parse("https://example.test/apply", NESTED);
        let email = dom.resolve("input[name='job_application[email]']").await.unwrap();
        assert!(email.is_some());
        for selector in [
            "input[name*=\"email\"]",
            "[name^=job_application]",
            "#apply input",
            "form > div > input",
            "div.field.required > input",
            "textarea, input",
        ] {
            assert_eq!(dom.resolve(selector).await.unwrap(), email, "{selector}");
        }
        assert!(dom.resolve("form > input").await.unwrap().is_none());
        assert!(dom.resolve("select[name=\"degree\" i]").await.unwrap().is_some());
        assert!(dom.resolve("select[name=\"degree\"]").await.unwrap().is_none());

        let field = dom.resolve("div.field").await.unwrap().unwrap();
        let input = email.unwrap();
        assert_eq!(dom.closest(input, "div.required").await.unwrap(), Some(field));
        assert_eq!(dom.closest(input, "input").await.unwrap(), Some(input));
        assert!(dom.closest(input, "fieldset").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_selectors_are_errors() {
        let dom = dom();
        for selector in ["", "[name=\"x\"", "input >"] {
            let err = dom.query_all(selector).await.unwrap_err();
            assert!(matches!(err, Error::InvalidSelector { .. }), "{selector}");
        }
    }
}
