//! Oracle decisions and the chain that parses them out of free text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    FillField,
    SelectOption,
    ClickButton,
    ClickElement,
    Scroll,
    Wait,
    Done,
    NeedHelp,
}

impl ActionType {
    fn parse(raw: &str) -> Option<Self> {
        let kind = match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "fill_field" | "fill" | "type" | "type_text" => Self::FillField,
            "select_option" | "select" => Self::SelectOption,
            "click_button" | "click" => Self::ClickButton,
            "click_element" => Self::ClickElement,
            "scroll" => Self::Scroll,
            "wait" => Self::Wait,
            "done" | "finish" | "complete" => Self::Done,
            "need_help" | "needs_help" | "help" => Self::NeedHelp,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FillField => "fill_field",
            Self::SelectOption => "select_option",
            Self::ClickButton => "click_button",
            Self::ClickElement => "click_element",
            Self::Scroll => "scroll",
            Self::Wait => "wait",
            Self::Done => "done",
            Self::NeedHelp => "need_help",
        }
    }
}

/// One decision of the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Free text kept for audit only.
    #[serde(default)]
    pub reason: String,
}

impl AgentAction {
    pub fn new(kind: ActionType) -> Self {
        Self {
            kind,
            target: None,
            value: None,
            reason: String::new(),
        }
    }

    pub fn need_help(reason: impl Into<String>) -> Self {
        Self::new(ActionType::NeedHelp).with_reason(reason)
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// `(type, target)` key used for repetition detection.
    pub fn key(&self) -> String {
        format!(
            "{}|{}",
            self.kind.as_str(),
            self.target.as_deref().unwrap_or("").trim().to_lowercase()
        )
    }

    fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let kind = ["type", "action", "action_type"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .and_then(ActionType::parse)?;
        let text = |keys: &[&str]| {
            keys.iter().find_map(|k| match obj.get(*k)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
        };
        Some(Self {
            kind,
            target: text(&["target", "selector", "button", "field"]),
            value: text(&["value", "text", "option"]),
            reason: text(&["reason", "reasoning", "summary"]).unwrap_or_default(),
        })
    }
}

/// Which step of the chain produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    Structured,
    Fenced,
    Embedded,
    Keyword,
    Fallback,
}

type Step = fn(&str) -> Option<AgentAction>;

const CHAIN: [(ParseSource, Step); 4] = [
    (ParseSource::Structured, parse_structured),
    (ParseSource::Fenced, parse_fenced),
    (ParseSource::Embedded, parse_embedded),
    (ParseSource::Keyword, parse_keywords),
];

/// Parse exactly one action. Never fails: the last resort is `need_help`.
pub fn parse_action(response: &str) -> (AgentAction, ParseSource) {
    for (source, step) in CHAIN {
        if let Some(action) = step(response) {
            return (action, source);
        }
    }
    let excerpt: String = response.trim().chars().take(200).collect();
    (
        AgentAction::need_help(format!("unparseable oracle response: {excerpt}")),
        ParseSource::Fallback,
    )
}

/// The whole response is one JSON object.
pub fn parse_structured(response: &str) -> Option<AgentAction> {
    let value: Value = serde_json::from_str(response.trim()).ok()?;
    AgentAction::from_json(&value)
}

/// JSON inside a ``` fence, with or without a language tag.
pub fn parse_fenced(response: &str) -> Option<AgentAction> {
    let start = response.find("```")?;
    let rest = &response[start + 3..];
    let body_start = rest.find('\n').map_or(0, |i| i + 1);
    let language = rest[..body_start].trim();
    let rest = if language.is_empty() || language.chars().all(|c| c.is_ascii_alphabetic()) {
        &rest[body_start..]
    } else {
        rest
    };
    let end = rest.find("```")?;
    parse_structured(&rest[..end])
}

/// The first balanced `{...}` in surrounding prose that parses.
pub fn parse_embedded(response: &str) -> Option<AgentAction> {
    let bytes = response.as_bytes();
    let mut from = 0;
    while let Some(offset) = response[from..].find('{') {
        let start = from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            if let Some(action) = parse_structured(&response[start..=end]) {
                return Some(action);
            }
        }
        from = start + 1;
    }
    None
}

fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

const BUTTON_WORDS: &[(&str, &str)] = &[
    ("add", "Add"),
    ("next", "Next"),
    ("continue", "Continue"),
    ("submit", "Submit"),
    ("save", "Save"),
];

const HELP_PHRASES: &[&str] = &["need help", "need_help", "captcha", "cannot proceed", "can't proceed", "human"];

const DONE_PHRASES: &[&str] = &["application submitted", "application has been submitted", "application is complete"];

/// Natural-language fallback: "click the Add button" becomes a click.
pub fn parse_keywords(response: &str) -> Option<AgentAction> {
    let lowered = response.to_lowercase();
    let reason: String = response.trim().chars().take(200).collect();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .collect();
    let has = |w: &str| words.contains(&w);

    if HELP_PHRASES.iter().any(|p| lowered.contains(p)) {
        return Some(AgentAction::need_help(reason));
    }
    if words.first() == Some(&"done") || DONE_PHRASES.iter().any(|p| lowered.contains(p)) {
        return Some(AgentAction::new(ActionType::Done).with_reason(reason));
    }
    if has("click") || has("press") {
        if let Some((_, label)) = BUTTON_WORDS.iter().find(|(w, _)| has(*w)) {
            return Some(
                AgentAction::new(ActionType::ClickButton)
                    .with_target(*label)
                    .with_reason(reason),
            );
        }
    }
    if has("scroll") {
        let direction = if has("up") { "up" } else { "down" };
        return Some(
            AgentAction::new(ActionType::Scroll)
                .with_value(direction)
                .with_reason(reason),
        );
    }
    if has("wait") {
        return Some(AgentAction::new(ActionType::Wait).with_reason(reason));
    }
    None
}
