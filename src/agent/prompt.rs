use serde::Serialize;
use serde_json::{json, Value};

use super::action::AgentAction;
use crate::field::{Field, FormSnapshot};
use crate::resolve::JobContext;

/// Options listed per field in a prompt.
const PROMPT_OPTIONS: usize = 10;

const INSTRUCTIONS: &str = r#"You are completing a job application in a web browser, one action at a time.
Reply with exactly one JSON object:
{"type": "<action>", "target": "<selector or visible text>", "value": "<text>", "reason": "<why>"}
Actions:
- fill_field: type `value` into the field `target` (a selector from the field list)
- select_option: choose the option `value` in the dropdown or radio group `target`
- click_button: click one of the listed buttons; `target` is its text
- click_element: click another element by selector or visible text
- scroll: `value` is "up" or "down"
- wait: let the page settle
- done: the application has been submitted
- need_help: a human must act (login, CAPTCHA, email verification, missing information)
Fill empty required fields before clicking Next or Submit. Only click buttons from the list.
Fields marked "visible": false are hidden; click a button such as "Add" to reveal them."#;

/// One executed action and how it went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub step: usize,
    pub action: AgentAction,
    /// `"ok"` or the failure reason.
    pub result: String,
}

/// Compact JSON view of a snapshot: empty values and long option lists
/// are trimmed.
pub fn compact_snapshot(snapshot: &FormSnapshot) -> Value {
    let fields: Vec<Value> = snapshot.fields.iter().map(compact_field).collect();
    let buttons: Vec<Value> = snapshot
        .buttons
        .iter()
        .map(|b| json!({"text": b.text, "kind": b.kind}))
        .collect();
    let mut view = json!({
        "url": snapshot.url,
        "title": snapshot.title,
        "fields": fields,
        "buttons": buttons,
    });
    if !snapshot.errors.is_empty() {
        view["errors"] = json!(snapshot.errors);
    }
    if let Some(section) = &snapshot.current_section {
        view["section"] = json!(section);
    }
    view
}

fn compact_field(field: &Field) -> Value {
    let mut view = json!({
        "selector": field.selector,
        "label": field.label,
        "kind": field.kind,
    });
    if !field.current_value.is_empty() {
        view["value"] = json!(field.current_value);
    }
    if field.required {
        view["required"] = json!(true);
    }
    if !field.is_visible {
        view["visible"] = json!(false);
    }
    if field.has_resolved_options() {
        let options = field.options();
        let mut texts: Vec<&str> = options
            .iter()
            .take(PROMPT_OPTIONS)
            .map(|o| o.text.as_str())
            .collect();
        let more = options.len().saturating_sub(PROMPT_OPTIONS);
        let more_note = format!("... {more} more");
        if more > 0 {
            texts.push(&more_note);
        }
        view["options"] = json!(texts);
    }
    view
}

/// The full decision prompt.
pub fn build_prompt(
    snapshot: &FormSnapshot,
    profile_summary: &str,
    job: &JobContext,
    history: &[HistoryEntry],
) -> String {
    let mut prompt = String::from(INSTRUCTIONS);
    if !job.company.is_empty() || !job.role.is_empty() {
        prompt.push_str(&format!("\n\nApplying for: {} at {}", job.role, job.company));
    }
    prompt.push_str("\n\nCandidate:\n");
    prompt.push_str(profile_summary);
    prompt.push_str("\n\nPage:\n");
    prompt.push_str(&compact_snapshot(snapshot).to_string());
    if !history.is_empty() {
        prompt.push_str("\n\nRecent actions:");
        for entry in history {
            prompt.push_str(&format!(
                "\n{}. {} {} -> {}",
                entry.step,
                entry.action.kind.as_str(),
                entry.action.target.as_deref().unwrap_or(""),
                entry.result
            ));
        }
    }
    prompt.push_str("\n\nNext action (JSON only):");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldKind, FieldOption};

    #[test]
    fn long_option_lists_are_cut() {
        let mut field = Field::new("#country", FieldKind::Select, "Country");
        field.options = Some(
            (0..25)
                .map(|i| FieldOption::new(i.to_string(), format!("Country {i}")))
                .collect(),
        );
        let view = compact_field(&field);
        let options = view["options"].as_array().unwrap();
        assert_eq!(options.len(), PROMPT_OPTIONS + 1);
        assert_eq!(options[PROMPT_OPTIONS], "... 15 more");
        assert!(view.get("value").is_none());
    }
}
