use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// The candidate whose answers fill the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(default)]
    pub personal: PersonalInfo,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<Compliance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_responses: Option<AiResponses>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub middle_name: Option<String>,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default)]
    pub school: String,
    pub degree: Option<String>,
    pub field: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub graduation_year: Option<String>,
    pub gpa: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub website: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Voluntary self-identification and eligibility answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compliance {
    pub work_authorized: Option<bool>,
    pub requires_sponsorship: Option<bool>,
    pub gender: Option<String>,
    pub race: Option<String>,
    pub hispanic_latino: Option<bool>,
    pub veteran_status: Option<String>,
    pub disability_status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiResponses {
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
}

/// Company and role of the posting being applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobContext {
    pub company: String,
    pub role: String,
}

impl JobContext {
    pub fn new(company: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            role: role.into(),
        }
    }
}

/// A resolved profile value. Booleans stay booleans until they meet a
/// [`ValueMap`], because forms never expose them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileValue {
    Text(String),
    Bool(bool),
}

impl ProfileValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Text(n.to_string())),
            Value::Array(items) => {
                let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                Some(Self::Text(parts.join(", ")))
            }
            Value::Null | Value::Object(_) => None,
        }
    }

    /// Text to put into a form.
    pub fn to_target(&self, map: &ValueMap) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Bool(b) => map.map_bool(*b),
        }
    }
}

/// Translation of boolean profile values into form answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMap(BTreeMap<String, String>);

impl Default for ValueMap {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert("true".to_string(), "Yes".to_string());
        map.insert("false".to_string(), "No".to_string());
        Self(map)
    }
}

impl ValueMap {
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn map_bool(&self, value: bool) -> String {
        let key = value.to_string();
        match self.0.get(&key) {
            Some(mapped) => mapped.clone(),
            None if value => "Yes".to_string(),
            None => "No".to_string(),
        }
    }
}

impl CandidateProfile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Look up a dotted path such as `education[0].school`.
    ///
    /// `None` means the path does not exist and the field should be skipped;
    /// an empty string is a legitimate value.
    pub fn resolve_value(&self, path: &str) -> Option<ProfileValue> {
        let root = serde_json::to_value(self).ok()?;
        lookup_path(&root, path).and_then(ProfileValue::from_json)
    }

    /// Fill `{placeholder}`s of a named template from `ai_responses`.
    pub fn render_template(&self, name: &str, job: &JobContext) -> Option<String> {
        let template = self.ai_responses.as_ref()?.templates.get(name)?;
        Some(self.substitute(template, job))
    }

    pub fn template_names(&self) -> Vec<&str> {
        self.ai_responses
            .as_ref()
            .map(|r| r.templates.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn substitute(&self, template: &str, job: &JobContext) -> String {
        let first_education = self.education.first();
        let replacements = [
            ("{company}", job.company.as_str()),
            ("{role}", job.role.as_str()),
            ("{first_name}", self.personal.first_name.as_str()),
            ("{last_name}", self.personal.last_name.as_str()),
            ("{school}", first_education.map_or("", |e| e.school.as_str())),
            (
                "{degree}",
                first_education.and_then(|e| e.degree.as_deref()).unwrap_or(""),
            ),
            (
                "{field}",
                first_education.and_then(|e| e.field.as_deref()).unwrap_or(""),
            ),
        ];
        let mut out = template.to_string();
        for (placeholder, value) in replacements {
            out = out.replace(placeholder, value);
        }
        out.replace("{skills}", &self.skills.join(", "))
    }

    /// Short plain-text summary for oracle prompts.
    pub fn summary(&self) -> String {
        let p = &self.personal;
        let mut lines = vec![format!("Name: {} {}", p.first_name, p.last_name)];
        if !p.email.is_empty() {
            lines.push(format!("Email: {}", p.email));
        }
        if let Some(phone) = &p.phone {
            lines.push(format!("Phone: {phone}"));
        }
        if let Some(location) = p.location.as_ref().or(p.city.as_ref()) {
            lines.push(format!("Location: {location}"));
        }
        for e in &self.education {
            let mut line = format!("Education: {}", e.school);
            if let Some(degree) = &e.degree {
                line.push_str(&format!(", {degree}"));
            }
            if let Some(field) = &e.field {
                line.push_str(&format!(" in {field}"));
            }
            lines.push(line);
        }
        if !self.skills.is_empty() {
            lines.push(format!("Skills: {}", self.skills.join(", ")));
        }
        if let Some(linkedin) = &self.links.linkedin {
            lines.push(format!("LinkedIn: {linkedin}"));
        }
        lines.join("\n")
    }
}

fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        let (key, index) = parse_segment(segment)?;
        if !key.is_empty() {
            current = current.as_object()?.get(key)?;
        }
        if let Some(i) = index {
            current = current.as_array()?.get(i)?;
        }
    }
    Some(current)
}

/// `name` or `name[3]`.
fn parse_segment(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.find('[') {
        Some(open) => {
            let inner = segment[open + 1..].strip_suffix(']')?;
            Some((&segment[..open], Some(inner.trim().parse().ok()?)))
        }
        None if segment.is_empty() => None,
        None => Some((segment, None)),
    }
}
