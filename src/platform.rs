//! Per-ATS selector mappings.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the fallback profile used when no URL pattern matches.
pub const CUSTOM: &str = "custom";

/// Static configuration for one application-tracking platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub name: String,
    /// Substring of the job URL that identifies the platform. Empty for
    /// the fallback.
    #[serde(default)]
    pub url_pattern: String,
    #[serde(default)]
    pub resume_selectors: Vec<String>,
    /// Concept (`first_name`, `degree`, `gender`, ...) to selector candidates.
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl PlatformProfile {
    /// Case-insensitive substring match against the URL.
    pub fn matches(&self, url: &str) -> bool {
        !self.url_pattern.is_empty()
            && url.to_lowercase().contains(&self.url_pattern.to_lowercase())
    }

    /// Selector candidates for a concept, empty when unmapped.
    pub fn selectors(&self, concept: &str) -> &[String] {
        self.fields.get(concept).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Read-only table of platform profiles, looked up once per job URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformTable {
    profiles: Vec<PlatformProfile>,
    fallback: PlatformProfile,
}

impl Default for PlatformTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PlatformTable {
    /// The platforms known out of the box.
    pub fn builtin() -> Self {
        let mut profiles: Vec<PlatformProfile> = BUILTIN.iter().map(profile_from_entry).collect();
        let fallback = match profiles.iter().position(|p| p.name == CUSTOM) {
            Some(i) => profiles.remove(i),
            None => PlatformProfile {
                name: CUSTOM.to_string(),
                url_pattern: String::new(),
                resume_selectors: vec!["input[type=\"file\"]".to_string()],
                fields: BTreeMap::new(),
            },
        };
        Self { profiles, fallback }
    }

    /// Parse a JSON array of profiles. A table without a `custom` entry
    /// keeps the built-in fallback.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut profiles: Vec<PlatformProfile> = serde_json::from_str(json)?;
        if let Some(unnamed) = profiles.iter().find(|p| p.name.trim().is_empty()) {
            return Err(Error::Config(format!(
                "platform profile without a name (pattern `{}`)",
                unnamed.url_pattern
            )));
        }
        let fallback = match profiles.iter().position(|p| p.name == CUSTOM) {
            Some(i) => profiles.remove(i),
            None => Self::builtin().fallback,
        };
        Ok(Self { profiles, fallback })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Add or replace profiles by name. New entries are matched first.
    pub fn extend(&mut self, other: PlatformTable) {
        for profile in other.profiles.into_iter().rev() {
            self.profiles.retain(|p| p.name != profile.name);
            self.profiles.insert(0, profile);
        }
    }

    pub fn get(&self, name: &str) -> Option<&PlatformProfile> {
        if name == CUSTOM {
            return Some(&self.fallback);
        }
        self.profiles.iter().find(|p| p.name == name)
    }

    /// First profile whose pattern occurs in `url`, else `custom`.
    pub fn lookup(&self, url: &str) -> &PlatformProfile {
        self.profiles
            .iter()
            .find(|p| p.matches(url))
            .unwrap_or(&self.fallback)
    }

    /// Named platforms, excluding the fallback.
    pub fn profiles(&self) -> &[PlatformProfile] {
        &self.profiles
    }

    pub fn fallback(&self) -> &PlatformProfile {
        &self.fallback
    }
}

fn profile_from_entry((name, pattern, resume, fields): &Entry) -> PlatformProfile {
    PlatformProfile {
        name: name.to_string(),
        url_pattern: pattern.to_string(),
        resume_selectors: resume.iter().map(|s| s.to_string()).collect(),
        fields: fields
            .iter()
            .map(|(concept, selectors)| {
                (
                    concept.to_string(),
                    selectors.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect(),
    }
}

type Entry = (
    &'static str,
    &'static str,
    &'static [&'static str],
    &'static [(&'static str, &'static [&'static str])],
);

const BUILTIN: &[Entry] = &[
    (
        "greenhouse",
        "greenhouse.io",
        &["input#resume", "input[type=\"file\"][name*=\"resume\"]", "#resume_fieldset input[type=\"file\"]"],
        &[
            ("first_name", &["#first_name"]),
            ("last_name", &["#last_name"]),
            ("email", &["#email"]),
            ("phone", &["#phone"]),
            ("location", &["#job_application_location", "#candidate-location"]),
            ("linkedin", &["input[name*=\"linkedin\" i]", "input[id*=\"linkedin\" i]"]),
            ("school", &["#education_school_name_0", "[id*=\"school--0\"]"]),
            ("degree", &["#education_degree_0", "[id*=\"degree--0\"]"]),
            ("discipline", &["#education_discipline_0", "[id*=\"discipline--0\"]"]),
            ("gender", &["#job_application_gender", "#gender"]),
            ("race", &["#job_application_race", "#race"]),
            ("hispanic_latino", &["#job_application_hispanic_ethnicity", "#hispanic_ethnicity"]),
            ("veteran_status", &["#job_application_veteran_status", "#veteran_status"]),
            ("disability_status", &["#job_application_disability_status", "#disability_status"]),
        ],
    ),
    (
        "lever",
        "lever.co",
        &["input[name=\"resume\"]", "#resume-upload-input"],
        &[
            ("full_name", &["input[name=\"name\"]"]),
            ("email", &["input[name=\"email\"]"]),
            ("phone", &["input[name=\"phone\"]"]),
            ("location", &["input[name=\"location\"]"]),
            ("linkedin", &["input[name=\"urls[LinkedIn]\"]"]),
            ("github", &["input[name=\"urls[GitHub]\"]"]),
            ("portfolio", &["input[name=\"urls[Portfolio]\"]", "input[name=\"urls[Other]\"]"]),
            ("gender", &["select[name=\"eeo[gender]\"]"]),
            ("race", &["select[name=\"eeo[race]\"]"]),
            ("veteran_status", &["select[name=\"eeo[veteran]\"]"]),
            ("disability_status", &["select[name=\"eeo[disability]\"]"]),
        ],
    ),
    (
        "workday",
        "myworkdayjobs.com",
        &["[data-automation-id=\"file-upload-input-ref\"]", "input[type=\"file\"]"],
        &[
            ("first_name", &["[data-automation-id=\"legalNameSection_firstName\"]"]),
            ("last_name", &["[data-automation-id=\"legalNameSection_lastName\"]"]),
            ("email", &["[data-automation-id=\"email\"]"]),
            ("phone", &["[data-automation-id=\"phone-number\"]"]),
            ("location", &["[data-automation-id=\"addressSection_city\"]"]),
            ("school", &["[data-automation-id=\"school\"]"]),
            ("degree", &["[data-automation-id=\"degree\"]"]),
            ("discipline", &["[data-automation-id=\"fieldOfStudy\"]"]),
            ("gender", &["[data-automation-id=\"gender\"]"]),
            ("race", &["[data-automation-id=\"ethnicityDropdown\"]"]),
            ("veteran_status", &["[data-automation-id=\"veteranStatus\"]"]),
            ("disability_status", &["[data-automation-id=\"disabilityStatus\"]"]),
        ],
    ),
    (
        "ashby",
        "ashbyhq.com",
        &["#_systemfield_resume", "input[type=\"file\"]"],
        &[
            ("full_name", &["#_systemfield_name", "input[name=\"_systemfield_name\"]"]),
            ("email", &["#_systemfield_email", "input[name=\"_systemfield_email\"]"]),
            ("phone", &["input[name*=\"phone\" i]"]),
            ("linkedin", &["input[name*=\"linkedin\" i]"]),
        ],
    ),
    (
        "smartrecruiters",
        "smartrecruiters.com",
        &["input[type=\"file\"][id*=\"resume\" i]", "input[type=\"file\"]"],
        &[
            ("first_name", &["#firstName", "input[name=\"firstName\"]"]),
            ("last_name", &["#lastName", "input[name=\"lastName\"]"]),
            ("email", &["#email", "input[name=\"email\"]"]),
            ("phone", &["#phoneNumber", "input[name=\"phoneNumber\"]"]),
            ("location", &["input[name=\"location\"]"]),
            ("linkedin", &["input[name*=\"linkedin\" i]"]),
        ],
    ),
    (
        "icims",
        "icims.com",
        &["input[type=\"file\"][name*=\"resume\" i]", "input[type=\"file\"]"],
        &[
            ("first_name", &["input[id$=\"FirstName\"]", "input[name*=\"FirstName\"]"]),
            ("last_name", &["input[id$=\"LastName\"]", "input[name*=\"LastName\"]"]),
            ("email", &["input[id$=\"Email\"]", "input[type=\"email\"]"]),
            ("phone", &["input[id$=\"Phone\"]", "input[type=\"tel\"]"]),
        ],
    ),
    (
        CUSTOM,
        "",
        &[
            "input[type=\"file\"][name*=\"resume\" i]",
            "input[type=\"file\"][id*=\"resume\" i]",
            "input[type=\"file\"][name*=\"cv\" i]",
            "input[type=\"file\"]",
        ],
        &[
            ("first_name", &["input[name*=\"first\" i][name*=\"name\" i]", "input[autocomplete=\"given-name\"]"]),
            ("last_name", &["input[name*=\"last\" i][name*=\"name\" i]", "input[autocomplete=\"family-name\"]"]),
            ("email", &["input[type=\"email\"]", "input[autocomplete=\"email\"]"]),
            ("phone", &["input[type=\"tel\"]", "input[autocomplete=\"tel\"]"]),
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_url_substring_with_fallback() {
        let table = PlatformTable::builtin();
        assert_eq!(table.lookup("https://boards.greenhouse.io/acme/jobs/1").name, "greenhouse");
        assert_eq!(table.lookup("https://jobs.lever.co/acme/abc/apply").name, "lever");
        assert_eq!(table.lookup("https://careers.acme.com/apply").name, CUSTOM);
    }

    #[test]
    fn json_tables_gain_the_fallback() {
        let table = PlatformTable::from_json(
            r##"[{"name": "teamtailor", "url_pattern": "teamtailor.com",
                 "fields": {"email": ["#candidate_email"]}}]"##,
        )
        .unwrap();
        let profile = table.lookup("https://acme.teamtailor.com/jobs/9");
        assert_eq!(profile.selectors("email"), ["#candidate_email".to_string()]);
        assert!(profile.selectors("phone").is_empty());
        assert_eq!(table.lookup("https://example.org").name, CUSTOM);
    }

    #[test]
    fn url_patterns_match_regardless_of_case() {
        let table = PlatformTable::from_json(
            r#"[{"name": "smartrecruiters", "url_pattern": "SmartRecruiters.com"}]"#,
        )
        .unwrap();
        assert_eq!(
            table.lookup("https://jobs.smartrecruiters.com/Acme/123").name,
            "smartrecruiters"
        );
        assert_eq!(
            table.lookup("https://JOBS.SMARTRECRUITERS.COM/acme").name,
            "smartrecruiters"
        );
    }

    #[test]
    fn extend_overrides_by_name() {
        let mut table = PlatformTable::builtin();
        let override_table = PlatformTable::from_json(
            r##"[{"name": "lever", "url_pattern": "lever.co", "resume_selectors": ["#cv"]}]"##,
        )
        .unwrap();
        table.extend(override_table);
        assert_eq!(table.lookup("https://jobs.lever.co/x").resume_selectors, ["#cv".to_string()]);
        assert_eq!(table.fallback().name, CUSTOM);
        assert!(table.profiles().iter().all(|p| p.name != CUSTOM));
    }
}
