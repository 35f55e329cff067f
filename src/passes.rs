//! Rule-based fill passes for non-agentic mode.
//!
//! Passes run in a fixed order over one document: resume upload, basic
//! fields, education, compliance, then the AI pass for whatever is left.
//! Each pass re-extracts visible fields and skips anything that already
//! has a value or is filled in the shared [`FieldTracker`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::FillConfig;
use crate::dom::{ElementHandle, PageActions};
use crate::error::Result;
use crate::extract::FieldExtractor;
use crate::field::{Field, FieldKind};
use crate::fill::{FillExecutor, FillOutcome};
use crate::oracle::Oracle;
use crate::platform::PlatformProfile;
use crate::resolve::{normalize, CandidateProfile, JobContext, ValueMap};
use crate::tracker::{FieldTracker, FillModule, FillSummary};

/// Where a concept's value comes from.
#[derive(Debug, Clone, Copy)]
enum Source {
    Path(&'static str),
    FullName,
}

/// One thing a form asks about, how to recognise it and where its answer is.
#[derive(Debug, Clone, Copy)]
struct Concept {
    key: &'static str,
    source: Source,
    /// Phrases matched against the field's label and name tokens.
    keywords: &'static [&'static str],
    /// Whole labels that identify the concept on their own.
    exact: &'static [&'static str],
}

const fn concept(key: &'static str, path: &'static str, keywords: &'static [&'static str]) -> Concept {
    Concept {
        key,
        source: Source::Path(path),
        keywords,
        exact: &[],
    }
}

const BASIC: &[Concept] = &[
    concept("first_name", "personal.first_name", &["first name", "given name", "firstname", "preferred first name"]),
    concept("last_name", "personal.last_name", &["last name", "family name", "surname", "lastname"]),
    Concept {
        key: "full_name",
        source: Source::FullName,
        keywords: &["full name", "legal name", "your name"],
        exact: &["name"],
    },
    concept("email", "personal.email", &["email", "e mail"]),
    concept("phone", "personal.phone", &["phone", "mobile", "telephone"]),
    concept("location", "personal.location", &["location", "where are you based", "current address"]),
    concept("city", "personal.city", &["city"]),
    concept("state", "personal.state", &["state", "province"]),
    concept("country", "personal.country", &["country"]),
    concept("linkedin", "links.linkedin", &["linkedin"]),
    concept("github", "links.github", &["github"]),
    concept("portfolio", "links.portfolio", &["portfolio"]),
    concept("website", "links.website", &["website", "personal site"]),
];

const EDUCATION: &[Concept] = &[
    concept("school", "education[0].school", &["school", "university", "college", "institution"]),
    concept("degree", "education[0].degree", &["degree"]),
    concept("discipline", "education[0].field", &["discipline", "field of study", "major"]),
    concept("graduation_year", "education[0].graduation_year", &["graduation year", "year of graduation"]),
    concept("gpa", "education[0].gpa", &["gpa", "grade point average"]),
];

const COMPLIANCE: &[Concept] = &[
    concept(
        "work_authorized",
        "compliance.work_authorized",
        &["authorized to work", "authorised to work", "legally authorized", "eligible to work", "work authorization"],
    ),
    concept("requires_sponsorship", "compliance.requires_sponsorship", &["sponsorship", "visa"]),
    concept("hispanic_latino", "compliance.hispanic_latino", &["hispanic", "latino"]),
    concept("gender", "compliance.gender", &["gender"]),
    concept("race", "compliance.race", &["race", "ethnicity"]),
    concept("veteran_status", "compliance.veteran_status", &["veteran"]),
    concept("disability_status", "compliance.disability_status", &["disability"]),
];

/// Known template names and the question phrasings they answer.
const TEMPLATE_KEYWORDS: &[(&str, &[&str])] = &[
    ("why_company", &["why do you want to work", "why are you interested in", "why join"]),
    ("why_role", &["why this role", "interest in this role", "interested in this position"]),
    ("cover_letter", &["cover letter"]),
    ("additional_info", &["additional information", "anything else"]),
    ("salary", &["salary", "compensation"]),
    ("start_date", &["start date", "when can you start"]),
];

const RESUME_WORDS: &[&str] = &["resume", "cv", "curriculum vitae"];

/// Field kinds each pass may touch.
fn basic_kind(kind: FieldKind) -> bool {
    (kind.is_text_like() && kind != FieldKind::Textarea) || kind == FieldKind::Select
}

fn education_kind(kind: FieldKind) -> bool {
    (kind.is_text_like() && kind != FieldKind::Textarea) || kind.has_options()
}

fn compliance_kind(kind: FieldKind) -> bool {
    kind.has_options() || kind == FieldKind::Checkbox
}

/// Runs the rule-based passes against one document.
pub struct RuleFiller<'a, D: PageActions + ?Sized> {
    executor: FillExecutor<'a, D>,
    profile: &'a CandidateProfile,
    platform: &'a PlatformProfile,
    job: JobContext,
    value_map: ValueMap,
    resume: Option<PathBuf>,
    oracle: Option<&'a dyn Oracle>,
    oracle_timeout: Duration,
}

impl<'a, D> RuleFiller<'a, D>
where
    D: PageActions + ?Sized,
{
    pub fn new(
        dom: &'a D,
        profile: &'a CandidateProfile,
        platform: &'a PlatformProfile,
        config: FillConfig,
    ) -> Self {
        Self {
            executor: FillExecutor::new(dom, config),
            profile,
            platform,
            job: JobContext::default(),
            value_map: ValueMap::default(),
            resume: None,
            oracle: None,
            oracle_timeout: Duration::from_secs(60),
        }
    }

    pub fn job(mut self, job: JobContext) -> Self {
        self.job = job;
        self
    }

    pub fn value_map(mut self, value_map: ValueMap) -> Self {
        self.value_map = value_map;
        self
    }

    pub fn resume(mut self, path: impl Into<PathBuf>) -> Self {
        self.resume = Some(path.into());
        self
    }

    pub fn oracle(mut self, oracle: &'a dyn Oracle, timeout: Duration) -> Self {
        self.oracle = Some(oracle);
        self.oracle_timeout = timeout;
        self
    }

    /// Every pass in order. Only oracle transport failures are errors.
    pub async fn fill_form(&self, tracker: &mut FieldTracker) -> Result<FillSummary> {
        self.resume_upload(tracker).await?;
        self.basic_fields(tracker).await?;
        self.education_dropdowns(tracker).await?;
        self.compliance_dropdowns(tracker).await?;
        self.ai_pass(tracker).await?;
        let summary = tracker.summary();
        info!(filled = summary.filled, failed = summary.failed.len(), "form pass complete");
        Ok(summary)
    }

    /// Upload the resume through the platform's file input. Returns the
    /// number of uploads (0 or 1).
    pub async fn resume_upload(&self, tracker: &mut FieldTracker) -> Result<usize> {
        let Some(resume) = &self.resume else {
            return Ok(0);
        };
        let value = resume.to_string_lossy();
        let dom = self.executor.dom();

        let mut candidates: Vec<Field> = Vec::new();
        for selector in &self.platform.resume_selectors {
            if dom.resolve(selector).await?.is_some() {
                candidates.push(Field::new(selector.clone(), FieldKind::File, "Resume"));
            }
        }
        for field in FieldExtractor::agent().extract(dom).await {
            let haystack = field.haystack();
            if field.kind == FieldKind::File && RESUME_WORDS.iter().any(|w| haystack.contains(w)) {
                candidates.push(field);
            }
        }

        for field in candidates {
            if tracker.is_filled(&field.selector) {
                return Ok(0);
            }
            if self.executor.fill(tracker, &field, &value, FillModule::Rules).await == FillOutcome::Filled {
                info!(selector = %field.selector, "resume uploaded");
                return Ok(1);
            }
        }
        debug!("no resume input found");
        Ok(0)
    }

    pub async fn basic_fields(&self, tracker: &mut FieldTracker) -> Result<usize> {
        self.concept_pass(tracker, "basic", BASIC, basic_kind).await
    }

    pub async fn education_dropdowns(&self, tracker: &mut FieldTracker) -> Result<usize> {
        self.concept_pass(tracker, "education", EDUCATION, education_kind).await
    }

    pub async fn compliance_dropdowns(&self, tracker: &mut FieldTracker) -> Result<usize> {
        self.concept_pass(tracker, "compliance", COMPLIANCE, compliance_kind).await
    }

    async fn concept_pass(
        &self,
        tracker: &mut FieldTracker,
        pass: &str,
        concepts: &[Concept],
        kind_allowed: fn(FieldKind) -> bool,
    ) -> Result<usize> {
        let dom = self.executor.dom();
        let fields = FieldExtractor::visible().extract(dom).await;
        let mut handles = Vec::with_capacity(fields.len());
        for field in &fields {
            handles.push(dom.resolve(&field.selector).await?);
        }

        let mut claimed: HashSet<&str> = HashSet::new();
        let mut filled = 0;
        for concept in concepts {
            let Some(value) = self.concept_value(concept) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            let targets = self.targets(concept, &fields, &handles).await?;
            for i in targets {
                let field = &fields[i];
                if !kind_allowed(field.kind)
                    || !field.is_empty()
                    || tracker.is_filled(&field.selector)
                    || !claimed.insert(field.selector.as_str())
                {
                    continue;
                }
                debug!(pass, concept = concept.key, selector = %field.selector, label = %field.label, "matched");
                if self.executor.fill(tracker, field, &value, FillModule::Rules).await == FillOutcome::Filled {
                    filled += 1;
                }
            }
        }
        info!(pass, filled, "pass complete");
        Ok(filled)
    }

    /// Indices of fields for `concept`: platform selectors first, then
    /// label keywords.
    async fn targets(
        &self,
        concept: &Concept,
        fields: &[Field],
        handles: &[Option<ElementHandle>],
    ) -> Result<Vec<usize>> {
        let dom = self.executor.dom();
        let mut out = Vec::new();
        for selector in self.platform.selectors(concept.key) {
            let Some(handle) = dom.resolve(selector).await? else {
                continue;
            };
            if let Some(i) = handles.iter().position(|h| *h == Some(handle)) {
                if !out.contains(&i) {
                    out.push(i);
                }
            }
        }
        for (i, field) in fields.iter().enumerate() {
            if !out.contains(&i) && concept_matches(concept, field) {
                out.push(i);
            }
        }
        Ok(out)
    }

    fn concept_value(&self, concept: &Concept) -> Option<String> {
        match concept.source {
            Source::Path(path) => self
                .profile
                .resolve_value(path)
                .map(|v| v.to_target(&self.value_map)),
            Source::FullName => {
                let p = &self.profile.personal;
                let name = format!("{} {}", p.first_name, p.last_name);
                Some(name.trim().to_string())
            }
        }
    }

    /// Fill what the concept passes left: templates first, then the oracle.
    pub async fn ai_pass(&self, tracker: &mut FieldTracker) -> Result<usize> {
        let dom = self.executor.dom();
        let fields = FieldExtractor::visible().extract(dom).await;
        let mut filled = 0;
        for field in &fields {
            if matches!(field.kind, FieldKind::File | FieldKind::Checkbox)
                || !field.is_empty()
                || tracker.is_filled(&field.selector)
            {
                continue;
            }
            let answer = match self.template_answer(field) {
                Some(answer) => Some(answer),
                None => self.ask_oracle(tracker, field).await?,
            };
            let Some(answer) = answer else {
                continue;
            };
            if self.executor.fill(tracker, field, &answer, FillModule::Ai).await == FillOutcome::Filled {
                filled += 1;
            }
        }
        info!(pass = "ai", filled, "pass complete");
        Ok(filled)
    }

    fn template_answer(&self, field: &Field) -> Option<String> {
        let label = normalize(&field.label);
        let tokens: Vec<&str> = label.split(' ').collect();
        for name in self.profile.template_names() {
            let known = TEMPLATE_KEYWORDS
                .iter()
                .find(|(known, _)| *known == name)
                .map(|(_, phrases)| phrases.iter().any(|p| label.contains(p)));
            let hit = known.unwrap_or_else(|| {
                name.split('_').all(|part| tokens.contains(&part))
            });
            if hit {
                debug!(selector = %field.selector, template = name, "template answer");
                return self.profile.render_template(name, &self.job);
            }
        }
        None
    }

    /// `Ok(None)` when there is no oracle, it says SKIP, or it timed out.
    async fn ask_oracle(&self, tracker: &mut FieldTracker, field: &Field) -> Result<Option<String>> {
        let Some(oracle) = self.oracle else {
            return Ok(None);
        };
        let prompt = self.question_prompt(field);
        let reply = match tokio::time::timeout(self.oracle_timeout, oracle.complete(&prompt)).await {
            Ok(reply) => reply?,
            Err(_) => {
                let reason = format!("oracle timed out after {:?}", self.oracle_timeout);
                warn!(selector = %field.selector, label = %field.label, %reason, "no answer");
                tracker.record_failure(&field.selector, &field.label, "", FillModule::Ai, &reason);
                return Ok(None);
            }
        };
        let answer = reply.trim().trim_matches('"').trim().to_string();
        if answer.is_empty() || answer.eq_ignore_ascii_case("skip") {
            debug!(selector = %field.selector, label = %field.label, "oracle skipped");
            return Ok(None);
        }
        Ok(Some(answer))
    }

    fn question_prompt(&self, field: &Field) -> String {
        let mut prompt = format!(
            "You are filling out a job application for the {} position at {}.\n\
             Candidate profile:\n{}\n\nQuestion: {}\n",
            if self.job.role.is_empty() { "open" } else { self.job.role.as_str() },
            if self.job.company.is_empty() { "the company" } else { self.job.company.as_str() },
            self.profile.summary(),
            field.label,
        );
        if field.has_resolved_options() {
            let options: Vec<&str> = field.options().iter().map(|o| o.text.as_str()).collect();
            prompt.push_str(&format!("Options: {}\n", options.join(" | ")));
            prompt.push_str("Answer with exactly one of the options.\n");
        } else if field.kind == FieldKind::Textarea {
            prompt.push_str("Answer in two to four sentences, first person.\n");
        } else {
            prompt.push_str("Answer with the value only, no explanation.\n");
        }
        prompt.push_str("If the profile does not answer the question, reply SKIP.");
        prompt
    }
}

fn concept_matches(concept: &Concept, field: &Field) -> bool {
    let label = normalize(&field.label);
    if concept.exact.contains(&label.as_str()) {
        return true;
    }
    let haystack = normalize(&field.haystack());
    let tokens: Vec<&str> = haystack.split(' ').collect();
    concept.keywords.iter().any(|k| {
        let phrase: Vec<&str> = k.split(' ').collect();
        tokens.windows(phrase.len()).any(|w| w == phrase.as_slice())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(label: &str) -> Field {
        Field::new("#x", FieldKind::Text, label)
    }

    fn find(key: &str) -> &'static Concept {
        BASIC
            .iter()
            .chain(EDUCATION)
            .chain(COMPLIANCE)
            .find(|c| c.key == key)
            .unwrap()
    }

    #[test]
    fn keywords_match_whole_words() {
        assert!(concept_matches(find("first_name"), &labelled("First Name *")));
        assert!(concept_matches(find("state"), &labelled("State / Province")));
        assert!(!concept_matches(
            find("state"),
            &labelled("Are you authorized to work in the United States?")
        ));
        assert!(concept_matches(
            find("work_authorized"),
            &labelled("Are you authorized to work in the United States?")
        ));
    }

    #[test]
    fn bare_name_label_is_full_name_only() {
        assert!(concept_matches(find("full_name"), &labelled("Name")));
        assert!(!concept_matches(find("full_name"), &labelled("School Name")));
    }

    #[test]
    fn name_attribute_counts() {
        let mut field = labelled("Field 3");
        field.name = Some("job_application[phone]".into());
        assert!(concept_matches(find("phone"), &field));
    }
}
