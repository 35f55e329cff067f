#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use apply_pilot::{AgentConfig, CandidateProfile, FillConfig, HtmlDom, Oracle, Result};
use async_trait::async_trait;

pub const GREENHOUSE_URL: &str = "https://boards.greenhouse.io/acme/jobs/4012";

pub const APPLICATION_FORM: &str = r#"
<html><head><title>Job Application for Engineer at Acme</title></head><body>
  <h1>Engineer</h1>
  <form id="application_form">
    <div class="field"><label for="first_name">First Name *</label>
      <input id="first_name" name="job_application[first_name]" required></div>
    <div class="field"><label for="last_name">Last Name *</label>
      <input id="last_name" name="job_application[last_name]" required></div>
    <div class="field"><label for="email">Email *</label>
      <input id="email" type="email" name="job_application[email]" required></div>
    <div class="field"><label for="phone">Phone</label>
      <input id="phone" type="tel" name="job_application[phone]" value="555-0100"></div>
    <div class="field"><label for="resume">Resume/CV</label>
      <input id="resume" type="file" name="resume"></div>
    <div class="field"><label for="school">School</label>
      <input id="school" name="school"></div>
    <div class="field"><label for="degree">Degree</label>
      <select id="degree">
        <option value="">Select...</option>
        <option>Bachelor's</option><option>Master's</option><option>PhD</option>
      </select></div>
    <fieldset>
      <legend>Are you legally authorized to work in the United States? *</legend>
      <label><input type="radio" name="authorized" value="1"> Yes</label>
      <label><input type="radio" name="authorized" value="0"> No</label>
    </fieldset>
    <div class="field"><label for="gender">Gender</label>
      <select id="gender">
        <option value="">Select...</option>
        <option value="m">Male</option>
        <option value="f">Female</option>
        <option value="d">Decline to self-identify</option>
      </select></div>
    <div class="field"><label for="why">Why do you want to work at Acme?</label>
      <textarea id="why"></textarea></div>
    <div class="field"><label for="salary">Desired salary</label>
      <input id="salary" name="salary"></div>
    <div class="field"><input type="checkbox" id="consent">
      <label for="consent">I agree to the privacy policy</label></div>
    <button type="submit">Submit Application</button>
  </form>
  <div data-autofill-ui><button>Autofill</button><input id="overlay-note"></div>
</body></html>"#;

pub const LISTING_PAGE: &str = r#"
<html><head><title>Careers at Acme</title></head><body>
  <input type="search" name="q" placeholder="Search jobs">
  <input name="keyword" placeholder="Keyword">
  <input name="location_filter" placeholder="Filter by location">
  <ul><li><a href="/jobs/1">Engineer</a></li><li><a href="/jobs/2">Designer</a></li></ul>
</body></html>"#;

pub const ACCOUNT_PAGE: &str = r#"
<html><head><title>Sign up</title></head><body>
  <h2>Create an account to continue</h2>
  <label for="acct-email">Email</label><input id="acct-email" type="email">
  <label for="pw">Password</label><input id="pw" type="password">
  <label for="pw2">Confirm password</label><input id="pw2" type="password" name="confirm_password">
  <button>Create Account</button>
</body></html>"#;

pub const MULTI_STEP: &str = r#"
<html><head><title>Apply</title></head><body>
  <div class="step" aria-current="step">Contact details</div>
  <div class="field"><label for="full_name">Full name</label><input id="full_name" name="name"></div>
  <div class="field"><label for="mail">Email address</label><input id="mail" type="email"></div>
  <button id="add-edu" aria-controls="edu">Add education</button>
  <div id="edu" hidden>
    <div class="field"><label for="edu-school">School</label><input id="edu-school"></div>
  </div>
  <button disabled>Submit</button>
  <button style="display: none">Secret</button>
  <div role="alert">Email address is required</div>
</body></html>"#;

pub fn application_dom() -> HtmlDom {
    HtmlDom::parse(GREENHOUSE_URL, APPLICATION_FORM)
}

pub fn profile() -> CandidateProfile {
    CandidateProfile::from_json(
        r#"{
            "personal": {
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "ada@example.com",
                "phone": "+44 20 7946 0000"
            },
            "education": [{"school": "University of London", "degree": "MS", "field": "Mathematics"}],
            "skills": ["Rust", "Analysis"],
            "links": {"github": "https://github.com/ada"},
            "compliance": {"work_authorized": true, "requires_sponsorship": false, "gender": "Female"},
            "ai_responses": {"templates": {"why_company": "I want to build analytical engines at {company} as a {role}."}}
        }"#,
    )
    .expect("profile fixture parses")
}

/// Quick settings so tests do not sleep.
pub fn fast_fill() -> FillConfig {
    FillConfig::default()
        .settle_delay(Duration::ZERO)
        .action_timeout(Duration::from_secs(2))
}

pub fn fast_agent() -> AgentConfig {
    AgentConfig::default()
        .step_delay(Duration::ZERO)
        .oracle_timeout(Duration::from_secs(2))
        .fill(fast_fill())
}

/// Replies in order, repeating the last one; keeps every prompt it saw.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            last: Mutex::new(String::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.replies.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

/// Never answers in time.
pub struct SlowOracle;

#[async_trait]
impl Oracle for SlowOracle {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

/// Fails like a rejected API key.
pub struct BrokenOracle;

#[async_trait]
impl Oracle for BrokenOracle {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(apply_pilot::Error::Oracle("401 Unauthorized".into()))
    }
}
