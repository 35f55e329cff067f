//! Page-state classification from marker controls, page text and URL shape.

use serde::Serialize;
use tracing::debug;

use crate::dom::DomInspector;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageState {
    Listing,
    ApplicationForm,
    AccountCreation,
    Unknown,
}

/// Full classification result. `account_creation` can co-occur with either
/// listing or application markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub listing_markers: usize,
    pub application_markers: usize,
    pub account_creation: bool,
    /// State ignoring the account-creation signal.
    pub form_state: PageState,
}

impl Classification {
    /// Single state; account creation wins because it needs a human.
    pub fn state(&self) -> PageState {
        if self.account_creation {
            PageState::AccountCreation
        } else {
            self.form_state
        }
    }
}

const LISTING_TOKENS: &[&str] = &["search", "keyword", "filter", "query"];

const APPLICATION_TOKENS: &[&str] = &[
    "first_name", "firstname", "first-name", "first name",
    "last_name", "lastname", "last-name", "last name",
    "full_name", "fullname", "full name",
    "email", "phone", "resume", "cv", "cover_letter", "cover letter",
    "school", "university", "degree", "education", "linkedin",
];

const ACCOUNT_PHRASES: &[&str] = &[
    "create an account",
    "create account",
    "create your account",
    "sign up to apply",
    "register to apply",
    "register for an account",
];

const CONFIRM_TOKENS: &[&str] = &["confirm", "repeat", "verify", "re-enter", "retype"];

/// Classify the current document.
pub async fn classify<D>(dom: &D) -> Result<PageState>
where
    D: DomInspector + ?Sized,
{
    Ok(inspect(dom).await?.state())
}

/// Count markers and decide. Purely a function of the current document.
pub async fn inspect<D>(dom: &D) -> Result<Classification>
where
    D: DomInspector + ?Sized,
{
    let mut listing = 0;
    let mut application = 0;
    let mut confirm_password = false;
    let mut passwords = 0;

    for handle in dom.query_all("input, select, textarea").await? {
        if !dom.computed_visible(handle).await? || dom.in_ui_layer(handle).await? {
            continue;
        }
        let input_type = dom
            .attribute(handle, "type")
            .await?
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut haystack = String::new();
        for attr in ["name", "id", "placeholder", "aria-label", "autocomplete"] {
            if let Some(v) = dom.attribute(handle, attr).await? {
                haystack.push_str(&v.to_lowercase());
                haystack.push(' ');
            }
        }

        if input_type == "password" {
            passwords += 1;
            if CONFIRM_TOKENS.iter().any(|t| haystack.contains(t)) {
                confirm_password = true;
            }
            continue;
        }
        if input_type == "search" || LISTING_TOKENS.iter().any(|t| haystack.contains(t)) {
            listing += 1;
        } else if matches!(input_type.as_str(), "email" | "tel" | "file")
            || haystack.split_whitespace().any(|w| w == "name")
            || APPLICATION_TOKENS.iter().any(|t| haystack.contains(t))
        {
            application += 1;
        }
    }

    let body = dom.body_text().await?.to_lowercase();
    let account_creation = confirm_password
        || passwords >= 2
        || ACCOUNT_PHRASES.iter().any(|p| body.contains(p));

    let url = dom.url().await?.to_lowercase();
    let form_state = if listing > 2 && application < 3 {
        PageState::Listing
    } else if application >= 2 {
        PageState::ApplicationForm
    } else if application >= 1 && (url.contains("/apply") || url.contains("application")) {
        PageState::ApplicationForm
    } else if listing >= 1 && (url.contains("/jobs?") || url.contains("search")) {
        PageState::Listing
    } else {
        PageState::Unknown
    };

    let classification = Classification {
        listing_markers: listing,
        application_markers: application,
        account_creation,
        form_state,
    };
    debug!(?classification, "classified page");
    Ok(classification)
}
