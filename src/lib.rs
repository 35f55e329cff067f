//! Form understanding and filling for job-application pages.
//!
//! Everything above the browser layer is written against
//! [`dom::DomInspector`] / [`dom::PageActions`], so the same code drives a
//! live Chrome [`Page`] or an in-memory [`dom::HtmlDom`].

pub mod agent;
pub mod browser;
pub mod classify;
pub mod config;
pub mod dom;
pub mod element;
pub mod error;
pub mod extract;
pub mod field;
pub mod fill;
pub mod history;
pub mod oracle;
pub mod page;
pub mod passes;
pub mod platform;
pub mod resolve;
pub mod tracker;

pub use agent::{AgentLoop, AgentOutcome, AgentState};
pub use browser::Browser;
pub use classify::{classify, PageState};
pub use config::{AgentConfig, BrowserBuilder, BrowserConfig, FillConfig};
pub use dom::{DomInspector, ElementHandle, HtmlDom, ObservationMode, PageActions};
pub use error::{Error, Result};
pub use extract::FieldExtractor;
pub use field::{Button, ButtonKind, Field, FieldKind, FieldOption, FormSnapshot};
pub use fill::{FillExecutor, FillOutcome};
pub use history::{normalize_url, MemoryRecorder, OutcomeRecorder};
pub use oracle::{ChatOracle, Oracle};
pub use page::Page;
pub use passes::RuleFiller;
pub use platform::{PlatformProfile, PlatformTable};
pub use resolve::{CandidateProfile, JobContext, ValueMap};
pub use tracker::{FieldTracker, FillModule, FillSummary};
