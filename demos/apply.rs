//! Fill one job application end to end.
//!
//! ```text
//! OPENAI_API_KEY=... cargo run --example apply -- <job-url> <profile.json> [resume.pdf]
//! ```
//!
//! Set `APPLY_AGENT=1` to hand the page to the agent loop after the rule passes.

use std::time::Duration;

use apply_pilot::{
    classify, AgentConfig, AgentLoop, Browser, CandidateProfile, ChatOracle, DomInspector,
    FieldTracker, FillConfig, MemoryRecorder, PageState, PlatformTable, RuleFiller,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> apply_pilot::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(job_url), Some(profile_path)) = (args.next(), args.next()) else {
        eprintln!("usage: apply <job-url> <profile.json> [resume.pdf]");
        std::process::exit(2);
    };
    let resume = args.next();

    let profile = CandidateProfile::from_file(&profile_path)?;
    let oracle = ChatOracle::from_env()?;
    let platforms = PlatformTable::builtin();

    let browser = Browser::builder().headless(false).build().await?;
    let page = browser.new_page(&job_url).await?;

    let state = classify(&page).await?;
    println!("{} looks like: {state:?}", page.url().await?);
    if state != PageState::ApplicationForm {
        println!("not an application form; open the apply page first");
        return Ok(());
    }

    let platform = platforms.lookup(&job_url);
    println!("platform: {}", platform.name);

    let fill = FillConfig::default();
    let mut filler = RuleFiller::new(&page, &profile, platform, fill.clone())
        .oracle(&oracle, Duration::from_secs(60));
    if let Some(resume) = &resume {
        filler = filler.resume(resume);
    }
    let mut tracker = FieldTracker::with_config(&fill);
    let summary = filler.fill_form(&mut tracker).await?;
    println!("rule passes: {summary}");

    if std::env::var("APPLY_AGENT").is_ok_and(|v| v == "1") {
        let recorder = MemoryRecorder::new();
        let mut agent = AgentLoop::new(&page, &oracle, profile.summary(), AgentConfig::default().fill(fill))
            .recorder(&recorder);
        let outcome = agent.run(&mut tracker).await?;
        println!(
            "agent: {:?} after {} steps ({})",
            outcome.state, outcome.steps_taken, outcome.reason
        );
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    println!("final: {}", tracker.summary());
    Ok(())
}
