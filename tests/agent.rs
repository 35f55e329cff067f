mod common;

use std::time::Duration;

use apply_pilot::dom::InteractionKind;
use apply_pilot::{
    AgentLoop, AgentState, DomInspector, Error, FieldTracker, FillModule, HtmlDom, MemoryRecorder,
};

use common::{
    application_dom, fast_agent, profile, BrokenOracle, ScriptedOracle, SlowOracle, ACCOUNT_PAGE,
    MULTI_STEP,
};

fn multi_step() -> HtmlDom {
    HtmlDom::parse("https://jobs.acme.example/apply/88", MULTI_STEP)
}

fn clicks(dom: &HtmlDom) -> usize {
    dom.interactions()
        .iter()
        .filter(|i| i.kind == InteractionKind::Click)
        .count()
}

#[tokio::test]
async fn done_ends_the_run_successfully() {
    let dom = application_dom();
    let oracle = ScriptedOracle::new([r#"{"type": "done", "reason": "application submitted"}"#]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert!(outcome.success);
    assert_eq!(outcome.state, AgentState::Done);
    assert_eq!(outcome.steps_taken, 1);
    assert_eq!(outcome.reason, "application submitted");
    assert!(outcome.history.is_empty());
    assert_eq!(agent.state(), AgentState::Done);
}

#[tokio::test]
async fn fill_then_done_records_an_agent_fill() {
    let dom = multi_step();
    let oracle = ScriptedOracle::new([
        r##"I will fill the name first. {"type": "fill_field", "target": "#full_name", "value": "Ada Lovelace"}"##,
        r#"{"type": "done"}"#,
    ]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::Done);
    assert_eq!(outcome.steps_taken, 2);
    assert_eq!(outcome.reason, "application complete");
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(outcome.history[0].result, "ok");

    let handle = dom.resolve("#full_name").await.unwrap().unwrap();
    assert_eq!(dom.value(handle).await.unwrap(), "Ada Lovelace");
    assert!(tracker.is_filled("#full_name"));
    assert_eq!(tracker.records()[0].module, FillModule::Agent);

    // The second prompt carries the first action's result.
    let prompts = oracle.prompts();
    assert!(prompts[1].contains("1. fill_field #full_name -> ok"));
}

#[tokio::test]
async fn autofill_ui_inputs_are_never_filled() {
    let dom = application_dom();
    let oracle = ScriptedOracle::new([
        r##"{"type": "fill_field", "target": "#overlay-note", "value": "pwned"}"##,
        r#"{"type": "done"}"#,
    ]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::Done);
    assert!(outcome.history[0].result.contains("no field matching"));
    let note = dom.resolve("#overlay-note").await.unwrap().unwrap();
    assert_eq!(dom.value(note).await.unwrap(), "");
    assert!(!tracker.is_filled("#overlay-note"));
}

#[tokio::test]
async fn repeated_identical_clicks_are_a_loop() {
    let dom = multi_step();
    let oracle = ScriptedOracle::new([r#"{"type": "click_button", "target": "Add education"}"#]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::Failed);
    assert_eq!(outcome.reason, "action loop detected");
    assert_eq!(outcome.steps_taken, 3);
    assert_eq!(outcome.history.last().map(|h| h.result.as_str()), Some("loop detected"));
    // The third click is never performed.
    assert_eq!(clicks(&dom), 2);
}

#[tokio::test]
async fn buttons_not_offered_are_never_clicked() {
    let dom = application_dom();
    let oracle = ScriptedOracle::new([r#"{"type": "click_button", "target": "Apply now"}"#]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert!(!outcome.success);
    assert!(outcome.history[0].result.contains("no offered button"));
    assert_eq!(clicks(&dom), 0);
}

#[tokio::test]
async fn disabled_buttons_are_not_offered() {
    let dom = multi_step();
    let oracle = ScriptedOracle::new([
        r#"{"type": "click_button", "target": "Submit"}"#,
        r#"{"type": "need_help", "reason": "cannot submit"}"#,
    ]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::NeedsHelp);
    assert_eq!(outcome.reason, "cannot submit");
    assert_ne!(outcome.history[0].result, "ok");
    assert_eq!(clicks(&dom), 0);
}

#[tokio::test]
async fn consecutive_failures_end_the_run() {
    let dom = application_dom();
    let replies: Vec<String> = (1..=10)
        .map(|i| format!(r##"{{"type": "fill_field", "target": "#nope{i}", "value": "x"}}"##))
        .collect();
    let oracle = ScriptedOracle::new(replies);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::Failed);
    assert_eq!(outcome.reason, "too many consecutive failures");
    assert_eq!(outcome.steps_taken, 5);
    assert!(outcome.history.iter().all(|h| h.result.contains("no field matching")));
}

#[tokio::test]
async fn a_success_resets_the_failure_count() {
    let dom = multi_step();
    let oracle = ScriptedOracle::new([
        r##"{"type": "fill_field", "target": "#nope1", "value": "x"}"##,
        r##"{"type": "fill_field", "target": "#nope2", "value": "x"}"##,
        r##"{"type": "fill_field", "target": "#nope3", "value": "x"}"##,
        r##"{"type": "fill_field", "target": "#nope4", "value": "x"}"##,
        r##"{"type": "fill_field", "target": "Email address", "value": "ada@example.com"}"##,
        r##"{"type": "fill_field", "target": "#nope5", "value": "x"}"##,
        r#"{"type": "done"}"#,
    ]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::Done);
    assert_eq!(outcome.steps_taken, 7);
    assert!(tracker.is_filled("#mail"));
}

#[tokio::test]
async fn need_help_hands_back_control() {
    let dom = application_dom();
    let oracle = ScriptedOracle::new(["This form wants a CAPTCHA. NEED_HELP"]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::NeedsHelp);
    assert!(!outcome.success);
    assert_eq!(outcome.steps_taken, 1);
}

#[tokio::test]
async fn account_creation_stops_before_asking_the_oracle() {
    let dom = HtmlDom::parse("https://acme.example/signup", ACCOUNT_PAGE);
    let oracle = ScriptedOracle::new([r#"{"type": "done"}"#]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::NeedsHelp);
    assert_eq!(outcome.steps_taken, 0);
    assert!(outcome.reason.contains("account creation"));
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn outcome_is_recorded_under_the_normalized_url() {
    let dom = HtmlDom::parse(
        "https://boards.greenhouse.io/acme/jobs/4012/?gh_src=newsletter#app",
        MULTI_STEP,
    );
    let oracle = ScriptedOracle::new([r#"{"type": "done"}"#]);
    let recorder = MemoryRecorder::new();
    let mut agent =
        AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent()).recorder(&recorder);
    let mut tracker = FieldTracker::new();

    agent.run(&mut tracker).await.expect("run");
    let entries = recorder.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "https://boards.greenhouse.io/acme/jobs/4012");
    assert!(entries[0].1.success);
}

#[tokio::test]
async fn oracle_transport_errors_propagate() {
    let dom = application_dom();
    let oracle = BrokenOracle;
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();

    let err = agent.run(&mut tracker).await.unwrap_err();
    assert!(matches!(err, Error::Oracle(_)));
}

#[tokio::test]
async fn oracle_timeouts_count_as_failures() {
    let dom = application_dom();
    let oracle = SlowOracle;
    let config = fast_agent().oracle_timeout(Duration::from_millis(10));
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), config);
    let mut tracker = FieldTracker::new();

    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::Failed);
    assert_eq!(outcome.reason, "too many consecutive failures");
    assert!(outcome.history.is_empty());
}

#[tokio::test]
async fn step_limit_and_run_budget_bound_the_run() {
    let dom = application_dom();
    let oracle = ScriptedOracle::new([
        r#"{"type": "scroll", "value": "down"}"#,
        r#"{"type": "wait", "value": "0"}"#,
    ]);
    let mut agent =
        AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent().max_steps(2));
    let mut tracker = FieldTracker::new();
    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::Failed);
    assert_eq!(outcome.reason, "step limit reached");
    assert_eq!(outcome.steps_taken, 2);

    let oracle = ScriptedOracle::new([r#"{"type": "done"}"#]);
    let config = fast_agent().run_budget(Duration::ZERO);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), config);
    let outcome = agent.run(&mut tracker).await.expect("run");
    assert_eq!(outcome.state, AgentState::Failed);
    assert!(outcome.reason.starts_with("run budget"));
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn prompt_describes_hidden_sections() {
    let dom = multi_step();
    let oracle = ScriptedOracle::new([r#"{"type": "done"}"#]);
    let mut agent = AgentLoop::new(&dom, &oracle, profile().summary(), fast_agent());
    let mut tracker = FieldTracker::new();
    agent.run(&mut tracker).await.expect("run");

    let prompt = &oracle.prompts()[0];
    assert!(prompt.contains("Name: Ada Lovelace"));
    assert!(prompt.contains(r##""selector":"#edu-school""##));
    assert!(prompt.contains(r#""visible":false"#));
    assert!(prompt.contains("Email address is required"));
    assert!(!prompt.contains("Secret"));
}
