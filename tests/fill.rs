mod common;

use apply_pilot::dom::InteractionKind;
use apply_pilot::fill::locate;
use apply_pilot::{
    DomInspector, Field, FieldExtractor, FieldKind, FieldTracker, FillExecutor, FillModule,
    FillOutcome, HtmlDom,
};

use common::{application_dom, fast_fill};

async fn field(dom: &HtmlDom, selector: &str) -> Field {
    FieldExtractor::agent()
        .extract(dom)
        .await
        .into_iter()
        .find(|f| f.selector == selector)
        .unwrap_or_else(|| panic!("no field {selector}"))
}

async fn value(dom: &HtmlDom, selector: &str) -> String {
    let handle = dom.resolve(selector).await.unwrap().expect("element exists");
    dom.value(handle).await.unwrap()
}

#[tokio::test]
async fn second_fill_of_a_selector_is_a_no_op() {
    let dom = application_dom();
    let executor = FillExecutor::new(&dom, fast_fill());
    let mut tracker = FieldTracker::new();
    let email = field(&dom, "#email").await;

    let first = executor
        .fill(&mut tracker, &email, "ada@example.com", FillModule::Rules)
        .await;
    assert_eq!(first, FillOutcome::Filled);
    let interactions = dom.interaction_count();

    let second = executor
        .fill(&mut tracker, &email, "someone@else.com", FillModule::Ai)
        .await;
    assert_eq!(second, FillOutcome::AlreadyFilled);
    assert_eq!(dom.interaction_count(), interactions);
    assert_eq!(tracker.records().len(), 1);
    assert_eq!(value(&dom, "#email").await, "ada@example.com");
}

#[tokio::test]
async fn checkbox_already_in_desired_state_is_not_clicked() {
    let html = r#"<html><body>
        <input type="checkbox" id="terms" checked><label for="terms">I agree</label>
        <input type="checkbox" id="news"><label for="news">Newsletter</label>
    </body></html>"#;
    let dom = HtmlDom::parse("https://acme.example/apply", html);
    let executor = FillExecutor::new(&dom, fast_fill());
    let mut tracker = FieldTracker::new();

    let terms = field(&dom, "#terms").await;
    let outcome = executor.fill(&mut tracker, &terms, "yes", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Filled);
    assert_eq!(dom.interaction_count(), 0);

    let news = field(&dom, "#news").await;
    let outcome = executor.fill(&mut tracker, &news, "check", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Filled);
    let clicks = dom
        .interactions()
        .iter()
        .filter(|i| i.kind == InteractionKind::Click)
        .count();
    assert_eq!(clicks, 1);
    let handle = dom.resolve("#news").await.unwrap().unwrap();
    assert!(dom.is_checked(handle).await.unwrap());
}

#[tokio::test]
async fn degree_alias_picks_masters() {
    let dom = application_dom();
    let executor = FillExecutor::new(&dom, fast_fill());
    let mut tracker = FieldTracker::new();
    let degree = field(&dom, "#degree").await;

    let outcome = executor.fill(&mut tracker, &degree, "MS", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Filled);
    assert_eq!(value(&dom, "#degree").await, "Master's");
}

#[tokio::test]
async fn native_select_falls_back_to_option_value() {
    let dom = application_dom();
    let executor = FillExecutor::new(&dom, fast_fill());
    let mut tracker = FieldTracker::new();
    let gender = field(&dom, "#gender").await;

    let outcome = executor.fill(&mut tracker, &gender, "f", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Filled);
    assert_eq!(value(&dom, "#gender").await, "f");

    let mut tracker = FieldTracker::new();
    let outcome = executor
        .fill(&mut tracker, &gender, "Nonbinary", FillModule::Rules)
        .await;
    assert!(matches!(outcome, FillOutcome::Failed(ref r) if r.contains("no option")));
}

#[tokio::test]
async fn radio_group_clicks_matching_member() {
    let dom = application_dom();
    let executor = FillExecutor::new(&dom, fast_fill());
    let mut tracker = FieldTracker::new();
    let authorized = field(&dom, "input[name=\"authorized\"]").await;

    let outcome = executor.fill(&mut tracker, &authorized, "Yes", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Filled);
    let refreshed = field(&dom, "input[name=\"authorized\"]").await;
    assert_eq!(refreshed.current_value, "1");
}

#[tokio::test]
async fn failures_are_recorded_and_do_not_stop_later_fields() {
    let html = r#"<html><body>
        <div hidden><input id="secret"></div>
        <input id="city">
    </body></html>"#;
    let dom = HtmlDom::parse("https://acme.example/apply", html);
    let executor = FillExecutor::new(&dom, fast_fill());
    let mut tracker = FieldTracker::new();

    let missing = Field::new("#nope", FieldKind::Text, "Nope");
    let hidden = Field::new("#secret", FieldKind::Text, "Secret");
    let city = Field::new("#city", FieldKind::Text, "City");

    let outcome = executor.fill(&mut tracker, &missing, "x", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Failed("element not found".into()));
    let outcome = executor.fill(&mut tracker, &hidden, "x", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Failed("element not visible".into()));
    let outcome = executor.fill(&mut tracker, &city, "London", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Filled);

    let summary = tracker.summary();
    assert_eq!(summary.filled, 1);
    assert_eq!(summary.failed.len(), 2);
    assert_eq!(tracker.failures().get("#secret").map(String::as_str), Some("element not visible"));
}

#[tokio::test]
async fn readonly_input_reports_unchanged_value() {
    let html = r#"<html><body><input id="locked" readonly value="fixed"></body></html>"#;
    let dom = HtmlDom::parse("https://acme.example/apply", html);
    let executor = FillExecutor::new(&dom, fast_fill());
    let mut tracker = FieldTracker::new();
    let locked = Field::new("#locked", FieldKind::Text, "Locked");

    let outcome = executor.fill(&mut tracker, &locked, "new", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Failed("value unchanged after assignment".into()));
}

const DROPDOWN: &str = r#"<html><body>
    <div class="field"><label id="loc-label">Location</label>
      <div role="combobox" id="loc" aria-labelledby="loc-label" aria-controls="loc-list"
           aria-expanded="false"></div>
      <ul role="listbox" id="loc-list" hidden>
        <li role="option">Berlin, Germany</li><li role="option">Paris, France</li>
      </ul>
    </div>
</body></html>"#;

#[tokio::test]
async fn custom_dropdown_opens_and_picks() {
    let dom = HtmlDom::parse("https://acme.example/apply", DROPDOWN);
    let executor = FillExecutor::new(&dom, fast_fill());
    let mut tracker = FieldTracker::new();
    let location = field(&dom, "#loc").await;

    let outcome = executor.fill(&mut tracker, &location, "Paris", FillModule::Rules).await;
    assert_eq!(outcome, FillOutcome::Filled);
    assert_eq!(value(&dom, "#loc").await, "Paris, France");
}

#[tokio::test]
async fn custom_dropdown_without_match_is_dismissed() {
    let dom = HtmlDom::parse("https://acme.example/apply", DROPDOWN);
    let executor = FillExecutor::new(&dom, fast_fill());
    let mut tracker = FieldTracker::new();
    let location = field(&dom, "#loc").await;

    let outcome = executor.fill(&mut tracker, &location, "Tokyo", FillModule::Rules).await;
    assert!(matches!(outcome, FillOutcome::Failed(_)));
    let list = dom.resolve("#loc-list").await.unwrap().unwrap();
    assert!(!dom.computed_visible(list).await.unwrap());
    let last = dom.interactions().last().cloned().expect("interactions recorded");
    assert_eq!(last.kind, InteractionKind::PressKey);
    assert_eq!(last.detail, "Escape");
}

#[tokio::test]
async fn locate_by_selector_label_and_label_for() {
    let dom = application_dom();
    let fields = FieldExtractor::agent().extract(&dom).await;

    let by_selector = locate(&dom, &fields, "#school").await.unwrap().unwrap();
    assert_eq!(by_selector.selector, "#school");

    let by_label = locate(&dom, &fields, "last name").await.unwrap().unwrap();
    assert_eq!(by_label.selector, "#last_name");

    let by_partial = locate(&dom, &fields, "salary").await.unwrap().unwrap();
    assert_eq!(by_partial.selector, "#salary");

    assert!(locate(&dom, &fields, "favourite colour").await.unwrap().is_none());
}

#[tokio::test]
async fn locate_falls_back_to_label_for_text() {
    // aria-label wins the field's caption, so only the <label for> carries the words.
    let html = r#"<html><body><form>
        <label for="pronouns">Preferred pronouns</label>
        <input id="pronouns" aria-label="Pronoun field">
        <label for="nickname">Nickname</label><input id="nickname">
    </form></body></html>"#;
    let dom = HtmlDom::parse("https://jobs.acme.example/apply", html);
    let fields = FieldExtractor::agent().extract(&dom).await;
    let pronouns = fields.iter().find(|f| f.selector == "#pronouns").expect("extracted");
    assert_eq!(pronouns.label, "Pronoun field");

    let found = locate(&dom, &fields, "Preferred pronouns").await.unwrap().unwrap();
    assert_eq!(found.selector, "#pronouns");
    assert_eq!(found.label, "Pronoun field");
}
