mod common;

use std::collections::HashSet;

use apply_pilot::extract::observe;
use apply_pilot::field::Widget;
use apply_pilot::{ButtonKind, FieldExtractor, FieldKind, HtmlDom};

use common::{application_dom, MULTI_STEP};

fn selectors(fields: &[apply_pilot::Field]) -> Vec<String> {
    fields.iter().map(|f| f.selector.clone()).collect()
}

#[tokio::test]
async fn extraction_is_deterministic_and_deduplicated() {
    let dom = application_dom();
    let first = FieldExtractor::visible().extract(&dom).await;
    let second = FieldExtractor::visible().extract(&dom).await;
    assert_eq!(selectors(&first), selectors(&second));

    let unique: HashSet<&str> = first.iter().map(|f| f.selector.as_str()).collect();
    assert_eq!(unique.len(), first.len());
    assert_eq!(first.len(), 12);
}

#[tokio::test]
async fn fields_carry_labels_values_and_options() {
    let dom = application_dom();
    let fields = FieldExtractor::visible().extract(&dom).await;
    let by_selector = |s: &str| {
        fields
            .iter()
            .find(|f| f.selector == s)
            .unwrap_or_else(|| panic!("no field {s}"))
    };

    let first = by_selector("#first_name");
    assert_eq!(first.label, "First Name");
    assert!(first.required);
    assert_eq!(first.name.as_deref(), Some("job_application[first_name]"));

    assert_eq!(by_selector("#phone").current_value, "555-0100");
    assert_eq!(by_selector("#resume").kind, FieldKind::File);

    let degree = by_selector("#degree");
    assert_eq!(degree.kind, FieldKind::Select);
    assert_eq!(degree.options().len(), 4);
    assert!(degree.is_empty());

    let authorized = by_selector("input[name=\"authorized\"]");
    assert_eq!(authorized.kind, FieldKind::Radio);
    assert_eq!(
        authorized.label,
        "Are you legally authorized to work in the United States?"
    );
    assert!(authorized.required);
    let texts: Vec<&str> = authorized.options().iter().map(|o| o.text.as_str()).collect();
    assert_eq!(texts, ["Yes", "No"]);
    assert_eq!(authorized.options()[0].value, "1");

    assert_eq!(by_selector("#consent").label, "I agree to the privacy policy");
    assert_eq!(by_selector("#why").kind, FieldKind::Textarea);
}

#[tokio::test]
async fn own_ui_layer_is_never_extracted() {
    let dom = application_dom();
    let fields = FieldExtractor::agent().extract(&dom).await;
    assert!(fields.iter().all(|f| f.selector != "#overlay-note"));
}

#[tokio::test]
async fn observation_modes_differ_on_hidden_sections() {
    let dom = HtmlDom::parse("https://acme.example/apply", MULTI_STEP);
    let visible = FieldExtractor::visible().extract(&dom).await;
    assert!(visible.iter().all(|f| f.selector != "#edu-school"));

    let full = FieldExtractor::agent().extract(&dom).await;
    let school = full
        .iter()
        .find(|f| f.selector == "#edu-school")
        .expect("hidden field is observed");
    assert!(!school.is_visible);
    assert_eq!(school.label, "School");
}

#[tokio::test]
async fn label_channels_in_priority_order() {
    let html = r#"<html><body>
        <input id="a" aria-label="Aria wins"><label for="a">Label loses</label>
        <input id="b" placeholder="Placeholder text">
        <div class="field"><span class="label">Container caption</span><input id="c"></div>
        <input name="raw_name">
        <input>
    </body></html>"#;
    let dom = HtmlDom::parse("https://acme.example/apply", html);
    let fields = FieldExtractor::visible().extract(&dom).await;
    let labels: Vec<&str> = fields.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(
        labels,
        ["Aria wins", "Placeholder text", "Container caption", "raw_name", "Field 5"]
    );
}

#[tokio::test]
async fn custom_widgets_are_recognised() {
    let html = r#"<html><body>
        <div class="field"><label id="loc-label">Location</label>
          <div role="combobox" id="loc" aria-labelledby="loc-label" aria-controls="loc-list"></div>
          <ul role="listbox" id="loc-list" hidden>
            <li role="option">Berlin</li><li role="option">Paris</li>
          </ul>
        </div>
        <div role="radiogroup" aria-label="Willing to relocate?">
          <div role="radio" aria-checked="false" data-value="y">Yes</div>
          <div role="radio" aria-checked="true" data-value="n">No</div>
        </div>
    </body></html>"#;
    let dom = HtmlDom::parse("https://acme.example/apply", html);
    let fields = FieldExtractor::visible().extract(&dom).await;
    assert_eq!(fields.len(), 2);

    let location = &fields[0];
    assert_eq!(location.selector, "#loc");
    assert_eq!(location.widget, Widget::CustomDropdown);
    assert_eq!(location.label, "Location");
    let options: Vec<&str> = location.options().iter().map(|o| o.text.as_str()).collect();
    assert_eq!(options, ["Berlin", "Paris"]);

    let relocate = &fields[1];
    assert_eq!(relocate.widget, Widget::AriaRadio);
    assert_eq!(relocate.label, "Willing to relocate?");
    assert_eq!(relocate.current_value, "n");
}

#[tokio::test]
async fn dropdown_inputs_keep_real_labels_that_start_with_field() {
    let html = r#"<html><body>
        <div class="select__control" aria-label="Major">
          <input id="study" aria-label="Field of study">
          <div role="option">Physics</div><div role="option">History</div>
        </div>
        <div class="select__control" aria-label="Start month">
          <input>
          <div role="option">June</div>
        </div>
    </body></html>"#;
    let dom = HtmlDom::parse("https://acme.example/apply", html);
    let fields = FieldExtractor::visible().extract(&dom).await;
    let dropdowns: Vec<&apply_pilot::Field> = fields
        .iter()
        .filter(|f| f.widget == Widget::CustomDropdown)
        .collect();
    assert_eq!(dropdowns.len(), 2);
    assert_eq!(dropdowns[0].selector, "#study");
    assert_eq!(dropdowns[0].label, "Field of study");
    // An unlabelled inner input borrows the container's caption.
    assert_eq!(dropdowns[1].label, "Start month");
}

#[tokio::test]
async fn snapshot_offers_only_clickable_buttons() {
    let dom = HtmlDom::parse("https://acme.example/apply", MULTI_STEP);
    let snapshot = observe(&dom).await.expect("observe");
    let buttons: Vec<(&str, ButtonKind)> = snapshot
        .buttons
        .iter()
        .map(|b| (b.text.as_str(), b.kind))
        .collect();
    assert_eq!(buttons, [("Add education", ButtonKind::Add)]);
    assert_eq!(snapshot.errors, ["Email address is required"]);
    assert_eq!(snapshot.current_section.as_deref(), Some("Contact details"));
    assert_eq!(snapshot.title, "Apply");

    let dom = application_dom();
    let snapshot = observe(&dom).await.expect("observe");
    let texts: Vec<&str> = snapshot.buttons.iter().map(|b| b.text.as_str()).collect();
    assert_eq!(texts, ["Submit Application"]);
}
