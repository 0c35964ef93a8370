use super::*;
use hookwire_testing::RenderTestRule;

fn callable_for(rule: &RenderTestRule, label: &str) -> String {
    find_id(&rule.payload(), label).expect("button encoded")
}

fn find_id(payload: &serde_json::Value, label: &str) -> Option<String> {
    match payload {
        serde_json::Value::Object(map) => {
            let props = map.get("props");
            if props.and_then(|props| props.get("label")).and_then(|value| value.as_str())
                == Some(label)
            {
                return props
                    .and_then(|props| props.get("onClick"))
                    .and_then(|click| click.get("__callableId"))
                    .and_then(|id| id.as_str())
                    .map(str::to_owned);
            }
            map.values().find_map(|value| find_id(value, label))
        }
        serde_json::Value::Array(items) => items.iter().find_map(|item| find_id(item, label)),
        _ => None,
    }
}

fn click(rule: &mut RenderTestRule, label: &str) {
    let id = callable_for(rule, label);
    rule.invoke(&id, &[]).expect("invoke");
    rule.pump_until_idle().expect("pump");
}

fn counter_text(rule: &RenderTestRule) -> Option<String> {
    rule.find_node("text")
        .and_then(|node| node.prop("value").and_then(Value::as_str).map(str::to_owned))
}

#[test]
fn counter_buttons_update_the_label() {
    let ticker = Ticker::new("ACME");
    let mut rule = RenderTestRule::new();
    rule.set_content(move || app(ExternalObject::from_rc(Rc::clone(&ticker))))
        .expect("install content");
    assert_eq!(counter_text(&rule).as_deref(), Some("clicks: 0"));

    click(&mut rule, "+");
    click(&mut rule, "+");
    click(&mut rule, "-");
    assert_eq!(counter_text(&rule).as_deref(), Some("clicks: 1"));
}

#[test]
fn toggle_subscribes_and_unsubscribes_the_ticker() {
    let ticker = Ticker::new("ACME");
    let handle = ExternalObject::from_rc(Rc::clone(&ticker));
    let mut rule = RenderTestRule::new();
    rule.set_content(move || app(handle.clone()))
        .expect("install content");
    assert_eq!(ticker.subscribers(), 0);

    click(&mut rule, "show");
    assert_eq!(ticker.subscribers(), 1);
    assert!(rule.find_node("chart").is_some());
    // The ticker first reaches the wire as the chart's source.
    let document = rule.document().expect("document");
    assert_eq!(document.new_object_ids(), vec![0]);

    click(&mut rule, "hide");
    assert_eq!(ticker.subscribers(), 0);
    assert!(rule.find_node("chart").is_none());

    click(&mut rule, "show");
    rule.unmount();
    assert_eq!(ticker.subscribers(), 0);
}

#[test]
fn clicking_the_toggle_skips_the_memoized_counter() {
    let ticker = Ticker::new("ACME");
    let mut rule = RenderTestRule::new();
    rule.set_content(move || app(ExternalObject::from_rc(Rc::clone(&ticker))))
        .expect("install content");

    click(&mut rule, "show");
    assert_eq!(rule.last_stats().skipped, 1);
}
