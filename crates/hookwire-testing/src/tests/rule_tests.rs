use super::*;
use hookwire_core::{deps, Component, Element, Props, RenderError, Value};
use serde_json::json;

fn counter() -> Component {
    Component::new("Counter", |ctx, props| {
        let start = props.get("start").and_then(Value::as_int).unwrap_or(0);
        let (count, set_count) = ctx.use_state(|| start)?;
        let increment = ctx.use_callback(
            move |_| {
                set_count.update(|count| count + 1).expect("counter mounted");
            },
            deps![],
        )?;
        Ok(Element::base(
            "text",
            Props::new()
                .with("value", count)
                .with("onIncrement", increment),
        )
        .into())
    })
}

#[test]
fn rule_reports_content_and_payload() {
    run_test_render(|rule| {
        assert!(!rule.has_content());
        assert!(rule.tree().is_none());
        assert_eq!(rule.payload(), serde_json::Value::Null);

        rule.set_content(|| counter().element(Props::new().with("start", 5)))
            .expect("install content");

        assert!(rule.has_content());
        assert_eq!(rule.pass_count(), 1);
        let text = rule.find_node("text").expect("text node");
        assert_eq!(text.prop("value"), Some(&Value::Int(5)));
        assert_eq!(
            rule.payload()["props"]["children"]["props"]["onIncrement"],
            json!({ "__callableId": "cb0" })
        );
    });
}

#[test]
fn invoking_a_callable_by_id_drives_a_rerender() {
    let mut rule = RenderTestRule::new();
    rule.set_content(|| counter().element(Props::new()))
        .expect("install content");

    rule.invoke("cb0", &[]).expect("invoke");
    rule.invoke("cb0", &[]).expect("invoke");
    assert_eq!(rule.change_count(), 2);
    assert!(rule.needs_render());

    rule.pump_until_idle().expect("pump");
    assert_eq!(rule.pass_count(), 2);
    assert!(!rule.needs_render());
    let text = rule.find_node("text").expect("text node");
    assert_eq!(text.prop("value"), Some(&Value::Int(2)));
    let document = rule.document().expect("document");
    assert!(document.new_callables.is_empty());
}

#[test]
fn unknown_callable_id_is_an_error() {
    let rule = RenderTestRule::new();
    assert_eq!(
        rule.invoke("cb9", &[]),
        Err(RuleError::UnknownCallable {
            id: String::from("cb9")
        })
    );
}

#[test]
fn pump_gives_up_on_content_that_never_settles() {
    let restless = Component::new("Restless", |ctx, _| {
        let (count, set_count) = ctx.use_state(|| 0u64)?;
        set_count.set(count + 1)?;
        Ok(Value::from(count as i64))
    });
    let mut rule = RenderTestRule::new();
    rule.set_content(move || restless.element(Props::new()))
        .expect("install content");
    assert_eq!(
        rule.pump_until_idle(),
        Err(RuleError::Unsettled { passes: 100 })
    );
}

#[test]
fn render_errors_surface_through_the_rule() {
    let failing = Component::new("Failing", |_, _| Err(RenderError::component("Failing", "boom")));
    let mut rule = RenderTestRule::new();
    let err = rule
        .set_content(move || failing.element(Props::new()))
        .unwrap_err();
    assert_eq!(err, RuleError::Render(RenderError::component("Failing", "boom")));
    assert!(rule.tree().is_none());
}

#[test]
fn dump_tree_lists_nested_nodes() {
    let mut rule = RenderTestRule::new();
    rule.set_content(|| {
        Element::base_with_children(
            "column",
            Props::new(),
            vec![
                Element::base("text", Props::new().with("value", "a")).into(),
                Element::base("text", Props::new().with("value", "b")).into(),
            ],
        )
    })
    .expect("install content");

    let dump = rule.dump_tree();
    assert!(dump.starts_with("<column>\n"));
    assert_eq!(dump.matches("<text>").count(), 2);
    assert!(dump.contains("value = Str(\"b\")"));
}

#[test]
fn event_log_clones_share_entries() {
    let log = EventLog::new();
    let clone = log.clone();
    clone.record("first");
    let cleanup = log.recorder("second");
    cleanup();
    cleanup();
    assert_eq!(log.entries(), vec!["first", "second", "second"]);
    assert_eq!(clone.take().len(), 3);
    assert!(log.is_empty());
}
