use hookwire_core::{deps, Component, Element, Props, Value};
use hookwire_testing::{EventLog, RenderTestRule};
use serde_json::json;

fn detail(log: &EventLog) -> Component {
    let log = log.clone();
    Component::new("Detail", move |ctx, _| {
        let log = log.clone();
        ctx.use_effect(
            move |scope| {
                log.record("subscribe");
                Ok(scope.on_cleanup(log.recorder("unsubscribe")))
            },
            Some(deps![]),
        )?;
        Ok(Element::base("text", Props::new().with("value", "details")).into())
    })
}

fn toggle(log: &EventLog) -> Component {
    let detail = detail(log);
    let log = log.clone();
    Component::new("Toggle", move |ctx, _| {
        let (open, set_open) = ctx.use_state(|| false)?;
        let on_click = ctx.use_callback(
            move |_| {
                set_open.update(|open| !open).expect("toggle mounted");
            },
            deps![],
        )?;
        let log = log.clone();
        ctx.use_effect(
            move |scope| {
                log.record(format!("toggle open={open}"));
                Ok(scope.done())
            },
            Some(deps![open]),
        )?;
        let body = if open {
            detail.element(Props::new()).into()
        } else {
            Value::Null
        };
        Ok(Value::List(vec![
            Element::base("button", Props::new().with("onClick", on_click)).into(),
            body,
        ]))
    })
}

#[test]
fn toggle_mounts_and_unmounts_detail() {
    let log = EventLog::new();
    let app = toggle(&log);
    let mut rule = RenderTestRule::new();
    rule.set_content(move || app.element(Props::new()))
        .expect("install content");
    assert_eq!(log.take(), vec!["toggle open=false"]);
    assert_eq!(
        rule.payload()["props"]["children"],
        json!([
            {
                "__elementName": "button",
                "props": { "onClick": { "__callableId": "cb0" } }
            },
            null
        ])
    );

    rule.invoke("cb0", &[]).expect("open");
    rule.pump_until_idle().expect("pump");
    assert_eq!(log.take(), vec!["subscribe", "toggle open=true"]);
    let detail = rule.find_node("text").expect("detail rendered");
    assert_eq!(detail.prop("value"), Some(&Value::from("details")));

    rule.invoke("cb0", &[]).expect("close");
    rule.pump_until_idle().expect("pump");
    assert_eq!(log.take(), vec!["unsubscribe", "toggle open=false"]);
    assert!(rule.find_node("text").is_none());
    assert_eq!(rule.last_stats().unmounted, 1);

    rule.invoke("cb0", &[]).expect("reopen");
    rule.pump_until_idle().expect("pump");
    assert_eq!(log.take(), vec!["subscribe", "toggle open=true"]);

    rule.unmount();
    assert_eq!(log.take(), vec!["unsubscribe"]);
}
