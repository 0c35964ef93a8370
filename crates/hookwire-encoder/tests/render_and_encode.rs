use hookwire_core::{Callback, Component, Element, ExternalObject, Props, Renderer, Value};
use hookwire_encoder::NodeEncoder;
use serde_json::json;
use std::rc::Rc;

struct Table {
    rows: usize,
}

fn toggle_app(table: ExternalObject) -> Element {
    let toggle = Component::new("Toggle", move |ctx, _| {
        let (on, set_on) = ctx.use_state(|| false)?;
        let on_click = ctx.use_callback(
            move |_| {
                set_on.update(|on| !on).expect("mounted");
            },
            hookwire_core::deps![],
        )?;
        Ok(Element::base(
            "button",
            Props::new()
                .with("label", if on { "on" } else { "off" })
                .with("onClick", on_click)
                .with("table", table.clone()),
        )
        .into())
    });
    toggle.element(Props::new())
}

#[test]
fn toggle_round_trip_through_encoder() {
    let table = ExternalObject::from_rc(Rc::new(Table { rows: 3 }));
    let app = toggle_app(table.clone());
    let mut renderer = Renderer::new(|| {});
    let mut encoder = NodeEncoder::new();

    let tree = renderer.render(&app).expect("render");
    let document = encoder.encode(&tree).expect("encode");
    assert_eq!(
        document.payload,
        json!({
            "__elementName": "Toggle",
            "props": {
                "children": {
                    "__elementName": "button",
                    "props": {
                        "label": "off",
                        "onClick": { "__callableId": "cb0" },
                        "table": { "__objectId": 0 }
                    }
                }
            }
        })
    );
    assert_eq!(document.new_callable_ids(), vec!["cb0"]);
    let resolved = encoder.resolve_object(0).expect("table registered");
    assert_eq!(resolved.downcast_ref::<Table>().map(|table| table.rows), Some(3));

    // The receiving side invokes the callable by id.
    let on_click: Callback = encoder.resolve_callable("cb0").cloned().expect("known id");
    on_click.call(&[Value::from("click")]);
    assert!(renderer.needs_render());

    let tree = renderer.render(&app).expect("render");
    let document = encoder.encode(&tree).expect("encode");
    let button = &document.payload["props"]["children"]["props"];
    assert_eq!(button["label"], json!("on"));
    // use_callback kept the handler's identity, so nothing new is sent.
    assert_eq!(button["onClick"], json!({ "__callableId": "cb0" }));
    assert!(document.new_callables.is_empty());
    assert!(document.new_objects.is_empty());
}
