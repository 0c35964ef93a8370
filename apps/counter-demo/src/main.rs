mod app;

use anyhow::{anyhow, Context};
use hookwire_core::{ExternalObject, Renderer};
use hookwire_encoder::{EncodedDocument, NodeEncoder};
use serde_json::Value as Json;

/// Clicks a remote client would send, addressed by the button label.
const SCRIPT: &[&str] = &["+", "+", "show", "-", "hide"];

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    println!("=== hookwire counter demo ===");

    let ticker = app::Ticker::new("ACME");
    let root = app::app(ExternalObject::from_rc(ticker.clone()));
    let mut renderer = Renderer::new(|| log::debug!("state changed; render requested"));
    let mut encoder = NodeEncoder::new();

    let tree = renderer.render(&root).context("initial render")?;
    let mut document = encoder.encode(&tree).context("initial encode")?;
    print_document("initial", &document)?;

    for label in SCRIPT {
        let id = find_callable(&document.payload, label)
            .ok_or_else(|| anyhow!("no button labelled {label:?}"))?;
        let callable = encoder
            .resolve_callable(&id)
            .cloned()
            .ok_or_else(|| anyhow!("callable {id} is not registered"))?;
        println!("\n>>> click {label:?} ({id})");
        callable.call(&[]);

        while renderer.needs_render() {
            let tree = renderer.render(&root).context("render")?;
            document = encoder.encode(&tree).context("encode")?;
        }
        let stats = renderer.last_stats();
        log::info!(
            "pass: {} invoked, {} skipped, {} unmounted",
            stats.invoked,
            stats.skipped,
            stats.unmounted
        );
        print_document(label, &document)?;
    }

    renderer.unmount();
    println!("\nticker subscribers after unmount: {}", ticker.subscribers());
    Ok(())
}

fn print_document(title: &str, document: &EncodedDocument) -> anyhow::Result<()> {
    println!("--- {title} ---");
    println!("{}", serde_json::to_string_pretty(&document.payload)?);
    if !document.new_objects.is_empty() {
        println!("new objects: {:?}", document.new_object_ids());
    }
    if !document.new_callables.is_empty() {
        println!("new callables: {:?}", document.new_callable_ids());
    }
    Ok(())
}

/// Callable id of the first button whose label is `label`.
fn find_callable(payload: &Json, label: &str) -> Option<String> {
    match payload {
        Json::Object(map) => {
            let props = map.get("props");
            let is_button = map.get("__elementName").and_then(Json::as_str) == Some("button")
                && props.and_then(|props| props.get("label")).and_then(Json::as_str)
                    == Some(label);
            if is_button {
                return props
                    .and_then(|props| props.get("onClick"))
                    .and_then(|click| click.get("__callableId"))
                    .and_then(Json::as_str)
                    .map(str::to_owned);
            }
            map.values().find_map(|value| find_callable(value, label))
        }
        Json::Array(items) => items.iter().find_map(|item| find_callable(item, label)),
        _ => None,
    }
}
