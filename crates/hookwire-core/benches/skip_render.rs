use criterion::{criterion_group, criterion_main, Criterion};
use hookwire_core::{Component, Element, Props, Renderer, Value, CHILDREN_KEY};

fn static_list(len: usize) -> Element {
    let row = Component::new("Row", |_, props| {
        Ok(props.get("label").cloned().unwrap_or_default())
    })
    .memo();
    let list = Component::new("List", move |_, props| {
        let len = props.get("len").and_then(Value::as_int).unwrap_or(0);
        let rows = (0..len)
            .map(|index| {
                row.element(Props::new().with("label", format!("row {index}")))
                    .into()
            })
            .collect::<Vec<Value>>();
        Ok(Element::base("column", Props::new().with(CHILDREN_KEY, rows)).into())
    })
    .memo();
    list.element(Props::new().with("len", len))
}

fn skip_render_static_list(c: &mut Criterion) {
    let mut renderer = Renderer::new(|| {});
    let root = static_list(100);
    renderer.render(&root).expect("initial render");

    c.bench_function("skip_render_static_list", |b| {
        b.iter(|| {
            renderer.render(&root).expect("render");
        });
    });
}

fn rerender_static_rows(c: &mut Criterion) {
    let mut renderer = Renderer::new(|| {});
    let mut len = 100;
    renderer.render(&static_list(len)).expect("initial render");

    // Toggling the list length forces the list to re-invoke while every
    // surviving row is skipped.
    c.bench_function("rerender_static_rows", |b| {
        b.iter(|| {
            len = if len == 100 { 99 } else { 100 };
            renderer.render(&static_list(len)).expect("render");
        });
    });
}

criterion_group!(benches, skip_render_static_list, rerender_static_rows);
criterion_main!(benches);
