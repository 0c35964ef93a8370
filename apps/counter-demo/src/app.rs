use hookwire_core::{
    deps, Component, Element, ExternalObject, Props, RenderError, Value,
};
use std::cell::Cell;
use std::rc::Rc;

/// Stand-in for a live resource the client reads through an object handle.
#[derive(Debug)]
pub struct Ticker {
    pub symbol: &'static str,
    subscribers: Cell<usize>,
}

impl Ticker {
    pub fn new(symbol: &'static str) -> Rc<Self> {
        Rc::new(Self {
            symbol,
            subscribers: Cell::new(0),
        })
    }

    pub fn subscribers(&self) -> usize {
        self.subscribers.get()
    }
}

fn column(children: Vec<Value>) -> Value {
    Element::base_with_children("column", Props::new(), children).into()
}

fn button(label: &str, on_click: Value) -> Value {
    Element::base(
        "button",
        Props::new().with("label", label).with("onClick", on_click),
    )
    .into()
}

fn text(value: impl Into<Value>) -> Value {
    Element::base("text", Props::new().with("value", value)).into()
}

pub fn counter() -> Component {
    Component::new("Counter", |ctx, props| {
        let label = props
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or("count")
            .to_owned();
        let (count, set_count) = ctx.use_state(|| 0i64)?;

        let increment = {
            let set_count = set_count.clone();
            ctx.use_callback(
                move |_| {
                    if let Err(err) = set_count.update(|count| count + 1) {
                        log::warn!("increment dropped: {err}");
                    }
                },
                deps![],
            )?
        };
        let decrement = ctx.use_callback(
            move |_| {
                if let Err(err) = set_count.update(|count| count - 1) {
                    log::warn!("decrement dropped: {err}");
                }
            },
            deps![],
        )?;

        let effect_label = label.clone();
        ctx.use_effect(
            move |scope| {
                log::info!("{effect_label} is now {count}");
                Ok(scope.done())
            },
            Some(deps![count]),
        )?;

        Ok(column(vec![
            text(format!("{label}: {count}")),
            button("+", increment.into()),
            button("-", decrement.into()),
        ]))
    })
    .memo()
}

pub fn ticker_panel() -> Component {
    Component::new("TickerPanel", |ctx, props| {
        let ticker = props
            .get("ticker")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| RenderError::component("TickerPanel", "missing ticker prop"))?;

        let subscription = ticker.clone();
        ctx.use_effect(
            move |scope| {
                let Some(live) = subscription.downcast_ref::<Ticker>() else {
                    return Err(RenderError::effect("ticker prop is not a Ticker"));
                };
                live.subscribers.set(live.subscribers.get() + 1);
                log::info!("subscribed to {}", live.symbol);
                Ok(scope.on_cleanup(move || {
                    if let Some(live) = subscription.downcast_ref::<Ticker>() {
                        live.subscribers.set(live.subscribers.get() - 1);
                        log::info!("unsubscribed from {}", live.symbol);
                    }
                }))
            },
            Some(deps![ticker.clone()]),
        )?;

        Ok(Element::base("chart", Props::new().with("source", ticker)).into())
    })
}

pub fn toggle() -> Component {
    Component::new("Toggle", |ctx, props| {
        let (open, set_open) = ctx.use_state(|| false)?;
        let on_click = ctx.use_callback(
            move |_| {
                if let Err(err) = set_open.update(|open| !open) {
                    log::warn!("toggle dropped: {err}");
                }
            },
            deps![],
        )?;
        let panel = if open {
            let ticker = props.get("ticker").cloned().unwrap_or_default();
            ticker_panel()
                .element(Props::new().with("ticker", ticker))
                .into()
        } else {
            Value::Null
        };
        Ok(Value::List(vec![
            button(if open { "hide" } else { "show" }, on_click.into()),
            panel,
        ]))
    })
}

/// Root of the demo tree.
pub fn app(ticker: ExternalObject) -> Element {
    let counter = counter();
    let toggle = toggle();
    let root = Component::new("App", move |_, _| {
        Ok(column(vec![
            counter.element(Props::new().with("label", "clicks")).into(),
            toggle
                .element(Props::new().with("ticker", ticker.clone()))
                .into(),
        ]))
    });
    root.element(Props::new())
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod app_tests;
