use hookwire_core::{
    Element, RenderError, RenderStats, RenderedNode, Renderer, RendererOptions, Value,
};
use hookwire_encoder::{EncodeError, EncodedDocument, EncoderConfig, NodeEncoder};
use std::cell::Cell;
use std::fmt;
use std::fmt::Write as _;
use std::rc::Rc;

const MAX_PUMP_PASSES: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum RuleError {
    Render(RenderError),
    Encode(EncodeError),
    /// `pump_until_idle` kept finding new state changes.
    Unsettled { passes: usize },
    UnknownCallable { id: String },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::Render(err) => write!(f, "render failed: {err}"),
            RuleError::Encode(err) => write!(f, "encode failed: {err}"),
            RuleError::Unsettled { passes } => {
                write!(f, "content still changing after {passes} render passes")
            }
            RuleError::UnknownCallable { id } => write!(f, "no callable registered as {id}"),
        }
    }
}

impl std::error::Error for RuleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuleError::Render(err) => Some(err),
            RuleError::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RenderError> for RuleError {
    fn from(err: RenderError) -> Self {
        RuleError::Render(err)
    }
}

impl From<EncodeError> for RuleError {
    fn from(err: EncodeError) -> Self {
        RuleError::Encode(err)
    }
}

/// Headless harness for exercising component trees in tests.
///
/// Owns a renderer and an encoder session. Every render is followed by an
/// encode, so a test can assert on the rendered tree, the wire payload, and
/// the objects and callables each pass introduced.
pub struct RenderTestRule {
    renderer: Renderer,
    encoder: NodeEncoder,
    content: Option<Box<dyn Fn() -> Element>>,
    changes: Rc<Cell<usize>>,
    tree: Option<Rc<RenderedNode>>,
    document: Option<EncodedDocument>,
    passes: usize,
}

impl RenderTestRule {
    pub fn new() -> Self {
        Self::with_options(RendererOptions::default(), EncoderConfig::default())
    }

    pub fn with_options(options: RendererOptions, config: EncoderConfig) -> Self {
        let changes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&changes);
        Self {
            renderer: Renderer::with_options(move || counter.set(counter.get() + 1), options),
            encoder: NodeEncoder::with_config(config),
            content: None,
            changes,
            tree: None,
            document: None,
            passes: 0,
        }
    }

    /// Install content and perform the initial render and encode.
    pub fn set_content(&mut self, content: impl Fn() -> Element + 'static) -> Result<(), RuleError> {
        self.content = Some(Box::new(content));
        self.render()
    }

    /// Render and encode the installed content again, changed or not.
    pub fn rerender(&mut self) -> Result<(), RuleError> {
        self.render()
    }

    /// Render until no state change is pending.
    pub fn pump_until_idle(&mut self) -> Result<(), RuleError> {
        let mut passes = 0;
        while self.renderer.needs_render() {
            passes += 1;
            if passes > MAX_PUMP_PASSES {
                return Err(RuleError::Unsettled {
                    passes: MAX_PUMP_PASSES,
                });
            }
            log::trace!("pump_until_idle: pass {passes}");
            self.render()?;
        }
        Ok(())
    }

    /// Invoke a callable by its wire id, the way a remote client would.
    pub fn invoke(&self, id: &str, args: &[Value]) -> Result<(), RuleError> {
        let callable = self
            .encoder
            .resolve_callable(id)
            .ok_or_else(|| RuleError::UnknownCallable { id: id.to_owned() })?;
        callable.call(args);
        Ok(())
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Number of state changes reported since the rule was created.
    pub fn change_count(&self) -> usize {
        self.changes.get()
    }

    pub fn needs_render(&self) -> bool {
        self.renderer.needs_render()
    }

    /// Successful render passes so far.
    pub fn pass_count(&self) -> usize {
        self.passes
    }

    pub fn last_stats(&self) -> RenderStats {
        self.renderer.last_stats()
    }

    pub fn tree(&self) -> Option<&Rc<RenderedNode>> {
        self.tree.as_ref()
    }

    pub fn document(&self) -> Option<&EncodedDocument> {
        self.document.as_ref()
    }

    /// The last payload, or `Null` before the first render.
    pub fn payload(&self) -> serde_json::Value {
        self.document
            .as_ref()
            .map(|document| document.payload.clone())
            .unwrap_or_default()
    }

    pub fn renderer(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn encoder(&self) -> &NodeEncoder {
        &self.encoder
    }

    /// First node named `name` in depth-first document order.
    pub fn find_node(&self, name: &str) -> Option<Rc<RenderedNode>> {
        self.tree.as_ref().and_then(|tree| find_in_node(tree, name))
    }

    /// Unmount everything; the installed content stays for a later rerender.
    pub fn unmount(&mut self) {
        self.renderer.unmount();
        self.tree = None;
    }

    /// Dump the current node tree as indented text for debugging.
    pub fn dump_tree(&self) -> String {
        let mut out = String::new();
        if let Some(tree) = &self.tree {
            dump_node(&mut out, tree, 0);
        }
        out
    }

    fn render(&mut self) -> Result<(), RuleError> {
        let Some(content) = self.content.as_ref() else {
            return Ok(());
        };
        let element = content();
        let tree = self.renderer.render(&element)?;
        let document = self.encoder.encode(&tree)?;
        self.tree = Some(tree);
        self.document = Some(document);
        self.passes += 1;
        Ok(())
    }
}

impl Default for RenderTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a rule.
pub fn run_test_render<R>(f: impl FnOnce(&mut RenderTestRule) -> R) -> R {
    let mut rule = RenderTestRule::new();
    f(&mut rule)
}

fn find_in_node(node: &Rc<RenderedNode>, name: &str) -> Option<Rc<RenderedNode>> {
    if node.name() == name {
        return Some(Rc::clone(node));
    }
    node.props()?
        .iter()
        .find_map(|(_, value)| find_in_value(value, name))
}

fn find_in_value(value: &Value, name: &str) -> Option<Rc<RenderedNode>> {
    match value {
        Value::Node(node) => find_in_node(node, name),
        Value::List(items) => items.iter().find_map(|item| find_in_value(item, name)),
        Value::Map(props) => props.iter().find_map(|(_, value)| find_in_value(value, name)),
        _ => None,
    }
}

fn dump_node(out: &mut String, node: &RenderedNode, depth: usize) {
    let _ = writeln!(out, "{:indent$}<{}>", "", node.name(), indent = depth * 2);
    let Some(props) = node.props() else {
        return;
    };
    for (name, value) in props.iter() {
        dump_value(out, name, value, depth + 1);
    }
}

fn dump_value(out: &mut String, name: &str, value: &Value, depth: usize) {
    let indent = depth * 2;
    match value {
        Value::Node(node) => {
            let _ = writeln!(out, "{:indent$}{name}:", "");
            dump_node(out, node, depth + 1);
        }
        Value::List(items) if items.iter().any(|item| matches!(item, Value::Node(_))) => {
            let _ = writeln!(out, "{:indent$}{name}:", "");
            for (index, item) in items.iter().enumerate() {
                dump_value(out, &format!("[{index}]"), item, depth + 1);
            }
        }
        other => {
            let _ = writeln!(out, "{:indent$}{name} = {other:?}", "");
        }
    }
}
