//! Tree walk, memoized re-invocation and effect commit.
//!
//! A render pass walks the element tree top-down, opening one
//! [`RenderContext`] per position. Nothing observable happens until the whole
//! tree rendered: then removed subtrees are unmounted, and effects commit in
//! post-order (children before parents, siblings in document order).

use crate::context::{ContextKey, ElementType, MemoEntry, PendingEffect, RenderContext};
use crate::element::{Component, Element, ElementKind};
use crate::error::RenderError;
use crate::value::{Props, Value, CHILDREN_KEY};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Output of rendering one element. Immutable once produced.
pub struct RenderedNode {
    name: Rc<str>,
    props: Option<Props>,
}

impl RenderedNode {
    pub fn new(name: impl Into<Rc<str>>, props: Option<Props>) -> Self {
        Self {
            name: name.into(),
            props,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn props(&self) -> Option<&Props> {
        self.props.as_ref()
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.as_ref().and_then(|props| props.get(key))
    }

    pub fn children(&self) -> Option<&Value> {
        self.prop(CHILDREN_KEY)
    }

    /// Rendered children as a slice: a list stays a list, a single child is a
    /// one-element slice, absent children are empty.
    pub fn child_list(&self) -> &[Value] {
        match self.children() {
            Some(Value::List(items)) => items,
            Some(single) => std::slice::from_ref(single),
            None => &[],
        }
    }
}

impl fmt::Debug for RenderedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("RenderedNode");
        debug.field("name", &self.name);
        if let Some(props) = &self.props {
            debug.field("props", props);
        }
        debug.finish()
    }
}

#[derive(Clone, Debug)]
pub struct RendererOptions {
    /// When false every component is re-invoked regardless of its memo policy.
    pub memo_enabled: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self { memo_enabled: true }
    }
}

impl RendererOptions {
    pub fn with_memo(mut self, enabled: bool) -> Self {
        self.memo_enabled = enabled;
        self
    }
}

/// Counters from the last successful pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub invoked: usize,
    pub skipped: usize,
    pub unmounted: usize,
    pub effects: usize,
}

struct FinishedContext {
    context: RenderContext,
    version: u64,
    memo: Option<Rc<MemoEntry>>,
    effects: Vec<PendingEffect>,
}

#[derive(Default)]
struct RenderPass {
    stale: Vec<(RenderContext, Vec<ContextKey>)>,
    replaced: Vec<(RenderContext, ContextKey, RenderContext)>,
    finished: Vec<FinishedContext>,
    invoked: usize,
    skipped: usize,
}

impl RenderPass {
    fn finish(
        &mut self,
        context: &RenderContext,
        version: u64,
        memo: Option<Rc<MemoEntry>>,
        effects: Vec<PendingEffect>,
    ) {
        self.finished.push(FinishedContext {
            context: context.clone(),
            version,
            memo,
            effects,
        });
    }

    /// Undo structural changes of a pass that failed before commit.
    fn rollback(self) {
        for (parent, key, previous) in self.replaced.into_iter().rev() {
            parent.restore_child(key, previous);
        }
    }

    fn commit(self) -> Result<RenderStats, RenderError> {
        let mut stats = RenderStats {
            invoked: self.invoked,
            skipped: self.skipped,
            ..RenderStats::default()
        };
        for (_, _, previous) in self.replaced {
            previous.unmount();
            stats.unmounted += 1;
        }
        for (parent, keys) in self.stale {
            for child in parent.detach_children(&keys) {
                child.unmount();
                stats.unmounted += 1;
            }
        }
        for finished in self.finished {
            let FinishedContext {
                context,
                version,
                memo,
                effects,
            } = finished;
            if let Some(entry) = memo {
                context.set_memo_entry(entry);
            }
            context.mark_clean(version);
            context.refresh_descendant_dirty();
            for effect in effects {
                context.commit_effect(effect)?;
                stats.effects += 1;
            }
        }
        Ok(stats)
    }
}

/// Renders element trees against a persistent tree of [`RenderContext`]s.
pub struct Renderer {
    root: RenderContext,
    options: RendererOptions,
    needs_render: Rc<Cell<bool>>,
    pass: u64,
    last_stats: RenderStats,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("pass", &self.pass)
            .field("options", &self.options)
            .field("needs_render", &self.needs_render.get())
            .finish()
    }
}

impl Renderer {
    /// `on_change` fires whenever any component's state is set; the host
    /// decides when to render again.
    pub fn new(on_change: impl Fn() + 'static) -> Self {
        Self::with_options(on_change, RendererOptions::default())
    }

    pub fn with_options(on_change: impl Fn() + 'static, options: RendererOptions) -> Self {
        let needs_render = Rc::new(Cell::new(false));
        let flag = Rc::clone(&needs_render);
        let root = RenderContext::new(move || {
            flag.set(true);
            on_change();
        });
        Self {
            root,
            options,
            needs_render,
            pass: 0,
            last_stats: RenderStats::default(),
        }
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    /// Context that owns the root element's context at `ContextKey::Index(0)`.
    pub fn root_context(&self) -> &RenderContext {
        &self.root
    }

    /// True when state changed since the last successful render.
    pub fn needs_render(&self) -> bool {
        self.needs_render.get()
    }

    pub fn last_stats(&self) -> RenderStats {
        self.last_stats
    }

    /// Render `element` and commit the pass.
    ///
    /// Any error raised while building the tree leaves contexts uncommitted:
    /// no subtree is unmounted and no effect runs. An error raised by an
    /// effect stops the commit; effects that already ran are not undone.
    pub fn render(&mut self, element: &Element) -> Result<Rc<RenderedNode>, RenderError> {
        self.pass += 1;
        self.needs_render.set(false);
        log::debug!("render pass {} for <{}>", self.pass, element.name());

        let mut pass = RenderPass::default();
        let node = match self.render_root(&mut pass, element) {
            Ok(node) => node,
            Err(err) => {
                log::debug!("render pass {} aborted: {err}", self.pass);
                pass.rollback();
                self.needs_render.set(true);
                return Err(err);
            }
        };
        let stats = pass.commit()?;
        log::debug!(
            "render pass {} committed: {} invoked, {} skipped, {} unmounted, {} effects",
            self.pass,
            stats.invoked,
            stats.skipped,
            stats.unmounted,
            stats.effects
        );
        self.last_stats = stats;
        Ok(node)
    }

    /// Unmount the whole tree. The renderer can render again afterwards,
    /// starting from fresh state.
    pub fn unmount(&mut self) {
        let keys = self.root.child_keys();
        for child in self.root.detach_children(&keys) {
            child.unmount();
        }
        self.needs_render.set(false);
    }

    fn render_root(
        &self,
        pass: &mut RenderPass,
        element: &Element,
    ) -> Result<Rc<RenderedNode>, RenderError> {
        let version = self.root.state_version();
        self.root.begin_children()?;
        let result = self.render_element(pass, &self.root, ContextKey::Index(0), element);
        let stale = self.root.end_children();
        let node = result?;
        if !stale.is_empty() {
            pass.stale.push((self.root.clone(), stale));
        }
        pass.finish(&self.root, version, None, Vec::new());
        Ok(node)
    }

    fn render_element(
        &self,
        pass: &mut RenderPass,
        parent: &RenderContext,
        key: ContextKey,
        element: &Element,
    ) -> Result<Rc<RenderedNode>, RenderError> {
        let element_type = ElementType::of(element);
        let mut context = parent.child_context(key.clone())?;
        match context.element_type() {
            Some(previous) if previous != element_type => {
                log::trace!("{key} changed from {previous:?} to {element_type:?}; remounting");
                if let Some((previous, fresh)) = parent.replace_child(&key) {
                    pass.replaced.push((parent.clone(), key, previous));
                    context = fresh;
                }
            }
            _ => {}
        }
        context.set_element_type(element_type);

        match element.kind() {
            ElementKind::Function(component) => {
                self.render_component(pass, &context, component, element.props())
            }
            ElementKind::Base(name) => self.render_base(pass, &context, name, element.props()),
        }
    }

    fn render_component(
        &self,
        pass: &mut RenderPass,
        context: &RenderContext,
        component: &Component,
        props: &Props,
    ) -> Result<Rc<RenderedNode>, RenderError> {
        let memo = component.memo_policy();
        if self.options.memo_enabled && memo.is_enabled() && !context.is_dirty() {
            if let Some(entry) = context.memo_entry() {
                if memo.props_equal(&entry.props, props) {
                    if !context.has_dirty_descendant() {
                        log::trace!("skip <{}>", component.name());
                        pass.skipped += 1;
                        return Ok(Rc::clone(&entry.node));
                    }
                    log::trace!("reuse output of <{}> for dirty descendants", component.name());
                    pass.skipped += 1;
                    let version = context.state_version();
                    let children = self.render_scoped(pass, context, |renderer, pass| {
                        renderer.render_children(pass, context, &entry.output)
                    })?;
                    let node = Rc::new(component_node(component, children));
                    let refreshed = Rc::new(MemoEntry {
                        props: entry.props.clone(),
                        output: entry.output.clone(),
                        node: Rc::clone(&node),
                    });
                    pass.finish(context, version, Some(refreshed), Vec::new());
                    return Ok(node);
                }
            }
        }

        log::trace!("invoke <{}>", component.name());
        pass.invoked += 1;
        let version = context.begin_hooks()?;
        let output = component
            .invoke(context, props)
            .and_then(|output| context.end_hooks().map(|()| output));
        let output = match output {
            Ok(output) => output,
            Err(err) => {
                context.abort_render();
                return Err(err);
            }
        };
        let effects = context.take_pending_effects();
        let children = self.render_scoped(pass, context, |renderer, pass| {
            renderer.render_children(pass, context, &output)
        })?;
        let node = Rc::new(component_node(component, children));
        let entry = memo.is_enabled().then(|| {
            Rc::new(MemoEntry {
                props: props.clone(),
                output,
                node: Rc::clone(&node),
            })
        });
        pass.finish(context, version, entry, effects);
        Ok(node)
    }

    fn render_base(
        &self,
        pass: &mut RenderPass,
        context: &RenderContext,
        name: &Rc<str>,
        props: &Props,
    ) -> Result<Rc<RenderedNode>, RenderError> {
        let version = context.state_version();
        let rendered = self.render_scoped(pass, context, |renderer, pass| {
            renderer.render_props(pass, context, props)
        })?;
        pass.finish(context, version, None, Vec::new());
        let props = (!rendered.is_empty()).then_some(rendered);
        Ok(Rc::new(RenderedNode::new(Rc::clone(name), props)))
    }

    /// Render inside `context`'s child-collection window and remember the
    /// children it no longer has; they are unmounted at commit.
    fn render_scoped<R>(
        &self,
        pass: &mut RenderPass,
        context: &RenderContext,
        f: impl FnOnce(&Self, &mut RenderPass) -> Result<R, RenderError>,
    ) -> Result<R, RenderError> {
        context.begin_children()?;
        let result = f(self, pass);
        let stale = context.end_children();
        let value = result?;
        if !stale.is_empty() {
            pass.stale.push((context.clone(), stale));
        }
        Ok(value)
    }

    /// Component output: a list is flattened one level and keyed by position
    /// (or explicit key); anything else sits at position 0.
    fn render_children(
        &self,
        pass: &mut RenderPass,
        context: &RenderContext,
        output: &Value,
    ) -> Result<Value, RenderError> {
        match output {
            Value::List(items) => self.render_sequence(pass, context, items, true),
            other => self.render_item(pass, context, ContextKey::Index(0), other),
        }
    }

    fn render_sequence(
        &self,
        pass: &mut RenderPass,
        context: &RenderContext,
        items: &[Value],
        flatten: bool,
    ) -> Result<Value, RenderError> {
        let items: Vec<&Value> = if flatten {
            flatten_one_level(items)
        } else {
            items.iter().collect()
        };
        let mut rendered = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let key = match item {
                Value::Element(element) => element
                    .key()
                    .map_or(ContextKey::Index(index), ContextKey::Keyed),
                _ => ContextKey::Index(index),
            };
            rendered.push(self.render_item(pass, context, key, item)?);
        }
        Ok(Value::List(rendered))
    }

    fn render_props(
        &self,
        pass: &mut RenderPass,
        context: &RenderContext,
        props: &Props,
    ) -> Result<Props, RenderError> {
        let mut rendered = Props::new();
        for (name, value) in props.iter() {
            let value = self.render_item(pass, context, ContextKey::Named(Rc::from(name)), value)?;
            rendered.insert(name, value);
        }
        Ok(rendered)
    }

    fn render_item(
        &self,
        pass: &mut RenderPass,
        parent: &RenderContext,
        key: ContextKey,
        value: &Value,
    ) -> Result<Value, RenderError> {
        match value {
            Value::Element(element) => Ok(Value::Node(
                self.render_element(pass, parent, key, element)?,
            )),
            Value::List(items) if !contains_elements(items) => {
                if is_children_key(&key) {
                    Ok(Value::List(
                        flatten_one_level(items).into_iter().cloned().collect(),
                    ))
                } else {
                    Ok(value.clone())
                }
            }
            Value::List(items) => {
                let flatten = is_children_key(&key);
                let fragment = self.fragment(pass, parent, key)?;
                let version = fragment.state_version();
                let rendered = self.render_scoped(pass, &fragment, |renderer, pass| {
                    renderer.render_sequence(pass, &fragment, items, flatten)
                })?;
                pass.finish(&fragment, version, None, Vec::new());
                Ok(rendered)
            }
            Value::Map(props) if props.iter().any(|(_, value)| holds_elements(value)) => {
                let fragment = self.fragment(pass, parent, key)?;
                let version = fragment.state_version();
                let rendered = self.render_scoped(pass, &fragment, |renderer, pass| {
                    renderer.render_props(pass, &fragment, props)
                })?;
                pass.finish(&fragment, version, None, Vec::new());
                Ok(Value::Map(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    /// Hook-less context that namespaces the positions of a nested list or map.
    fn fragment(
        &self,
        pass: &mut RenderPass,
        parent: &RenderContext,
        key: ContextKey,
    ) -> Result<RenderContext, RenderError> {
        let mut context = parent.child_context(key.clone())?;
        match context.element_type() {
            Some(ElementType::Fragment) | None => {}
            Some(_) => {
                if let Some((previous, fresh)) = parent.replace_child(&key) {
                    pass.replaced.push((parent.clone(), key, previous));
                    context = fresh;
                }
            }
        }
        context.set_element_type(ElementType::Fragment);
        Ok(context)
    }
}

fn component_node(component: &Component, children: Value) -> RenderedNode {
    RenderedNode::new(
        component.name(),
        Some(Props::new().with(CHILDREN_KEY, children)),
    )
}

/// Splice directly nested lists into their parent, in document order.
/// `Null` entries keep their position.
fn flatten_one_level(items: &[Value]) -> Vec<&Value> {
    let mut flattened = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::List(nested) => flattened.extend(nested.iter()),
            other => flattened.push(other),
        }
    }
    flattened
}

fn is_children_key(key: &ContextKey) -> bool {
    matches!(key, ContextKey::Named(name) if &**name == CHILDREN_KEY)
}

fn holds_elements(value: &Value) -> bool {
    match value {
        Value::Element(_) => true,
        Value::List(items) => contains_elements(items),
        Value::Map(props) => props.iter().any(|(_, value)| holds_elements(value)),
        _ => false,
    }
}

fn contains_elements(items: &[Value]) -> bool {
    items.iter().any(holds_elements)
}
