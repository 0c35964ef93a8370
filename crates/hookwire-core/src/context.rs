//! Per-instance render context: hook slots plus a keyed tree of child contexts.
//!
//! A context is reused at the same tree position across render passes, which
//! is what keeps hook state alive between renders. Hook calls are strictly
//! positional: the `n`-th hook of a render always maps to slot `n`, and a
//! render that calls a different number of hooks than the previous one fails.

use crate::collections::map::HashSet;
use crate::collections::IndexMap;
use crate::element::{Element, ElementKind};
use crate::error::RenderError;
use crate::hooks::{EffectResult, EffectScope};
use crate::renderer::RenderedNode;
use crate::value::{Props, Value};
use crate::Key;
use smallvec::SmallVec;
use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Position of a child context among its siblings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// Index among siblings after normalization.
    Index(usize),
    /// Explicit element key, hashed.
    Keyed(Key),
    /// Prop name of a map entry.
    Named(Rc<str>),
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKey::Index(index) => write!(f, "#{index}"),
            ContextKey::Keyed(key) => write!(f, "key:{key:016x}"),
            ContextKey::Named(name) => write!(f, ".{name}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HookKind {
    State,
    Ref,
    Memo,
    Effect,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::State => "state",
            HookKind::Ref => "ref",
            HookKind::Memo => "memo",
            HookKind::Effect => "effect",
        };
        f.write_str(name)
    }
}

pub(crate) type DepList = SmallVec<[Value; 4]>;
pub(crate) type Cleanup = Box<dyn FnOnce()>;
pub(crate) type EffectFn = Box<dyn FnOnce(EffectScope) -> Result<EffectResult, RenderError>>;

/// Validate and unpack a dependency argument. Only lists are accepted.
pub(crate) fn dep_list(deps: Value) -> Result<DepList, RenderError> {
    match deps {
        Value::List(items) => Ok(items.into_iter().collect()),
        other => Err(RenderError::InvalidDeps { found: other.kind() }),
    }
}

pub(crate) struct StateCell {
    pub(crate) value: Option<Rc<dyn Any>>,
}

pub(crate) struct MemoCell {
    pub(crate) value: Rc<dyn Any>,
    pub(crate) deps: DepList,
}

#[derive(Default)]
pub(crate) struct EffectCell {
    /// Dependencies of the last committed run; `None` until the first commit
    /// or when the last run was declared without dependencies.
    pub(crate) deps: Option<DepList>,
    pub(crate) committed: bool,
    pub(crate) cleanup: Option<Cleanup>,
}

impl EffectCell {
    pub(crate) fn should_run(&self, next: Option<&DepList>) -> Result<bool, RenderError> {
        if !self.committed {
            return Ok(true);
        }
        match (self.deps.as_ref(), next) {
            (Some(previous), Some(next)) => {
                if previous.len() != next.len() {
                    return Err(RenderError::DepsLengthChanged {
                        previous: previous.len(),
                        next: next.len(),
                    });
                }
                Ok(previous != next)
            }
            _ => Ok(true),
        }
    }
}

pub(crate) enum HookSlot {
    State(StateCell),
    Ref(Rc<dyn Any>),
    Memo(MemoCell),
    Effect(EffectCell),
}

impl HookSlot {
    pub(crate) fn kind(&self) -> HookKind {
        match self {
            HookSlot::State(_) => HookKind::State,
            HookSlot::Ref(_) => HookKind::Ref,
            HookSlot::Memo(_) => HookKind::Memo,
            HookSlot::Effect(_) => HookKind::Effect,
        }
    }
}

pub(crate) fn kind_mismatch(index: usize, expected: HookKind, found: &HookSlot) -> RenderError {
    RenderError::HookKindMismatch {
        index,
        expected,
        found: found.kind(),
    }
}

pub(crate) struct PendingEffect {
    pub(crate) index: usize,
    pub(crate) deps: Option<DepList>,
    pub(crate) run: EffectFn,
}

/// What the last invocation of a memoizable component produced.
pub(crate) struct MemoEntry {
    pub(crate) props: Props,
    pub(crate) output: Value,
    pub(crate) node: Rc<RenderedNode>,
}

/// Identity of whatever rendered into a context last; a change remounts it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ElementType {
    Function { name: Rc<str>, func: TypeId },
    Base(Rc<str>),
    Fragment,
}

impl ElementType {
    pub(crate) fn of(element: &Element) -> Self {
        match element.kind() {
            ElementKind::Function(component) => ElementType::Function {
                name: Rc::from(component.name()),
                func: component.func_type(),
            },
            ElementKind::Base(name) => ElementType::Base(Rc::clone(name)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Lifecycle {
    Active,
    Unmounted,
}

pub(crate) struct ContextInner {
    slots: RefCell<Vec<Option<HookSlot>>>,
    cursor: Cell<usize>,
    hooks_open: Cell<bool>,
    hook_count: Cell<Option<usize>>,
    children: RefCell<IndexMap<ContextKey, RenderContext>>,
    visited: RefCell<HashSet<ContextKey>>,
    collecting: Cell<bool>,
    lifecycle: Cell<Lifecycle>,
    dirty: Cell<bool>,
    descendant_dirty: Cell<bool>,
    state_version: Cell<u64>,
    on_change: Rc<dyn Fn()>,
    parent: Weak<ContextInner>,
    pending_effects: RefCell<Vec<PendingEffect>>,
    memo: RefCell<Option<Rc<MemoEntry>>>,
    element_type: RefCell<Option<ElementType>>,
}

/// Shared handle to a component instance's hook state and child contexts.
#[derive(Clone)]
pub struct RenderContext {
    inner: Rc<ContextInner>,
}

impl PartialEq for RenderContext {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for RenderContext {}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("hooks", &self.inner.slots.borrow().len())
            .field("children", &self.inner.children.borrow().len())
            .field("dirty", &self.inner.dirty.get())
            .field("unmounted", &self.is_unmounted())
            .finish()
    }
}

impl RenderContext {
    /// Create a root context. `on_change` fires whenever state in this context
    /// or any descendant is set after initialization.
    pub fn new(on_change: impl Fn() + 'static) -> Self {
        Self::with_parent(Rc::new(on_change), Weak::new())
    }

    fn with_parent(on_change: Rc<dyn Fn()>, parent: Weak<ContextInner>) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                slots: RefCell::new(Vec::new()),
                cursor: Cell::new(0),
                hooks_open: Cell::new(false),
                hook_count: Cell::new(None),
                children: RefCell::new(IndexMap::default()),
                visited: RefCell::new(HashSet::default()),
                collecting: Cell::new(false),
                lifecycle: Cell::new(Lifecycle::Active),
                dirty: Cell::new(false),
                descendant_dirty: Cell::new(false),
                state_version: Cell::new(0),
                on_change,
                parent,
                pending_effects: RefCell::new(Vec::new()),
                memo: RefCell::new(None),
                element_type: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ContextInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<ContextInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn is_unmounted(&self) -> bool {
        self.inner.lifecycle.get() == Lifecycle::Unmounted
    }

    /// True once state was set since the last committed render of this instance.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn has_dirty_descendant(&self) -> bool {
        self.inner.descendant_dirty.get()
    }

    /// Number of hooks the previous completed render called, if any.
    pub fn hook_count(&self) -> Option<usize> {
        self.inner.hook_count.get()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn child_keys(&self) -> Vec<ContextKey> {
        self.inner.children.borrow().keys().cloned().collect()
    }

    /// Existing child at `key`, without creating one or marking it visited.
    pub fn child(&self, key: &ContextKey) -> Option<RenderContext> {
        self.inner.children.borrow().get(key).cloned()
    }

    fn ensure_active(&self) -> Result<(), RenderError> {
        if self.is_unmounted() {
            Err(RenderError::Unmounted)
        } else {
            Ok(())
        }
    }

    // ── render scope ────────────────────────────────────────────────────────

    /// Run `f` inside a render scope of this context.
    ///
    /// Hooks called through the context inside `f` consume its slots in order.
    /// On close the hook count is validated against the previous render and
    /// child contexts that `f` did not visit are unmounted. Effects queued by
    /// `f` stay pending until [`RenderContext::commit_pending_effects`]; the
    /// [`Renderer`](crate::Renderer) drives that itself.
    pub fn render_scope<R>(
        &self,
        f: impl FnOnce(&RenderContext) -> Result<R, RenderError>,
    ) -> Result<R, RenderError> {
        let version = self.begin_hooks()?;
        if let Err(err) = self.begin_children() {
            self.abort_render();
            return Err(err);
        }
        let result = f(self).and_then(|value| self.end_hooks().map(|()| value));
        let stale = self.end_children();
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                self.abort_render();
                return Err(err);
            }
        };
        for child in self.detach_children(&stale) {
            child.unmount();
        }
        self.mark_clean(version);
        self.refresh_descendant_dirty();
        Ok(value)
    }

    /// Open the hook cursor. Returns the state version observed at open.
    pub(crate) fn begin_hooks(&self) -> Result<u64, RenderError> {
        self.ensure_active()?;
        if self.inner.hooks_open.get() || self.inner.collecting.get() {
            return Err(RenderError::AlreadyRendering);
        }
        self.inner.hooks_open.set(true);
        self.inner.cursor.set(0);
        self.inner.pending_effects.borrow_mut().clear();
        Ok(self.inner.state_version.get())
    }

    /// Close the hook cursor and check arity against the previous render.
    pub(crate) fn end_hooks(&self) -> Result<(), RenderError> {
        self.inner.hooks_open.set(false);
        let actual = self.inner.cursor.get();
        match self.inner.hook_count.get() {
            None => {
                self.inner.hook_count.set(Some(actual));
                Ok(())
            }
            Some(expected) if expected == actual => Ok(()),
            Some(expected) => Err(RenderError::HookCountMismatch { expected, actual }),
        }
    }

    /// Reset scope flags after a failed render and drop queued effects.
    pub(crate) fn abort_render(&self) {
        self.inner.hooks_open.set(false);
        self.inner.collecting.set(false);
        self.inner.pending_effects.borrow_mut().clear();
    }

    /// Start recording which children this pass visits.
    pub(crate) fn begin_children(&self) -> Result<(), RenderError> {
        self.ensure_active()?;
        if self.inner.collecting.get() {
            return Err(RenderError::AlreadyRendering);
        }
        self.inner.collecting.set(true);
        self.inner.visited.borrow_mut().clear();
        Ok(())
    }

    /// Stop recording and return the keys of children that were not visited.
    pub(crate) fn end_children(&self) -> Vec<ContextKey> {
        self.inner.collecting.set(false);
        let visited = self.inner.visited.borrow();
        self.inner
            .children
            .borrow()
            .keys()
            .filter(|key| !visited.contains(*key))
            .cloned()
            .collect()
    }

    /// Remove the given children from this context without unmounting them.
    pub(crate) fn detach_children(&self, keys: &[ContextKey]) -> Vec<RenderContext> {
        let mut children = self.inner.children.borrow_mut();
        keys.iter()
            .filter_map(|key| children.shift_remove(key))
            .collect()
    }

    /// Swap in a fresh context at `key`, returning the one it replaces.
    pub(crate) fn replace_child(&self, key: &ContextKey) -> Option<(RenderContext, RenderContext)> {
        let fresh = Self::with_parent(Rc::clone(&self.inner.on_change), self.downgrade());
        let mut children = self.inner.children.borrow_mut();
        let slot = children.get_mut(key)?;
        let previous = std::mem::replace(slot, fresh.clone());
        Some((previous, fresh))
    }

    /// Put a previously replaced context back at `key`.
    pub(crate) fn restore_child(&self, key: ContextKey, context: RenderContext) {
        self.inner.children.borrow_mut().insert(key, context);
    }

    /// Return the child context at `key`, creating it on first use.
    ///
    /// While children are being collected for a render pass the key is marked
    /// visited; visiting the same key twice in one pass is an error.
    pub fn child_context(&self, key: ContextKey) -> Result<RenderContext, RenderError> {
        self.ensure_active()?;
        if self.inner.collecting.get() && !self.inner.visited.borrow_mut().insert(key.clone()) {
            return Err(RenderError::DuplicateKey {
                key: key.to_string(),
            });
        }
        let mut children = self.inner.children.borrow_mut();
        let child = children
            .entry(key)
            .or_insert_with(|| {
                Self::with_parent(Rc::clone(&self.inner.on_change), self.downgrade())
            })
            .clone();
        Ok(child)
    }

    pub(crate) fn element_type(&self) -> Option<ElementType> {
        self.inner.element_type.borrow().clone()
    }

    pub(crate) fn set_element_type(&self, element_type: ElementType) {
        *self.inner.element_type.borrow_mut() = Some(element_type);
    }

    // ── dirty tracking ──────────────────────────────────────────────────────

    pub(crate) fn state_version(&self) -> u64 {
        self.inner.state_version.get()
    }

    /// Clear the dirty flag unless state was set after `version` was observed.
    pub(crate) fn mark_clean(&self, version: u64) {
        if self.inner.state_version.get() == version {
            self.inner.dirty.set(false);
        }
    }

    /// Recompute the dirty-descendant flag from the current children.
    pub(crate) fn refresh_descendant_dirty(&self) {
        let any = self
            .inner
            .children
            .borrow()
            .values()
            .any(|child| child.is_dirty() || child.has_dirty_descendant());
        self.inner.descendant_dirty.set(any);
    }

    fn mark_dirty(&self) {
        self.inner.dirty.set(true);
        self.inner
            .state_version
            .set(self.inner.state_version.get().wrapping_add(1));
        let mut parent = self.inner.parent.upgrade();
        while let Some(inner) = parent {
            if inner.descendant_dirty.replace(true) {
                break;
            }
            parent = inner.parent.upgrade();
        }
    }

    // ── hook slots ──────────────────────────────────────────────────────────

    /// Claim the next hook slot index for this render.
    pub fn next_hook_index(&self) -> Result<usize, RenderError> {
        self.ensure_active()?;
        if !self.inner.hooks_open.get() {
            return Err(RenderError::NoActiveRender);
        }
        let index = self.inner.cursor.get();
        if let Some(expected) = self.inner.hook_count.get() {
            if index >= expected {
                return Err(RenderError::HookCountMismatch {
                    expected,
                    actual: index + 1,
                });
            }
        }
        self.inner.cursor.set(index + 1);
        Ok(index)
    }

    /// Run `f` with mutable access to slot `index`, growing the table if needed.
    pub(crate) fn with_slot<R>(&self, index: usize, f: impl FnOnce(&mut Option<HookSlot>) -> R) -> R {
        let mut slots = self.inner.slots.borrow_mut();
        if slots.len() <= index {
            slots.resize_with(index + 1, || None);
        }
        f(&mut slots[index])
    }

    /// Whether slot `index` holds an initialized state value.
    pub fn has_state(&self, index: usize) -> Result<bool, RenderError> {
        self.ensure_active()?;
        let slots = self.inner.slots.borrow();
        match slots.get(index).and_then(Option::as_ref) {
            None => Ok(false),
            Some(HookSlot::State(cell)) => Ok(cell.value.is_some()),
            Some(other) => Err(kind_mismatch(index, HookKind::State, other)),
        }
    }

    /// Initialize state slot `index`. Does not fire `on_change`.
    pub fn init_state<T: 'static>(&self, index: usize, value: T) -> Result<(), RenderError> {
        self.ensure_active()?;
        self.with_slot(index, |slot| match slot {
            None => {
                *slot = Some(HookSlot::State(StateCell {
                    value: Some(Rc::new(value)),
                }));
                Ok(())
            }
            Some(HookSlot::State(cell)) if cell.value.is_none() => {
                cell.value = Some(Rc::new(value));
                Ok(())
            }
            Some(HookSlot::State(_)) => Err(RenderError::StateAlreadyInitialized { index }),
            Some(other) => Err(kind_mismatch(index, HookKind::State, other)),
        })
    }

    /// Read state slot `index`.
    pub fn get_state<T: Clone + 'static>(&self, index: usize) -> Result<T, RenderError> {
        self.ensure_active()?;
        let slots = self.inner.slots.borrow();
        match slots.get(index).and_then(Option::as_ref) {
            None => Err(RenderError::StateUninitialized { index }),
            Some(HookSlot::State(cell)) => {
                let value = cell
                    .value
                    .as_ref()
                    .ok_or(RenderError::StateUninitialized { index })?;
                value
                    .downcast_ref::<T>()
                    .cloned()
                    .ok_or(RenderError::StateTypeMismatch {
                        index,
                        expected: std::any::type_name::<T>(),
                    })
            }
            Some(other) => Err(kind_mismatch(index, HookKind::State, other)),
        }
    }

    /// Replace state slot `index`, mark the context dirty and fire `on_change`
    /// once. There is no equality short-circuit.
    pub fn set_state<T: 'static>(&self, index: usize, value: T) -> Result<(), RenderError> {
        self.ensure_active()?;
        {
            let mut slots = self.inner.slots.borrow_mut();
            match slots.get_mut(index).and_then(Option::as_mut) {
                None => return Err(RenderError::StateUninitialized { index }),
                Some(HookSlot::State(cell)) => match cell.value.as_ref() {
                    None => return Err(RenderError::StateUninitialized { index }),
                    Some(current) if !current.is::<T>() => {
                        return Err(RenderError::StateTypeMismatch {
                            index,
                            expected: std::any::type_name::<T>(),
                        })
                    }
                    Some(_) => cell.value = Some(Rc::new(value)),
                },
                Some(other) => return Err(kind_mismatch(index, HookKind::State, other)),
            }
        }
        self.mark_dirty();
        (self.inner.on_change)();
        Ok(())
    }

    // ── effects ─────────────────────────────────────────────────────────────

    pub(crate) fn queue_effect(&self, effect: PendingEffect) {
        self.inner.pending_effects.borrow_mut().push(effect);
    }

    pub(crate) fn take_pending_effects(&self) -> Vec<PendingEffect> {
        std::mem::take(&mut *self.inner.pending_effects.borrow_mut())
    }

    /// Run effects queued by the last [`RenderContext::render_scope`] in hook order.
    pub fn commit_pending_effects(&self) -> Result<(), RenderError> {
        for effect in self.take_pending_effects() {
            self.commit_effect(effect)?;
        }
        Ok(())
    }

    /// Run the previous cleanup of the effect's slot, then the effect itself,
    /// and record its cleanup and dependencies.
    pub(crate) fn commit_effect(&self, effect: PendingEffect) -> Result<(), RenderError> {
        if self.is_unmounted() {
            return Ok(());
        }
        let PendingEffect { index, deps, run } = effect;
        let previous = self.with_slot(index, |slot| match slot {
            Some(HookSlot::Effect(cell)) => Ok(cell.cleanup.take()),
            Some(other) => Err(kind_mismatch(index, HookKind::Effect, other)),
            None => Ok(None),
        })?;
        if let Some(cleanup) = previous {
            cleanup();
        }
        let result = run(EffectScope::new())?;
        let cleanup = result.into_cleanup();
        if self.is_unmounted() {
            if let Some(cleanup) = cleanup {
                cleanup();
            }
            return Ok(());
        }
        self.with_slot(index, |slot| {
            if let Some(HookSlot::Effect(cell)) = slot {
                cell.cleanup = cleanup;
                cell.deps = deps;
                cell.committed = true;
            }
        });
        Ok(())
    }

    // ── memoization ─────────────────────────────────────────────────────────

    pub(crate) fn memo_entry(&self) -> Option<Rc<MemoEntry>> {
        self.inner.memo.borrow().clone()
    }

    pub(crate) fn set_memo_entry(&self, entry: Rc<MemoEntry>) {
        *self.inner.memo.borrow_mut() = Some(entry);
    }

    // ── teardown ────────────────────────────────────────────────────────────

    /// Unmount children depth-first, then run this context's effect cleanups
    /// in hook order. Each cleanup runs exactly once; afterwards the context
    /// rejects every operation with [`RenderError::Unmounted`].
    pub fn unmount(&self) {
        if self.is_unmounted() {
            return;
        }
        let children: Vec<RenderContext> = {
            let mut children = self.inner.children.borrow_mut();
            children.drain(..).map(|(_, child)| child).collect()
        };
        for child in children {
            child.unmount();
        }
        self.inner.lifecycle.set(Lifecycle::Unmounted);
        self.inner.hooks_open.set(false);
        self.inner.collecting.set(false);
        self.inner.pending_effects.borrow_mut().clear();
        self.inner.memo.borrow_mut().take();
        let slots = std::mem::take(&mut *self.inner.slots.borrow_mut());
        let cleanups: Vec<Cleanup> = slots
            .into_iter()
            .filter_map(|slot| match slot {
                Some(HookSlot::Effect(cell)) => cell.cleanup,
                _ => None,
            })
            .collect();
        log::trace!("unmount context ({} cleanups)", cleanups.len());
        for cleanup in cleanups {
            cleanup();
        }
    }
}
