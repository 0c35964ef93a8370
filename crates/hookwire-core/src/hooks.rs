//! Hook primitives layered on [`RenderContext`] slots.
//!
//! Every hook consumes exactly one slot per call, in call order. Hooks take
//! the context explicitly; there is no ambient "current component".

use crate::context::{
    dep_list, kind_mismatch, Cleanup, EffectCell, HookKind, HookSlot, MemoCell, PendingEffect,
    RenderContext,
};
use crate::error::RenderError;
use crate::handle::RefHandle;
use crate::value::{Callback, Value};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

/// Passed to an effect when it runs; hands out the cleanup result.
#[derive(Clone, Copy, Debug, Default)]
pub struct EffectScope {
    _private: (),
}

/// What an effect leaves behind: an optional cleanup run before the next
/// invocation of the same effect or on unmount.
#[derive(Default)]
pub struct EffectResult {
    cleanup: Option<Cleanup>,
}

impl EffectScope {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) -> EffectResult {
        EffectResult::new(cleanup)
    }

    /// No cleanup.
    pub fn done(&self) -> EffectResult {
        EffectResult::default()
    }
}

impl EffectResult {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    pub(crate) fn into_cleanup(self) -> Option<Cleanup> {
        self.cleanup
    }
}

impl fmt::Debug for EffectResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectResult")
            .field("has_cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// Setter returned by [`RenderContext::use_state`].
///
/// Holds the context weakly: once the instance is gone, `set` reports
/// [`RenderError::Unmounted`] instead of keeping it alive.
pub struct StateSetter<T> {
    context: Weak<crate::context::ContextInner>,
    index: usize,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            context: Weak::clone(&self.context),
            index: self.index,
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for StateSetter<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && Weak::ptr_eq(&self.context, &other.context)
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("index", &self.index)
            .finish()
    }
}

impl<T: 'static> StateSetter<T> {
    fn context(&self) -> Result<RenderContext, RenderError> {
        match RenderContext::upgrade(&self.context) {
            Some(context) if !context.is_unmounted() => Ok(context),
            _ => {
                log::warn!("state {} set after its component unmounted", self.index);
                Err(RenderError::Unmounted)
            }
        }
    }

    /// Store `value`; fires the owner's change callback even when unchanged.
    pub fn set(&self, value: T) -> Result<(), RenderError> {
        self.context()?.set_state(self.index, value)
    }

    /// Derive the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), RenderError>
    where
        T: Clone,
    {
        let context = self.context()?;
        let current = context.get_state::<T>(self.index)?;
        context.set_state(self.index, f(&current))
    }
}

impl RenderContext {
    /// State hook. `init` runs only on the render that creates the slot; later
    /// renders return the stored value.
    pub fn use_state<T: Clone + 'static>(
        &self,
        init: impl FnOnce() -> T,
    ) -> Result<(T, StateSetter<T>), RenderError> {
        let index = self.next_hook_index()?;
        if !self.has_state(index)? {
            self.init_state(index, init())?;
        }
        let value = self.get_state::<T>(index)?;
        let setter = StateSetter {
            context: self.downgrade(),
            index,
            _marker: PhantomData,
        };
        Ok((value, setter))
    }

    /// Ref hook: one mutable cell per slot, created from `init` once.
    pub fn use_ref<T: 'static>(&self, init: impl FnOnce() -> T) -> Result<RefHandle<T>, RenderError> {
        let index = self.next_hook_index()?;
        let existing = self.with_slot(index, |slot| match slot {
            None => Ok(None),
            Some(HookSlot::Ref(handle)) => Ok(Some(Rc::clone(handle))),
            Some(other) => Err(kind_mismatch(index, HookKind::Ref, other)),
        })?;
        if let Some(handle) = existing {
            return handle
                .downcast_ref::<RefHandle<T>>()
                .cloned()
                .ok_or(RenderError::StateTypeMismatch {
                    index,
                    expected: std::any::type_name::<T>(),
                });
        }
        let handle = RefHandle::new(init());
        let stored: Rc<dyn Any> = Rc::new(handle.clone());
        self.with_slot(index, |slot| *slot = Some(HookSlot::Ref(stored)));
        Ok(handle)
    }

    /// Memo hook. `deps` must be a [`Value::List`]; `compute` runs on the first
    /// render and whenever any dependency differs from the previous render.
    pub fn use_memo<T: Clone + 'static>(
        &self,
        compute: impl FnOnce() -> T,
        deps: Value,
    ) -> Result<T, RenderError> {
        let deps = dep_list(deps)?;
        let index = self.next_hook_index()?;
        let cached = self.with_slot(index, |slot| match slot {
            None => Ok(None),
            Some(HookSlot::Memo(cell)) => {
                if cell.deps.len() != deps.len() {
                    return Err(RenderError::DepsLengthChanged {
                        previous: cell.deps.len(),
                        next: deps.len(),
                    });
                }
                Ok((cell.deps == deps).then(|| Rc::clone(&cell.value)))
            }
            Some(other) => Err(kind_mismatch(index, HookKind::Memo, other)),
        })?;
        if let Some(value) = cached {
            return value
                .downcast_ref::<T>()
                .cloned()
                .ok_or(RenderError::StateTypeMismatch {
                    index,
                    expected: std::any::type_name::<T>(),
                });
        }
        let value = compute();
        let stored: Rc<dyn Any> = Rc::new(value.clone());
        self.with_slot(index, |slot| {
            *slot = Some(HookSlot::Memo(MemoCell {
                value: stored,
                deps,
            }))
        });
        Ok(value)
    }

    /// A [`Callback`] that keeps its identity while `deps` are unchanged.
    pub fn use_callback(
        &self,
        f: impl Fn(&[Value]) + 'static,
        deps: Value,
    ) -> Result<Callback, RenderError> {
        self.use_memo(move || Callback::new(f), deps)
    }

    /// Effect hook. Nothing runs now; the effect is queued for the commit that
    /// follows this render.
    ///
    /// - `None`: run after every commit, cleaning up the previous run first.
    /// - `Some(deps![])`: run after the first commit only.
    /// - `Some(deps![a, b])`: run after the first commit and whenever an
    ///   element differs from the last committed list.
    pub fn use_effect<F>(&self, effect: F, deps: Option<Value>) -> Result<(), RenderError>
    where
        F: FnOnce(EffectScope) -> Result<EffectResult, RenderError> + 'static,
    {
        let deps = deps.map(dep_list).transpose()?;
        let index = self.next_hook_index()?;
        let should_run = self.with_slot(index, |slot| match slot {
            None => {
                *slot = Some(HookSlot::Effect(EffectCell::default()));
                Ok(true)
            }
            Some(HookSlot::Effect(cell)) => cell.should_run(deps.as_ref()),
            Some(other) => Err(kind_mismatch(index, HookKind::Effect, other)),
        })?;
        if should_run {
            self.queue_effect(PendingEffect {
                index,
                deps,
                run: Box::new(effect),
            });
        }
        Ok(())
    }
}
