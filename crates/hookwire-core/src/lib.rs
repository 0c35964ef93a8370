#![doc = r"Hook-based component runtime: render contexts, hooks and a memoizing renderer."]

pub mod collections;
pub mod context;
pub mod element;
pub mod error;
mod handle;
pub mod hash;
mod hooks;
pub mod renderer;
pub mod value;

pub use context::{ContextKey, HookKind, RenderContext};
pub use element::{Component, Element, ElementKind, MemoPolicy};
pub use error::RenderError;
pub use handle::RefHandle;
pub use hooks::{EffectResult, EffectScope, StateSetter};
pub use renderer::{RenderStats, RenderedNode, Renderer, RendererOptions};
pub use value::{Callback, ExternalObject, Props, Value, CHILDREN_KEY};

use std::hash::{Hash, Hasher};

pub type Key = u64;

pub(crate) fn hash_key<K: Hash + ?Sized>(key: &K) -> Key {
    let mut hasher = hash::default::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod context_tests;

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod hooks_tests;

#[cfg(test)]
#[path = "tests/renderer_tests.rs"]
mod renderer_tests;
