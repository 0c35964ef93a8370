//! Lazy element descriptions and component definitions.

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::value::{Props, Value, CHILDREN_KEY};
use crate::{hash_key, Key};
use std::any::TypeId;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

type ComponentFn = dyn Fn(&RenderContext, &Props) -> Result<Value, RenderError>;
type PropsComparator = dyn Fn(&Props, &Props) -> bool;

/// When a component may be skipped on re-render.
#[derive(Clone, Default)]
pub enum MemoPolicy {
    /// Always re-invoke.
    #[default]
    Never,
    /// Skip when the previous props compare equal with [`Props::shallow_eq`].
    Shallow,
    /// Skip when `compare(previous, next)` returns true.
    Custom(Rc<PropsComparator>),
}

impl MemoPolicy {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, MemoPolicy::Never)
    }

    pub(crate) fn props_equal(&self, previous: &Props, next: &Props) -> bool {
        match self {
            MemoPolicy::Never => false,
            MemoPolicy::Shallow => previous.shallow_eq(next),
            MemoPolicy::Custom(compare) => compare(previous, next),
        }
    }
}

impl fmt::Debug for MemoPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoPolicy::Never => f.write_str("Never"),
            MemoPolicy::Shallow => f.write_str("Shallow"),
            MemoPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A function that calls hooks on the context it is given and returns its children.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    func: Rc<ComponentFn>,
    func_type: TypeId,
    memo: MemoPolicy,
}

impl Component {
    pub fn new<F>(name: impl Into<Rc<str>>, func: F) -> Self
    where
        F: Fn(&RenderContext, &Props) -> Result<Value, RenderError> + 'static,
    {
        Self {
            name: name.into(),
            func: Rc::new(func),
            func_type: TypeId::of::<F>(),
            memo: MemoPolicy::Never,
        }
    }

    /// Skip re-invocation while props stay shallow-equal and the instance is clean.
    pub fn memo(mut self) -> Self {
        self.memo = MemoPolicy::Shallow;
        self
    }

    /// Like [`Component::memo`] but with a caller-supplied comparator that
    /// replaces the shallow check entirely.
    pub fn memo_with(mut self, compare: impl Fn(&Props, &Props) -> bool + 'static) -> Self {
        self.memo = MemoPolicy::Custom(Rc::new(compare));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the function body. Components rebuilt by a factory on every
    /// render share it; two distinct functions never do, whatever their names.
    pub(crate) fn func_type(&self) -> TypeId {
        self.func_type
    }

    pub fn memo_policy(&self) -> &MemoPolicy {
        &self.memo
    }

    /// Describe an invocation of this component. Nothing runs until rendered.
    pub fn element(&self, props: Props) -> Element {
        Element::new(ElementKind::Function(self.clone()), props)
    }

    pub(crate) fn invoke(&self, context: &RenderContext, props: &Props) -> Result<Value, RenderError> {
        (self.func)(context, props)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("memo", &self.memo)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum ElementKind {
    Function(Component),
    /// Host node: props are rendered and emitted under `name` unchanged.
    Base(Rc<str>),
}

struct ElementInner {
    kind: ElementKind,
    props: Props,
    key: Option<Key>,
}

/// Lazy "invoke C with P" description. Clones share identity.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl Element {
    pub fn new(kind: ElementKind, props: Props) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                kind,
                props,
                key: None,
            }),
        }
    }

    /// Host element with the given node name.
    pub fn base(name: impl Into<Rc<str>>, props: Props) -> Self {
        Self::new(ElementKind::Base(name.into()), props)
    }

    /// Host element whose positional children are folded into its props.
    pub fn base_with_children(
        name: impl Into<Rc<str>>,
        props: Props,
        children: Vec<Value>,
    ) -> Self {
        Self::base(name, props.with(CHILDREN_KEY, Value::List(children)))
    }

    /// Attach an explicit sibling key; the element then keeps its context when
    /// its index among siblings changes.
    pub fn with_key<K: Hash + ?Sized>(self, key: &K) -> Self {
        let key = Some(hash_key(key));
        let inner = match Rc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.key = key;
                inner
            }
            Err(shared) => ElementInner {
                kind: shared.kind.clone(),
                props: shared.props.clone(),
                key,
            },
        };
        Self {
            inner: Rc::new(inner),
        }
    }

    pub fn kind(&self) -> &ElementKind {
        &self.inner.kind
    }

    pub fn props(&self) -> &Props {
        &self.inner.props
    }

    pub fn key(&self) -> Option<Key> {
        self.inner.key
    }

    pub fn name(&self) -> &str {
        match &self.inner.kind {
            ElementKind::Function(component) => component.name(),
            ElementKind::Base(name) => name,
        }
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name())
            .field("key", &self.inner.key)
            .field("props", &self.inner.props)
            .finish()
    }
}
