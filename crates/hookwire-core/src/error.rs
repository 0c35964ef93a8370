use crate::context::HookKind;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A hook was called while its context had no open render scope.
    NoActiveRender,
    /// The context is already inside a render scope.
    AlreadyRendering,
    /// The context (or the one a setter points at) has been unmounted.
    Unmounted,
    /// A render called a different number of hooks than the previous one.
    HookCountMismatch { expected: usize, actual: usize },
    /// Slot `index` holds a different kind of hook than the one being called.
    HookKindMismatch {
        index: usize,
        expected: HookKind,
        found: HookKind,
    },
    StateAlreadyInitialized { index: usize },
    StateUninitialized { index: usize },
    StateTypeMismatch { index: usize, expected: &'static str },
    /// Dependencies were not a list.
    InvalidDeps { found: &'static str },
    DepsLengthChanged { previous: usize, next: usize },
    DuplicateKey { key: String },
    /// Error raised by component code.
    Component { name: String, message: String },
    /// Error raised by an effect during commit.
    Effect { message: String },
}

impl RenderError {
    pub fn component(name: impl Into<String>, message: impl Into<String>) -> Self {
        RenderError::Component {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn effect(message: impl Into<String>) -> Self {
        RenderError::Effect {
            message: message.into(),
        }
    }

    /// True for hook discipline and API misuse, as opposed to errors raised by
    /// component or effect code.
    pub fn is_usage_error(&self) -> bool {
        !matches!(
            self,
            RenderError::Component { .. } | RenderError::Effect { .. }
        )
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NoActiveRender => write!(f, "hook called outside of a render scope"),
            RenderError::AlreadyRendering => write!(f, "render context is already rendering"),
            RenderError::Unmounted => write!(f, "render context has been unmounted"),
            RenderError::HookCountMismatch { expected, actual } => {
                write!(f, "expected {expected} hook calls, got {actual}")
            }
            RenderError::HookKindMismatch {
                index,
                expected,
                found,
            } => write!(f, "hook {index} expected {expected}, found {found}"),
            RenderError::StateAlreadyInitialized { index } => {
                write!(f, "state {index} already initialized")
            }
            RenderError::StateUninitialized { index } => {
                write!(f, "state {index} used before initialization")
            }
            RenderError::StateTypeMismatch { index, expected } => {
                write!(f, "state {index} does not hold a {expected}")
            }
            RenderError::InvalidDeps { found } => {
                write!(f, "dependencies must be a list, got {found}")
            }
            RenderError::DepsLengthChanged { previous, next } => {
                write!(f, "dependency list changed length from {previous} to {next}")
            }
            RenderError::DuplicateKey { key } => write!(f, "duplicate sibling key {key}"),
            RenderError::Component { name, message } => {
                write!(f, "component {name} failed: {message}")
            }
            RenderError::Effect { message } => write!(f, "effect failed: {message}"),
        }
    }
}

impl std::error::Error for RenderError {}
