use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// NaN and infinities have no JSON representation.
    NonFiniteFloat { value: f64 },
    /// An element reached the encoder without being rendered first.
    UnrenderedElement { name: String },
    /// Nesting went deeper than `EncoderConfig::max_depth`.
    DepthExceeded { max_depth: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::NonFiniteFloat { value } => {
                write!(f, "cannot encode non-finite float {value}")
            }
            EncodeError::UnrenderedElement { name } => {
                write!(f, "element <{name}> was not rendered before encoding")
            }
            EncodeError::DepthExceeded { max_depth } => {
                write!(f, "node tree nests deeper than {max_depth} levels")
            }
        }
    }
}

impl std::error::Error for EncodeError {}
