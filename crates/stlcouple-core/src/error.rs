//! Error types for container marshalling.
//!
//! - [`ConfigurationError`]: registration-time problems, always fatal
//! - [`ElementConversionError`]: one element could not be converted
//! - [`CopyBackError`]: a volatile binding failed to write back
//! - [`AmbiguousConversionError`]: two candidates tie on weight
//! - [`AccessError`]: derived capability misuse (bad index, missing key)
//! - [`MarshalError`]: the umbrella returned by call-time operations

use std::fmt;

use thiserror::Error;

use crate::{ConversionWeight, HostKey};

/// Errors raised while coupling container types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The template prefix is not a known container kind.
    #[error("invalid container template prefix '{prefix}' in '{name}'")]
    UnknownKind { prefix: String, name: String },

    /// A name was registered again with different element types.
    #[error("conflicting registration for '{name}': registered as {existing}, requested {requested}")]
    ConflictingRegistration {
        name: String,
        existing: String,
        requested: String,
    },

    /// The template received the wrong number of element types.
    #[error("'{name}' takes {expected} element type(s), found {found}")]
    ElementArity {
        name: String,
        expected: usize,
        found: usize,
    },

    /// A different conversion is already registered for this shape and target.
    #[error("conflicting {semantics} conversion from {shape} to '{target}'")]
    ConflictingConversion {
        target: String,
        shape: String,
        semantics: &'static str,
    },
}

/// Errors from converting one scalar value across the boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScalarConversionError {
    /// Type mismatch during conversion
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Integer value out of range for the target type
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow { value: i128, target_type: &'static str },

    /// Float value not representable in the target type
    #[error("float conversion error: value {value} cannot be represented as {target_type}")]
    FloatConversion { value: f64, target_type: &'static str },

    /// A character type received a string that is not exactly one byte long
    #[error("expected a string of length 1, got length {length}")]
    CharLength { length: usize },

    /// A referenced foreign instance no longer exists
    #[error("stale foreign instance #{index}")]
    StaleInstance { index: u32 },
}

/// Where in a container the offending element sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementPosition {
    Index(usize),
    Key(HostKey),
    ValueAt(HostKey),
    First,
    Second,
    Real,
    Imaginary,
    /// The value as a whole, e.g. a non-list passed where a list was expected.
    Whole,
}

impl fmt::Display for ElementPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementPosition::Index(i) => write!(f, "element at index {i}"),
            ElementPosition::Key(key) => write!(f, "key {key}"),
            ElementPosition::ValueAt(key) => write!(f, "value at key {key}"),
            ElementPosition::First => write!(f, "first member"),
            ElementPosition::Second => write!(f, "second member"),
            ElementPosition::Real => write!(f, "real part"),
            ElementPosition::Imaginary => write!(f, "imaginary part"),
            ElementPosition::Whole => write!(f, "value"),
        }
    }
}

/// One element, key or member could not be converted.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot convert {position}: expected {expected}, found {actual}")]
pub struct ElementConversionError {
    pub position: ElementPosition,
    /// Expected element type.
    pub expected: String,
    /// Actual host or foreign type found.
    pub actual: String,
    #[source]
    pub cause: Option<ScalarConversionError>,
}

impl ElementConversionError {
    pub fn new(
        position: ElementPosition,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            position,
            expected: expected.into(),
            actual: actual.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: ScalarConversionError) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Rewrite the position, for errors raised by a nested conversion.
    pub fn at(mut self, position: ElementPosition) -> Self {
        self.position = position;
        self
    }
}

/// A volatile binding could not write back into its host collection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CopyBackError {
    /// The foreign instance was released before copy-back could read it.
    #[error("foreign '{target}' was released before copy-back")]
    InstanceReleased { target: String },

    /// The bound host value is not a collection copy-back can write into.
    #[error("cannot copy '{target}' back into a host {actual}")]
    HostShapeMismatch { target: String, actual: &'static str },

    /// An element of the foreign container has no host representation.
    #[error("copy-back of '{target}' failed: {source}")]
    Element {
        target: String,
        #[source]
        source: ElementConversionError,
    },
}

/// Two or more candidates are equally good.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ambiguous conversion for {context}: candidates {candidates:?} tie at {weight}")]
pub struct AmbiguousConversionError {
    /// What was being selected, e.g. a function name.
    pub context: String,
    /// Display names of the tied candidates, in declaration order.
    pub candidates: Vec<String>,
    pub weight: ConversionWeight,
}

/// Misuse of a derived container capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    /// Index outside the container
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// Key absent from a map
    #[error("key {key} not found")]
    KeyNotFound { key: HostKey },

    /// Key, value or element of the wrong type
    #[error("invalid element: {0}")]
    Element(#[from] ElementConversionError),

    /// The container kind does not support this operation
    #[error("'{container}' does not support {operation}")]
    Unsupported {
        container: String,
        operation: &'static str,
    },

    /// Handle no longer refers to a live instance
    #[error("stale foreign instance #{index}")]
    StaleHandle { index: u32 },

    /// The handle refers to an instance of a different type
    #[error("expected an instance of '{expected}', got '{actual}'")]
    ShapeMismatch { expected: String, actual: String },
}

/// Errors surfaced by call-time marshalling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarshalError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Element(#[from] ElementConversionError),

    #[error(transparent)]
    Ambiguous(#[from] AmbiguousConversionError),

    #[error(transparent)]
    Access(#[from] AccessError),

    /// No registered conversion accepts the value.
    #[error("no conversion from {actual} to '{target}'")]
    NoViableConversion { target: String, actual: String },

    /// The foreign function itself reported failure.
    #[error("foreign call '{function}' failed: {message}")]
    ForeignCall { function: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_error_names_key() {
        let err = ElementConversionError::new(ElementPosition::Key(HostKey::from("a")), "long", "str");
        assert_eq!(err.to_string(), "cannot convert key \"a\": expected long, found str");
    }

    #[test]
    fn element_error_keeps_cause() {
        use std::error::Error;

        let err = ElementConversionError::new(ElementPosition::Index(2), "short", "int").with_cause(
            ScalarConversionError::IntegerOverflow {
                value: 70000,
                target_type: "short",
            },
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("index 2"));
    }

    #[test]
    fn marshal_error_is_transparent() {
        let err: MarshalError = ConfigurationError::UnknownKind {
            prefix: "std::deque".into(),
            name: "std::deque<int>".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid container template prefix 'std::deque' in 'std::deque<int>'"
        );
    }
}
