use thiserror::Error;

/// A query key could not be derived from the supplied parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidKeyError {
    #[error("entity kind must not be empty")]
    EmptyEntityKind,
    #[error("entity kind `{kind}` is malformed: {reason}")]
    MalformedEntityKind { kind: String, reason: &'static str },
    #[error("{what} segment must not be empty")]
    EmptySegment { what: &'static str },
    #[error("filter names must not be empty")]
    EmptyFilterName,
    #[error("filter `{name}` has unsupported value type `{found}`")]
    UnsupportedFilterValue { name: String, found: &'static str },
    #[error("filter `{name}` holds a non-finite number")]
    NonFiniteNumber { name: String },
    #[error("filters must be a JSON object, found `{found}`")]
    FiltersNotAnObject { found: &'static str },
}

impl InvalidKeyError {
    pub fn malformed_kind(kind: impl Into<String>, reason: &'static str) -> Self {
        Self::MalformedEntityKind {
            kind: kind.into(),
            reason,
        }
    }

    pub fn empty_segment(what: &'static str) -> Self {
        Self::EmptySegment { what }
    }

    pub fn unsupported(name: impl Into<String>, found: &'static str) -> Self {
        Self::UnsupportedFilterValue {
            name: name.into(),
            found,
        }
    }

    pub fn non_finite(name: impl Into<String>) -> Self {
        Self::NonFiniteNumber { name: name.into() }
    }
}
