//! Error types shared by the criteria front-end.

use thiserror::Error;

/// Result type for criteria operations.
pub type CriteriaResult<T> = Result<T, CriteriaError>;

/// Errors raised while building, compiling or rendering a criteria query.
///
/// Variants fall into two families: illegal arguments (a structural reference
/// that cannot be resolved, reported at the call that discovered it) and
/// unsupported constructs (permanent capability gaps).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CriteriaError {
    /// The named type is not a known entity.
    #[error("type '{0}' is not an entity")]
    NotAnEntity(String),

    /// The attribute does not exist on the managed type.
    #[error("attribute '{attribute}' not found on '{owner}'")]
    UnknownAttribute { owner: String, attribute: String },

    /// The attribute cannot be navigated or joined through.
    #[error("attribute '{attribute}' of '{owner}' is not navigable: {reason}")]
    NotNavigable {
        owner: String,
        attribute: String,
        reason: String,
    },

    /// Generic invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two FROM elements in one scope declare the same alias.
    #[error("alias '{0}' is declared more than once")]
    DuplicateAlias(String),

    /// An identifier in the IR could not be bound to a symbol.
    #[error("cannot resolve identifier '{0}'")]
    UnresolvedSymbol(String),

    /// The query has no FROM root to derive the candidate from.
    #[error("query has no FROM root")]
    MissingCandidate,

    /// The renderer does not know how to print this operator.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// The renderer does not know how to print this invocation.
    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),

    /// The feature is not implemented.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl CriteriaError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported(feature.into())
    }

    /// True for the illegal-argument family.
    pub fn is_illegal_argument(&self) -> bool {
        matches!(
            self,
            Self::NotAnEntity(_)
                | Self::UnknownAttribute { .. }
                | Self::NotNavigable { .. }
                | Self::InvalidArgument(_)
                | Self::DuplicateAlias(_)
                | Self::UnresolvedSymbol(_)
                | Self::MissingCandidate
        )
    }

    /// True for the unsupported-operation family.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperator(_) | Self::UnsupportedFunction(_) | Self::Unsupported(_)
        )
    }
}
