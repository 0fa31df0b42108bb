use thiserror::Error;

/// A raw policy record could not be normalized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("policy record is missing required field `{field}` ({context})")]
    MissingField {
        field: &'static str,
        context: String,
    },
}

impl MapError {
    pub(crate) fn missing(field: &'static str, context: impl Into<String>) -> Self {
        Self::MissingField {
            field,
            context: context.into(),
        }
    }
}

/// A note save request was rejected before reaching the store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown entity type: {0:?}")]
    UnknownEntityType(String),

    #[error("{entity_type} note requires `{field}`")]
    MissingField {
        entity_type: &'static str,
        field: &'static str,
    },
}
