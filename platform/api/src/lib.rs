use std::{collections::BTreeMap, sync::Arc};

use async_graphql::{Error, ErrorExtensions, Value};
use thiserror::Error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// A single rejected input field, reported under `extensions.fields`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid input")]
    Validation(Vec<FieldIssue>),
    #[error("service temporarily unavailable")]
    Unavailable,
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION",
            ApiError::Unavailable => "UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn validation<I, F, M>(issues: I) -> Self
    where
        I: IntoIterator<Item = (F, M)>,
        F: Into<String>,
        M: Into<String>,
    {
        Self::Validation(
            issues
                .into_iter()
                .map(|(field, message)| FieldIssue {
                    field: field.into(),
                    message: message.into(),
                })
                .collect(),
        )
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        if let ApiError::Internal(inner) = self {
            tracing::error!(error = %inner, "internal error masked from client");
        }
        let mut err = Error::new(self.to_string()).extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::Validation(issues) = self {
            let fields: BTreeMap<&str, &str> = issues
                .iter()
                .map(|issue| (issue.field.as_str(), issue.message.as_str()))
                .collect();
            let fields = async_graphql::to_value(fields).unwrap_or_default();
            err = err.extend_with(|_err, e| {
                e.set("fields", fields.clone());
            });
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}
