use std::time::Duration;

use platform_authz::AuthzError;
use thiserror::Error;

use crate::{
    deal::{DealId, ValidationErrors},
    stage::InvalidStage,
};

/// Failures reported by a deal repository implementation.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RepositoryError {
    #[error("deal {0} not found")]
    NotFound(DealId),
    #[error("deal {0} is owned by another user")]
    Forbidden(DealId),
    #[error("mutation rejected: {0}")]
    Rejected(String),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("stored record is invalid: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Authorization(#[from] AuthzError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    InvalidStage(#[from] InvalidStage),
    #[error("deal {0} is not on the board")]
    UnknownDeal(DealId),
    #[error("invalid deal: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("record store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("stage update task aborted")]
    Aborted,
}

pub type PipelineResult<T> = Result<T, PipelineError>;
