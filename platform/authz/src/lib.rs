//! Ownership-based authorization for CRM records.
//!
//! Any user may view a record; only its owner may change it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum AuthzError {
    #[error("action {action} denied for resource {resource}")]
    Denied { action: Action, resource: String },
    #[error("no current user for {action} on {resource}")]
    Unauthenticated { action: Action, resource: String },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    MoveStage,
    Edit,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::MoveStage => "move_stage",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }

    pub fn is_mutation(self) -> bool {
        !matches!(self, Action::View)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct PolicyContext<'a> {
    /// Acting user, `None` when nobody is signed in.
    pub subject: Option<&'a str>,
    pub owner: &'a str,
    pub action: Action,
    pub resource: String,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn check(&self, ctx: &PolicyContext<'_>) -> Result<(), AuthzError> {
        if !ctx.action.is_mutation() {
            return Ok(());
        }
        match ctx.subject {
            None => Err(AuthzError::Unauthenticated {
                action: ctx.action,
                resource: ctx.resource.clone(),
            }),
            Some(subject) if subject == ctx.owner => Ok(()),
            Some(_) => Err(AuthzError::Denied {
                action: ctx.action,
                resource: ctx.resource.clone(),
            }),
        }
    }
}
