use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::Stage;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealId(pub i32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub i32);

/// Identity of the user allowed to mutate a deal.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sales opportunity as the board sees it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub title: String,
    /// Monetary value in minor currency units, never negative.
    pub value_cents: i64,
    pub stage: Stage,
    pub probability: u8,
    pub expected_close: NaiveDate,
    pub notes: String,
    pub owner: UserId,
    pub contact_id: ContactId,
}

impl Deal {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner == user
    }
}

pub const MAX_PROBABILITY: i32 = 100;

/// Largest accepted deal value: ten trillion in major units.
pub const MAX_VALUE_CENTS: i64 = 1_000_000_000_000_000;

/// Unvalidated deal form input.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DealDraft {
    pub title: String,
    pub contact_id: Option<ContactId>,
    pub value_cents: Option<i64>,
    pub stage: Option<Stage>,
    pub probability: Option<i32>,
    pub expected_close: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Validated attributes shared by deal creation and edits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DealFields {
    pub title: String,
    pub contact_id: ContactId,
    pub value_cents: i64,
    pub stage: Stage,
    pub probability: u8,
    pub expected_close: NaiveDate,
    pub notes: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Error)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: &'static str) {
        self.fields.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|err| err.field == field)
            .map(|err| err.message)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in &self.fields {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
            first = false;
        }
        Ok(())
    }
}

impl DealDraft {
    /// Collects every problem with the draft instead of stopping at the first.
    ///
    /// A draft without a stage keeps `current_stage`: `Lead` for new deals,
    /// the deal's present stage for edits.
    pub fn validate(self, current_stage: Stage) -> Result<DealFields, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.push("title", "Deal title is required");
        }
        if self.contact_id.is_none() {
            errors.push("contactId", "Contact is required");
        }
        match self.value_cents {
            Some(value) if value > MAX_VALUE_CENTS => {
                errors.push("value", "Deal value is too large")
            }
            Some(value) if value > 0 => {}
            _ => errors.push("value", "Deal value must be greater than 0"),
        }
        match self.probability {
            Some(p) if (0..=MAX_PROBABILITY).contains(&p) => {}
            _ => errors.push("probability", "Probability must be between 0 and 100"),
        }
        if self.expected_close.is_none() {
            errors.push("expectedCloseDate", "Expected close date is required");
        }

        match (self.contact_id, self.value_cents, self.probability, self.expected_close) {
            (Some(contact_id), Some(value_cents), Some(probability), Some(expected_close))
                if errors.is_empty() =>
            {
                Ok(DealFields {
                    title,
                    contact_id,
                    value_cents,
                    stage: self.stage.unwrap_or(current_stage),
                    probability: probability as u8,
                    expected_close,
                    notes: self.notes.unwrap_or_default(),
                })
            }
            _ => Err(errors),
        }
    }
}

impl From<&Deal> for DealDraft {
    fn from(deal: &Deal) -> Self {
        Self {
            title: deal.title.clone(),
            contact_id: Some(deal.contact_id),
            value_cents: Some(deal.value_cents),
            stage: Some(deal.stage),
            probability: Some(deal.probability as i32),
            expected_close: Some(deal.expected_close),
            notes: Some(deal.notes.clone()),
        }
    }
}
