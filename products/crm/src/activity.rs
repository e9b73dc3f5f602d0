use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deal::{ContactId, DealId};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Call,
    Email,
    Meeting,
    Note,
}

/// Timeline entry written alongside deal changes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub description: String,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
    pub occurred_at: DateTime<Utc>,
}

impl NewActivity {
    pub fn note(description: impl Into<String>, deal_id: DealId, contact_id: ContactId) -> Self {
        Self {
            kind: ActivityKind::Note,
            description: description.into(),
            deal_id: Some(deal_id),
            contact_id: Some(contact_id),
            occurred_at: Utc::now(),
        }
    }
}
