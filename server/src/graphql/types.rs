use async_graphql::{Enum, InputObject, SimpleObject};
use chrono::NaiveDate;
use products_crm::{
    ContactId, Deal, DealDraft, DropOutcome, Notification, NotificationLevel, PipelineSummary,
    Stage, StageAggregate,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
#[graphql(name = "Stage")]
pub enum StageValue {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    Closed,
}

impl From<Stage> for StageValue {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Lead => StageValue::Lead,
            Stage::Qualified => StageValue::Qualified,
            Stage::Proposal => StageValue::Proposal,
            Stage::Negotiation => StageValue::Negotiation,
            Stage::Closed => StageValue::Closed,
        }
    }
}

impl From<StageValue> for Stage {
    fn from(value: StageValue) -> Self {
        match value {
            StageValue::Lead => Stage::Lead,
            StageValue::Qualified => Stage::Qualified,
            StageValue::Proposal => Stage::Proposal,
            StageValue::Negotiation => Stage::Negotiation,
            StageValue::Closed => Stage::Closed,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StageInfo {
    pub stage: StageValue,
    pub label: String,
    pub position: i32,
}

impl From<Stage> for StageInfo {
    fn from(stage: Stage) -> Self {
        Self {
            stage: stage.into(),
            label: stage.label().to_string(),
            position: stage.position() as i32,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Deal")]
pub struct DealObject {
    pub id: i32,
    pub title: String,
    pub value_cents: i64,
    pub stage: StageValue,
    pub probability: i32,
    pub expected_close_date: NaiveDate,
    pub notes: String,
    pub owner_id: String,
    pub contact_id: i32,
    /// Whether the requesting user may drag this card.
    pub can_move: bool,
}

impl DealObject {
    pub fn new(deal: &Deal, can_move: bool) -> Self {
        Self {
            id: deal.id.0,
            title: deal.title.clone(),
            value_cents: deal.value_cents,
            stage: deal.stage.into(),
            probability: i32::from(deal.probability),
            expected_close_date: deal.expected_close,
            notes: deal.notes.clone(),
            owner_id: deal.owner.as_str().to_string(),
            contact_id: deal.contact_id.0,
            can_move,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StageAggregateObject {
    pub stage: StageValue,
    pub count: i32,
    pub total_value_cents: i64,
}

impl From<StageAggregate> for StageAggregateObject {
    fn from(aggregate: StageAggregate) -> Self {
        Self {
            stage: aggregate.stage.into(),
            count: aggregate.count as i32,
            total_value_cents: aggregate.total_cents,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StageColumn {
    pub stage: StageValue,
    pub label: String,
    pub count: i32,
    pub total_value_cents: i64,
    pub deals: Vec<DealObject>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PipelineBoard {
    pub columns: Vec<StageColumn>,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "PipelineSummary")]
pub struct SummaryObject {
    pub total_deals: i32,
    pub total_value_cents: i64,
    pub average_deal_cents: i64,
    pub conversion_rate: f64,
    pub at_risk_deal_ids: Vec<i32>,
}

impl From<PipelineSummary> for SummaryObject {
    fn from(summary: PipelineSummary) -> Self {
        Self {
            total_deals: summary.total_deals as i32,
            total_value_cents: summary.total_value_cents,
            average_deal_cents: summary.average_deal_cents,
            conversion_rate: summary.conversion_rate,
            at_risk_deal_ids: summary.at_risk.into_iter().map(|id| id.0).collect(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum NotificationKind {
    Success,
    Failure,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct NotificationObject {
    pub level: NotificationKind,
    pub message: String,
}

impl From<Notification> for NotificationObject {
    fn from(notice: Notification) -> Self {
        Self {
            level: match notice.level {
                NotificationLevel::Success => NotificationKind::Success,
                NotificationLevel::Failure => NotificationKind::Failure,
            },
            message: notice.message,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum MoveOutcome {
    Moved,
    Unchanged,
    Refused,
    Failed,
}

impl MoveOutcome {
    pub fn of(outcome: &DropOutcome) -> Self {
        match outcome {
            DropOutcome::Moved(_) => MoveOutcome::Moved,
            DropOutcome::Unchanged => MoveOutcome::Unchanged,
            DropOutcome::Refused(_) => MoveOutcome::Refused,
            DropOutcome::Ignored | DropOutcome::Failed(_) => MoveOutcome::Failed,
        }
    }
}

/// Result of `moveDealStage`. Failures are described here, not as errors.
#[derive(Clone, Debug, SimpleObject)]
pub struct MoveDealPayload {
    pub outcome: MoveOutcome,
    /// The deal as the board now shows it, absent when it is unknown.
    pub deal: Option<DealObject>,
    pub aggregates: Vec<StageAggregateObject>,
    pub notifications: Vec<NotificationObject>,
}

#[derive(Clone, Debug, InputObject)]
pub struct DealInput {
    pub title: String,
    pub contact_id: Option<i32>,
    pub value_cents: Option<i64>,
    pub stage: Option<StageValue>,
    pub probability: Option<i32>,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl From<DealInput> for DealDraft {
    fn from(input: DealInput) -> Self {
        Self {
            title: input.title,
            contact_id: input.contact_id.map(ContactId),
            value_cents: input.value_cents,
            stage: input.stage.map(Stage::from),
            probability: input.probability,
            expected_close: input.expected_close_date,
            notes: input.notes,
        }
    }
}
