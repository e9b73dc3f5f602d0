//! Pipeline board state and the drag-and-drop stage workflow.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use platform_authz::{Action, AuthzError, PolicyContext, PolicyEngine};
use tracing::{debug, info, instrument, warn};

use crate::{
    aggregate::{StageAggregate, stage_aggregates},
    activity::NewActivity,
    deal::{Deal, DealDraft, DealId, UserId},
    error::{PipelineError, PipelineResult},
    ports::{ActivityLog, CurrentUserProvider, DealRepository, NotificationSink},
    stage::Stage,
    summary::PipelineSummary,
};

pub const DEFAULT_STAGE_UPDATE_TIMEOUT: Duration = Duration::from_secs(10);

const NOT_OWNER_MOVE: &str = "You can only move deals that you own";
const NOT_OWNER_EDIT: &str = "You can only edit deals that you own";
const NOT_OWNER_DELETE: &str = "You can only delete deals that you own";
const STAGE_UPDATE_FAILED: &str = "Failed to update deal stage";
const STAGE_UPDATE_TIMED_OUT: &str = "Deal stage update timed out";
const LOAD_FAILED: &str = "Failed to load pipeline data";
const SAVE_FAILED: &str = "Failed to save deal";
const DELETE_FAILED: &str = "Failed to delete deal";

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Upper bound on waiting for the record store to confirm a stage change.
    pub stage_update_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stage_update_timeout: DEFAULT_STAGE_UPDATE_TIMEOUT,
        }
    }
}

/// Drag gesture progress. Dropping always returns the board to `Idle`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        deal: DealId,
    },
    Hovering {
        deal: DealId,
        stage: Stage,
    },
}

impl DragState {
    pub fn deal(self) -> Option<DealId> {
        match self {
            DragState::Idle => None,
            DragState::Dragging { deal } | DragState::Hovering { deal, .. } => Some(deal),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DragStart {
    Granted,
    Refused(PipelineError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DropOutcome {
    /// Nothing was being dragged.
    Ignored,
    /// Dropped on the stage the deal already occupies.
    Unchanged,
    Refused(PipelineError),
    Moved(Deal),
    Failed(PipelineError),
}

impl DropOutcome {
    pub fn moved(&self) -> Option<&Deal> {
        match self {
            DropOutcome::Moved(deal) => Some(deal),
            _ => None,
        }
    }
}

/// Owns the board's copy of the deals and mediates every change to them.
///
/// The in-memory collection only changes after the repository has confirmed
/// a mutation; failures become notifications rather than errors.
pub struct StageTransitionController {
    repository: Arc<dyn DealRepository>,
    users: Arc<dyn CurrentUserProvider>,
    notifications: Arc<dyn NotificationSink>,
    activity: Option<Arc<dyn ActivityLog>>,
    policy: PolicyEngine,
    config: ControllerConfig,
    deals: Vec<Deal>,
    aggregates: Vec<StageAggregate>,
    drag: DragState,
}

impl StageTransitionController {
    pub fn new(
        repository: Arc<dyn DealRepository>,
        users: Arc<dyn CurrentUserProvider>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            repository,
            users,
            notifications,
            activity: None,
            policy: PolicyEngine,
            config: ControllerConfig::default(),
            deals: Vec::new(),
            aggregates: stage_aggregates(&[]),
            drag: DragState::Idle,
        }
    }

    pub fn with_activity_log(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Seeds the board without a repository round trip.
    pub fn with_deals(mut self, deals: Vec<Deal>) -> Self {
        self.deals = deals;
        self.recompute();
        self
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn deal(&self, id: DealId) -> Option<&Deal> {
        self.deals.iter().find(|deal| deal.id == id)
    }

    pub fn stage_deals(&self, stage: Stage) -> impl Iterator<Item = &Deal> {
        self.deals.iter().filter(move |deal| deal.stage == stage)
    }

    pub fn aggregates(&self) -> &[StageAggregate] {
        &self.aggregates
    }

    pub fn aggregate(&self, stage: Stage) -> StageAggregate {
        self.aggregates[stage.position()]
    }

    pub fn summary(&self, today: NaiveDate) -> PipelineSummary {
        PipelineSummary::from_deals(&self.deals, today)
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn dragged_deal(&self) -> Option<&Deal> {
        self.drag.deal().and_then(|id| self.deal(id))
    }

    pub fn highlighted_stage(&self) -> Option<Stage> {
        match self.drag {
            DragState::Hovering { stage, .. } => Some(stage),
            _ => None,
        }
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.users.current_user_id()
    }

    /// Whether the card should offer a drag handle to the current user.
    pub fn can_drag(&self, deal: &Deal) -> bool {
        self.authorize(deal, Action::MoveStage).is_ok()
    }

    /// The one ownership check used at drag start, at drop, and by edits
    /// and deletes. Reads the identity fresh on every call.
    pub fn authorize(&self, deal: &Deal, action: Action) -> Result<(), AuthzError> {
        let subject = self.users.current_user_id();
        self.policy.check(&PolicyContext {
            subject: subject.as_ref().map(UserId::as_str),
            owner: deal.owner.as_str(),
            action,
            resource: format!("deal:{}", deal.id),
        })
    }

    #[instrument(name = "crm.reload", skip_all)]
    pub async fn reload(&mut self) -> PipelineResult<()> {
        match self.repository.list_all().await {
            Ok(deals) => {
                debug!(count = deals.len(), "pipeline loaded");
                self.deals = deals;
                self.recompute();
                if self.drag.deal().is_some_and(|id| self.deal(id).is_none()) {
                    self.drag = DragState::Idle;
                }
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "pipeline load failed");
                self.notifications.notify_failure(LOAD_FAILED);
                Err(err.into())
            }
        }
    }

    pub fn on_drag_start(&mut self, deal_id: DealId) -> DragStart {
        self.drag = DragState::Idle;
        let Some(deal) = self.deal(deal_id) else {
            debug!(deal = deal_id.0, "drag start on unknown deal");
            return DragStart::Refused(PipelineError::UnknownDeal(deal_id));
        };
        if let Err(err) = self.authorize(deal, Action::MoveStage) {
            debug!(deal = deal_id.0, error = %err, "drag refused");
            self.notifications.notify_failure(NOT_OWNER_MOVE);
            return DragStart::Refused(err.into());
        }
        self.drag = DragState::Dragging { deal: deal_id };
        DragStart::Granted
    }

    pub fn on_drag_over(&mut self, stage: Stage) {
        if let Some(deal) = self.drag.deal() {
            self.drag = DragState::Hovering { deal, stage };
        }
    }

    pub fn on_drag_leave(&mut self) {
        if let DragState::Hovering { deal, .. } = self.drag {
            self.drag = DragState::Dragging { deal };
        }
    }

    pub async fn on_drop(&mut self, stage: Stage) -> DropOutcome {
        let dragged = std::mem::take(&mut self.drag);
        let Some(deal_id) = dragged.deal() else {
            return DropOutcome::Ignored;
        };
        let Some(deal) = self.deal(deal_id) else {
            return DropOutcome::Refused(PipelineError::UnknownDeal(deal_id));
        };
        if !deal.stage.transition_to(stage).is_move() {
            return DropOutcome::Unchanged;
        }
        if let Err(err) = self.authorize(deal, Action::MoveStage) {
            debug!(deal = deal_id.0, error = %err, "drop refused");
            self.notifications.notify_failure(NOT_OWNER_MOVE);
            return DropOutcome::Refused(err.into());
        }
        self.update_stage(deal_id, stage).await
    }

    /// Drag and drop in one step, for keyboard moves and API callers.
    pub async fn move_deal(&mut self, deal_id: DealId, stage: Stage) -> DropOutcome {
        match self.on_drag_start(deal_id) {
            DragStart::Granted => self.on_drop(stage).await,
            DragStart::Refused(err) => DropOutcome::Refused(err),
        }
    }

    /// Persists a stage change for a deal whose ownership was already checked.
    ///
    /// The repository call runs on its own task: if this future is dropped the
    /// call still completes and its result is discarded.
    #[instrument(name = "crm.update_stage", skip_all, fields(deal = deal_id.0, stage = %new_stage))]
    pub async fn update_stage(&mut self, deal_id: DealId, new_stage: Stage) -> DropOutcome {
        let Some(index) = self.position(deal_id) else {
            self.notifications.notify_failure(STAGE_UPDATE_FAILED);
            return DropOutcome::Failed(PipelineError::UnknownDeal(deal_id));
        };
        let Some(actor) = self.users.current_user_id() else {
            self.notifications.notify_failure(NOT_OWNER_MOVE);
            return DropOutcome::Refused(
                AuthzError::Unauthenticated {
                    action: Action::MoveStage,
                    resource: format!("deal:{deal_id}"),
                }
                .into(),
            );
        };
        let from = self.deals[index].stage;

        match self.persist_stage(deal_id, new_stage, actor).await {
            Ok(updated) => {
                info!(%from, to = %updated.stage, "deal stage updated");
                let contact_id = updated.contact_id;
                self.deals[index] = updated.clone();
                self.recompute();
                let message = format!("Deal moved to {} stage", new_stage.label());
                self.notifications.notify_success(&message);
                self.record_activity(NewActivity::note(message, deal_id, contact_id))
                    .await;
                DropOutcome::Moved(updated)
            }
            Err(err) => {
                warn!(error = %err, "deal stage update failed");
                let message = match err {
                    PipelineError::Timeout(_) => STAGE_UPDATE_TIMED_OUT,
                    _ => STAGE_UPDATE_FAILED,
                };
                self.notifications.notify_failure(message);
                DropOutcome::Failed(err)
            }
        }
    }

    #[instrument(name = "crm.create_deal", skip_all)]
    pub async fn create_deal(&mut self, draft: DealDraft) -> PipelineResult<Deal> {
        let fields = draft.validate(Stage::Lead)?;
        let Some(owner) = self.users.current_user_id() else {
            return Err(AuthzError::Unauthenticated {
                action: Action::Edit,
                resource: "deal:new".into(),
            }
            .into());
        };
        let created = match self.repository.create(&owner, fields).await {
            Ok(deal) => deal,
            Err(err) => {
                warn!(error = %err, "deal create failed");
                self.notifications.notify_failure(SAVE_FAILED);
                return Err(err.into());
            }
        };
        info!(deal = created.id.0, "deal created");
        self.deals.push(created.clone());
        self.recompute();
        self.notifications.notify_success("Deal added successfully!");
        self.record_activity(NewActivity::note(
            format!("New deal created: {}", created.title),
            created.id,
            created.contact_id,
        ))
        .await;
        Ok(created)
    }

    #[instrument(name = "crm.edit_deal", skip_all, fields(deal = deal_id.0))]
    pub async fn edit_deal(&mut self, deal_id: DealId, draft: DealDraft) -> PipelineResult<Deal> {
        let index = self
            .position(deal_id)
            .ok_or(PipelineError::UnknownDeal(deal_id))?;
        if let Err(err) = self.authorize(&self.deals[index], Action::Edit) {
            self.notifications.notify_failure(NOT_OWNER_EDIT);
            return Err(err.into());
        }
        let fields = draft.validate(self.deals[index].stage)?;
        let updated = match self.repository.update(deal_id, fields).await {
            Ok(deal) => deal,
            Err(err) => {
                warn!(error = %err, "deal update failed");
                self.notifications.notify_failure(SAVE_FAILED);
                return Err(err.into());
            }
        };
        self.deals[index] = updated.clone();
        self.recompute();
        self.notifications.notify_success("Deal updated successfully!");
        self.record_activity(NewActivity::note(
            format!("Deal updated: {}", updated.title),
            updated.id,
            updated.contact_id,
        ))
        .await;
        Ok(updated)
    }

    #[instrument(name = "crm.delete_deal", skip_all, fields(deal = deal_id.0))]
    pub async fn delete_deal(&mut self, deal_id: DealId) -> PipelineResult<()> {
        let index = self
            .position(deal_id)
            .ok_or(PipelineError::UnknownDeal(deal_id))?;
        if let Err(err) = self.authorize(&self.deals[index], Action::Delete) {
            self.notifications.notify_failure(NOT_OWNER_DELETE);
            return Err(err.into());
        }
        if let Err(err) = self.repository.delete(deal_id).await {
            warn!(error = %err, "deal delete failed");
            self.notifications.notify_failure(DELETE_FAILED);
            return Err(err.into());
        }
        self.deals.remove(index);
        self.recompute();
        if self.drag.deal() == Some(deal_id) {
            self.drag = DragState::Idle;
        }
        self.notifications.notify_success("Deal deleted successfully!");
        Ok(())
    }

    async fn persist_stage(
        &self,
        deal_id: DealId,
        stage: Stage,
        actor: UserId,
    ) -> PipelineResult<Deal> {
        let repository = Arc::clone(&self.repository);
        let call =
            tokio::spawn(async move { repository.update_stage(deal_id, stage, &actor).await });
        let limit = self.config.stage_update_timeout;
        match tokio::time::timeout(limit, call).await {
            Err(_) => Err(PipelineError::Timeout(limit)),
            Ok(Err(join)) => {
                warn!(error = %join, "stage update task did not finish");
                Err(PipelineError::Aborted)
            }
            Ok(Ok(result)) => result.map_err(PipelineError::from),
        }
    }

    async fn record_activity(&self, activity: NewActivity) {
        let Some(log) = &self.activity else {
            return;
        };
        if let Err(err) = log.record(activity).await {
            warn!(error = %err, "activity not recorded");
        }
    }

    fn position(&self, deal_id: DealId) -> Option<usize> {
        self.deals.iter().position(|deal| deal.id == deal_id)
    }

    fn recompute(&mut self) {
        self.aggregates = stage_aggregates(&self.deals);
    }
}
