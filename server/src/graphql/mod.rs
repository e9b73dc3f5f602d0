mod errors;
mod types;

use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, ErrorExtensions, Object, Result as GqlResult, Schema,
};
use chrono::{NaiveDate, Utc};
use platform_db::{SeaActivityLog, SeaDealRepository};
use products_crm::{
    BufferedNotifications, ControllerConfig, DealId, DropOutcome, PipelineError, Stage,
    StageTransitionController, UserId,
};
use sea_orm::DatabaseConnection;
use tracing::{info, instrument};

use errors::api_error;
use types::{
    DealInput, DealObject, MoveDealPayload, MoveOutcome, NotificationObject, PipelineBoard,
    StageAggregateObject, StageColumn, StageInfo, StageValue, SummaryObject,
};

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Shared state handed to every resolver.
#[derive(Clone)]
pub struct GraphqlData {
    pub db: DatabaseConnection,
    pub controller: ControllerConfig,
}

/// Identity of the caller, attached to each request by the HTTP layer.
#[derive(Clone, Debug, Default)]
pub struct RequestUser(pub Option<UserId>);

impl RequestUser {
    pub fn signed_in(id: impl Into<String>) -> Self {
        Self(Some(UserId::new(id)))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(data)
        .finish()
}

/// SDL of the schema, for `schema:print`.
pub fn schema_sdl() -> String {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .finish()
        .sdl()
}

/// A board for one request: loaded from the database, acting as the caller.
struct RequestBoard {
    controller: StageTransitionController,
    notices: Arc<BufferedNotifications>,
}

impl RequestBoard {
    fn open(ctx: &Context<'_>) -> GqlResult<Self> {
        let data = ctx.data::<GraphqlData>()?;
        let user = ctx
            .data_opt::<RequestUser>()
            .cloned()
            .unwrap_or_default();
        let notices = Arc::new(BufferedNotifications::new());
        let controller = StageTransitionController::new(
            Arc::new(SeaDealRepository::new(data.db.clone())),
            Arc::new(user.0),
            notices.clone(),
        )
        .with_activity_log(Arc::new(SeaActivityLog::new(data.db.clone())))
        .with_config(data.controller.clone());
        Ok(Self {
            controller,
            notices,
        })
    }

    async fn load(ctx: &Context<'_>) -> GqlResult<Self> {
        let mut board = Self::open(ctx)?;
        board
            .controller
            .reload()
            .await
            .map_err(|err| api_error(err).extend())?;
        Ok(board)
    }

    fn deal_object(&self, id: DealId) -> Option<DealObject> {
        self.controller
            .deal(id)
            .map(|deal| DealObject::new(deal, self.controller.can_drag(deal)))
    }

    fn aggregates(&self) -> Vec<StageAggregateObject> {
        self.controller
            .aggregates()
            .iter()
            .copied()
            .map(StageAggregateObject::from)
            .collect()
    }

    fn notifications(&self) -> Vec<NotificationObject> {
        self.notices
            .take()
            .into_iter()
            .map(NotificationObject::from)
            .collect()
    }
}

fn coded(err: PipelineError) -> async_graphql::Error {
    api_error(err).extend()
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The five pipeline stages in board order.
    async fn stages(&self) -> Vec<StageInfo> {
        Stage::ALL.iter().copied().map(StageInfo::from).collect()
    }

    #[instrument(name = "graphql.pipeline_board", skip_all)]
    async fn pipeline_board(&self, ctx: &Context<'_>) -> GqlResult<PipelineBoard> {
        let board = RequestBoard::load(ctx).await?;
        let controller = &board.controller;
        let columns = Stage::ALL
            .iter()
            .map(|&stage| {
                let aggregate = controller.aggregate(stage);
                StageColumn {
                    stage: stage.into(),
                    label: stage.label().to_string(),
                    count: aggregate.count as i32,
                    total_value_cents: aggregate.total_cents,
                    deals: controller
                        .stage_deals(stage)
                        .map(|deal| DealObject::new(deal, controller.can_drag(deal)))
                        .collect(),
                }
            })
            .collect();
        Ok(PipelineBoard { columns })
    }

    #[instrument(name = "graphql.pipeline_summary", skip_all)]
    async fn pipeline_summary(
        &self,
        ctx: &Context<'_>,
        today: Option<NaiveDate>,
    ) -> GqlResult<SummaryObject> {
        let board = RequestBoard::load(ctx).await?;
        let today = today.unwrap_or_else(|| Utc::now().date_naive());
        Ok(board.controller.summary(today).into())
    }

    #[instrument(name = "graphql.deal", skip_all, fields(deal = id))]
    async fn deal(&self, ctx: &Context<'_>, id: i32) -> GqlResult<Option<DealObject>> {
        let board = RequestBoard::load(ctx).await?;
        Ok(board.deal_object(DealId(id)))
    }

    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Moves a deal to another stage. Refusals and store failures come back
    /// in the payload together with the notices the board would show.
    #[instrument(name = "graphql.move_deal_stage", skip_all, fields(deal = id))]
    async fn move_deal_stage(
        &self,
        ctx: &Context<'_>,
        id: i32,
        stage: StageValue,
    ) -> GqlResult<MoveDealPayload> {
        let mut board = RequestBoard::open(ctx)?;
        if board.controller.reload().await.is_err() {
            return Ok(MoveDealPayload {
                outcome: MoveOutcome::Failed,
                deal: None,
                aggregates: board.aggregates(),
                notifications: board.notifications(),
            });
        }
        let deal_id = DealId(id);
        let outcome = board.controller.move_deal(deal_id, stage.into()).await;
        if let DropOutcome::Moved(deal) = &outcome {
            info!(deal = deal.id.0, stage = %deal.stage, "deal moved via api");
        }
        Ok(MoveDealPayload {
            outcome: MoveOutcome::of(&outcome),
            deal: board.deal_object(deal_id),
            aggregates: board.aggregates(),
            notifications: board.notifications(),
        })
    }

    #[instrument(name = "graphql.create_deal", skip_all)]
    async fn create_deal(&self, ctx: &Context<'_>, input: DealInput) -> GqlResult<DealObject> {
        let mut board = RequestBoard::load(ctx).await?;
        let created = board
            .controller
            .create_deal(input.into())
            .await
            .map_err(coded)?;
        Ok(DealObject::new(&created, board.controller.can_drag(&created)))
    }

    #[instrument(name = "graphql.update_deal", skip_all, fields(deal = id))]
    async fn update_deal(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: DealInput,
    ) -> GqlResult<DealObject> {
        let mut board = RequestBoard::load(ctx).await?;
        let updated = board
            .controller
            .edit_deal(DealId(id), input.into())
            .await
            .map_err(coded)?;
        Ok(DealObject::new(&updated, board.controller.can_drag(&updated)))
    }

    #[instrument(name = "graphql.delete_deal", skip_all, fields(deal = id))]
    async fn delete_deal(&self, ctx: &Context<'_>, id: i32) -> GqlResult<bool> {
        let mut board = RequestBoard::load(ctx).await?;
        board
            .controller
            .delete_deal(DealId(id))
            .await
            .map_err(coded)?;
        Ok(true)
    }
}
