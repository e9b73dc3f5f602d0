use async_trait::async_trait;
use chrono::Utc;
use entity::{activity, deal};
use products_crm::{
    ActivityKind, ActivityLog, ContactId, Deal, DealFields, DealId, DealRepository, MAX_VALUE_CENTS,
    NewActivity, RepositoryError, RepositoryResult, Stage, UserId,
};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DatabaseConnection, DbErr, EntityTrait, QueryOrder,
    TransactionTrait,
};
use tracing::{debug, instrument};

/// Deal records stored through SeaORM.
///
/// Stage updates re-check ownership inside the transaction, so a client that
/// skips its own guard still cannot move somebody else's deal.
#[derive(Clone, Debug)]
pub struct SeaDealRepository {
    db: DatabaseConnection,
}

impl SeaDealRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DealRepository for SeaDealRepository {
    async fn list_all(&self) -> RepositoryResult<Vec<Deal>> {
        deal::Entity::find()
            .order_by_asc(deal::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(deal_from_row)
            .collect()
    }

    async fn get(&self, id: DealId) -> RepositoryResult<Option<Deal>> {
        deal::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(store_error)?
            .map(deal_from_row)
            .transpose()
    }

    #[instrument(name = "db.deal.create", skip_all, fields(owner = %owner))]
    async fn create(&self, owner: &UserId, fields: DealFields) -> RepositoryResult<Deal> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut active = deal::ActiveModel {
            owner_id: Set(owner.as_str().to_string()),
            created_at: Set(now),
            ..Default::default()
        };
        apply_fields(&mut active, fields, now);
        let model = active.insert(&self.db).await.map_err(store_error)?;
        debug!(deal = model.id, "deal inserted");
        deal_from_row(model)
    }

    #[instrument(name = "db.deal.update", skip_all, fields(deal = id.0))]
    async fn update(&self, id: DealId, fields: DealFields) -> RepositoryResult<Deal> {
        let existing = deal::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(store_error)?
            .ok_or(RepositoryError::NotFound(id))?;
        let mut active: deal::ActiveModel = existing.into();
        apply_fields(&mut active, fields, Utc::now().into());
        let model = active.update(&self.db).await.map_err(store_error)?;
        deal_from_row(model)
    }

    #[instrument(name = "db.deal.update_stage", skip_all, fields(deal = id.0, stage = %stage))]
    async fn update_stage(
        &self,
        id: DealId,
        stage: Stage,
        actor: &UserId,
    ) -> RepositoryResult<Deal> {
        let txn = self.db.begin().await.map_err(store_error)?;
        let existing = deal::Entity::find_by_id(id.0)
            .one(&txn)
            .await
            .map_err(store_error)?
            .ok_or(RepositoryError::NotFound(id))?;
        if existing.owner_id != actor.as_str() {
            debug!(actor = %actor, "stage update refused for non-owner");
            return Err(RepositoryError::Forbidden(id));
        }

        let mut active: deal::ActiveModel = existing.into();
        active.stage = Set(row_stage(stage));
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await.map_err(store_error)?;
        txn.commit().await.map_err(store_error)?;
        deal_from_row(updated)
    }

    #[instrument(name = "db.deal.delete", skip_all, fields(deal = id.0))]
    async fn delete(&self, id: DealId) -> RepositoryResult<()> {
        let result = deal::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .map_err(store_error)?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }
}

/// Activity timeline rows.
#[derive(Clone, Debug)]
pub struct SeaActivityLog {
    db: DatabaseConnection,
}

impl SeaActivityLog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityLog for SeaActivityLog {
    async fn record(&self, entry: NewActivity) -> RepositoryResult<()> {
        let row = activity::ActiveModel {
            kind: Set(row_kind(entry.kind)),
            description: Set(entry.description),
            deal_id: Set(entry.deal_id.map(|id| id.0)),
            contact_id: Set(entry.contact_id.map(|id| id.0)),
            occurred_at: Set(entry.occurred_at.into()),
            ..Default::default()
        };
        activity::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

fn apply_fields(active: &mut deal::ActiveModel, fields: DealFields, now: DateTimeWithTimeZone) {
    active.title = Set(fields.title);
    active.value_cents = Set(fields.value_cents);
    active.stage = Set(row_stage(fields.stage));
    active.probability = Set(i16::from(fields.probability));
    active.expected_close = Set(fields.expected_close);
    active.notes = Set(fields.notes);
    active.contact_id = Set(fields.contact_id.0);
    active.updated_at = Set(now);
}

fn deal_from_row(model: deal::Model) -> RepositoryResult<Deal> {
    if !(0..=MAX_VALUE_CENTS).contains(&model.value_cents) {
        return Err(RepositoryError::Corrupt(format!(
            "deal {} has out-of-range value {}",
            model.id, model.value_cents
        )));
    }
    let probability = u8::try_from(model.probability)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| {
            RepositoryError::Corrupt(format!(
                "deal {} has probability {}",
                model.id, model.probability
            ))
        })?;
    Ok(Deal {
        id: DealId(model.id),
        title: model.title,
        value_cents: model.value_cents,
        stage: domain_stage(model.stage),
        probability,
        expected_close: model.expected_close,
        notes: model.notes,
        owner: UserId(model.owner_id),
        contact_id: ContactId(model.contact_id),
    })
}

fn row_stage(stage: Stage) -> deal::Stage {
    match stage {
        Stage::Lead => deal::Stage::Lead,
        Stage::Qualified => deal::Stage::Qualified,
        Stage::Proposal => deal::Stage::Proposal,
        Stage::Negotiation => deal::Stage::Negotiation,
        Stage::Closed => deal::Stage::Closed,
    }
}

fn domain_stage(stage: deal::Stage) -> Stage {
    match stage {
        deal::Stage::Lead => Stage::Lead,
        deal::Stage::Qualified => Stage::Qualified,
        deal::Stage::Proposal => Stage::Proposal,
        deal::Stage::Negotiation => Stage::Negotiation,
        deal::Stage::Closed => Stage::Closed,
    }
}

fn row_kind(kind: ActivityKind) -> activity::Kind {
    match kind {
        ActivityKind::Call => activity::Kind::Call,
        ActivityKind::Email => activity::Kind::Email,
        ActivityKind::Meeting => activity::Kind::Meeting,
        ActivityKind::Note => activity::Kind::Note,
    }
}

fn store_error(err: DbErr) -> RepositoryError {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => {
            RepositoryError::Unavailable(err.to_string())
        }
        other => RepositoryError::Rejected(other.to_string()),
    }
}
