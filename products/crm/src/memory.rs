//! Process-local collaborators for tests.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    activity::NewActivity,
    deal::{Deal, DealFields, DealId, UserId},
    error::{RepositoryError, RepositoryResult},
    ports::{ActivityLog, DealRepository},
    stage::Stage,
};

#[derive(Debug, Default)]
pub struct InMemoryDealRepository {
    deals: Mutex<BTreeMap<DealId, Deal>>,
    next_id: AtomicI32,
    offline: AtomicBool,
    rejection: Mutex<Option<RepositoryError>>,
    latency: Mutex<Option<Duration>>,
    stage_updates: AtomicUsize,
    completed_stage_updates: AtomicUsize,
}

impl InMemoryDealRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deals(deals: impl IntoIterator<Item = Deal>) -> Self {
        let map: BTreeMap<DealId, Deal> = deals.into_iter().map(|deal| (deal.id, deal)).collect();
        let next = map.keys().map(|id| id.0).max().unwrap_or(0);
        Self {
            deals: Mutex::new(map),
            next_id: AtomicI32::new(next),
            ..Self::default()
        }
    }

    /// Every call fails with [`RepositoryError::Unavailable`] while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// The next mutation fails with `err`.
    pub async fn reject_next(&self, err: RepositoryError) {
        *self.rejection.lock().await = Some(err);
    }

    /// Delay applied before each stage update is persisted.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    /// Number of `update_stage` calls received.
    pub fn stage_update_calls(&self) -> usize {
        self.stage_updates.load(Ordering::SeqCst)
    }

    /// Number of `update_stage` calls that ran to completion.
    pub fn completed_stage_updates(&self) -> usize {
        self.completed_stage_updates.load(Ordering::SeqCst)
    }

    pub async fn stored(&self, id: DealId) -> Option<Deal> {
        self.deals.lock().await.get(&id).cloned()
    }

    fn ensure_online(&self) -> RepositoryResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable("in-memory store offline".into()))
        } else {
            Ok(())
        }
    }

    async fn check_mutation(&self) -> RepositoryResult<()> {
        self.ensure_online()?;
        match self.rejection.lock().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn apply_fields(deal: &mut Deal, fields: DealFields) {
    deal.title = fields.title;
    deal.contact_id = fields.contact_id;
    deal.value_cents = fields.value_cents;
    deal.stage = fields.stage;
    deal.probability = fields.probability;
    deal.expected_close = fields.expected_close;
    deal.notes = fields.notes;
}

#[async_trait]
impl DealRepository for InMemoryDealRepository {
    async fn list_all(&self) -> RepositoryResult<Vec<Deal>> {
        self.ensure_online()?;
        Ok(self.deals.lock().await.values().cloned().collect())
    }

    async fn get(&self, id: DealId) -> RepositoryResult<Option<Deal>> {
        self.ensure_online()?;
        Ok(self.deals.lock().await.get(&id).cloned())
    }

    async fn create(&self, owner: &UserId, fields: DealFields) -> RepositoryResult<Deal> {
        self.check_mutation().await?;
        let id = DealId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let deal = Deal {
            id,
            title: fields.title,
            value_cents: fields.value_cents,
            stage: fields.stage,
            probability: fields.probability,
            expected_close: fields.expected_close,
            notes: fields.notes,
            owner: owner.clone(),
            contact_id: fields.contact_id,
        };
        self.deals.lock().await.insert(id, deal.clone());
        Ok(deal)
    }

    async fn update(&self, id: DealId, fields: DealFields) -> RepositoryResult<Deal> {
        self.check_mutation().await?;
        let mut deals = self.deals.lock().await;
        let deal = deals.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        apply_fields(deal, fields);
        Ok(deal.clone())
    }

    async fn update_stage(
        &self,
        id: DealId,
        stage: Stage,
        actor: &UserId,
    ) -> RepositoryResult<Deal> {
        self.stage_updates.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().await;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        self.check_mutation().await?;
        let mut deals = self.deals.lock().await;
        let deal = deals.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        if !deal.is_owned_by(actor) {
            return Err(RepositoryError::Forbidden(id));
        }
        deal.stage = stage;
        self.completed_stage_updates.fetch_add(1, Ordering::SeqCst);
        Ok(deal.clone())
    }

    async fn delete(&self, id: DealId) -> RepositoryResult<()> {
        self.check_mutation().await?;
        self.deals
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryActivityLog {
    entries: Mutex<Vec<NewActivity>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<NewActivity> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn record(&self, activity: NewActivity) -> RepositoryResult<()> {
        self.entries.lock().await.push(activity);
        Ok(())
    }
}
