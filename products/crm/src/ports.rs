//! Collaborators the board talks to. Implementations live outside this crate
//! (`platform-db`) or in [`crate::memory`] for tests and demos.

use async_trait::async_trait;

use crate::{
    activity::NewActivity,
    deal::{Deal, DealFields, DealId, UserId},
    error::RepositoryResult,
    stage::Stage,
};

/// Source of truth for deal records.
#[async_trait]
pub trait DealRepository: Send + Sync {
    async fn list_all(&self) -> RepositoryResult<Vec<Deal>>;

    async fn get(&self, id: DealId) -> RepositoryResult<Option<Deal>>;

    async fn create(&self, owner: &UserId, fields: DealFields) -> RepositoryResult<Deal>;

    async fn update(&self, id: DealId, fields: DealFields) -> RepositoryResult<Deal>;

    /// Persists a stage change. Implementations should refuse actors that do
    /// not own the deal with [`RepositoryError::Forbidden`](crate::RepositoryError::Forbidden).
    async fn update_stage(
        &self,
        id: DealId,
        stage: Stage,
        actor: &UserId,
    ) -> RepositoryResult<Deal>;

    async fn delete(&self, id: DealId) -> RepositoryResult<()>;
}

#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, activity: NewActivity) -> RepositoryResult<()>;
}

/// Yields the acting user. Stable for a session, but may become `None`
/// when the session ends.
pub trait CurrentUserProvider: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;
}

/// Fire-and-forget user notices.
pub trait NotificationSink: Send + Sync {
    fn notify_success(&self, message: &str);
    fn notify_failure(&self, message: &str);
}

impl CurrentUserProvider for Option<UserId> {
    fn current_user_id(&self) -> Option<UserId> {
        self.clone()
    }
}

impl CurrentUserProvider for UserId {
    fn current_user_id(&self) -> Option<UserId> {
        Some(self.clone())
    }
}
