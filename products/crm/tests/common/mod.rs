#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use products_crm::{
    BufferedNotifications, ContactId, ControllerConfig, CurrentUserProvider, Deal, DealId,
    Stage, StageTransitionController, UserId,
    memory::{InMemoryActivityLog, InMemoryDealRepository},
};

pub fn deal(id: i32, owner: &str, stage: Stage, value_cents: i64) -> Deal {
    Deal {
        id: DealId(id),
        title: format!("Deal {id}"),
        value_cents,
        stage,
        probability: 50,
        expected_close: NaiveDate::from_ymd_opt(2026, 12, 15).unwrap(),
        notes: String::new(),
        owner: UserId::new(owner),
        contact_id: ContactId(100 + id),
    }
}

/// Identity that tests can swap mid-gesture to simulate a session change.
#[derive(Default)]
pub struct SwitchableUser {
    current: Mutex<Option<UserId>>,
}

impl SwitchableUser {
    pub fn signed_in(user: &str) -> Self {
        Self {
            current: Mutex::new(Some(UserId::new(user))),
        }
    }

    pub fn switch_to(&self, user: Option<&str>) {
        *self.current.lock().unwrap() = user.map(UserId::new);
    }
}

impl CurrentUserProvider for SwitchableUser {
    fn current_user_id(&self) -> Option<UserId> {
        self.current.lock().unwrap().clone()
    }
}

pub struct Board {
    pub controller: StageTransitionController,
    pub repository: Arc<InMemoryDealRepository>,
    pub notices: Arc<BufferedNotifications>,
    pub activity: Arc<InMemoryActivityLog>,
    pub user: Arc<SwitchableUser>,
}

impl Board {
    pub async fn load(user: &str, deals: Vec<Deal>) -> Self {
        Self::load_with(user, deals, ControllerConfig::default()).await
    }

    pub async fn load_with(user: &str, deals: Vec<Deal>, config: ControllerConfig) -> Self {
        let repository = Arc::new(InMemoryDealRepository::with_deals(deals));
        let notices = Arc::new(BufferedNotifications::new());
        let activity = Arc::new(InMemoryActivityLog::new());
        let user = Arc::new(SwitchableUser::signed_in(user));
        let mut controller =
            StageTransitionController::new(repository.clone(), user.clone(), notices.clone())
                .with_activity_log(activity.clone())
                .with_config(config);
        controller.reload().await.unwrap();
        Self {
            controller,
            repository,
            notices,
            activity,
            user,
        }
    }

    pub fn stage_of(&self, id: i32) -> Stage {
        self.controller.deal(DealId(id)).unwrap().stage
    }

    /// Aggregates must always equal a fresh recomputation over the board.
    pub fn assert_aggregates_consistent(&self) {
        let expected = products_crm::stage_aggregates(self.controller.deals());
        assert_eq!(self.controller.aggregates(), expected.as_slice());
    }
}

pub fn sample_deals() -> Vec<Deal> {
    vec![
        deal(7, "u1", Stage::Lead, 500_000),
        deal(8, "u1", Stage::Lead, 120_000),
        deal(9, "u1", Stage::Proposal, 300_000),
        deal(10, "u2", Stage::Qualified, 75_000),
        deal(11, "u2", Stage::Closed, 900_000),
    ]
}
