//! CRM pipeline: deals moving through five fixed stages on a shared board.

pub mod activity;
pub mod aggregate;
pub mod controller;
pub mod deal;
pub mod error;
pub mod memory;
pub mod notify;
pub mod ports;
pub mod stage;
pub mod summary;

pub use activity::{ActivityKind, NewActivity};
pub use aggregate::{StageAggregate, stage_aggregates};
pub use controller::{ControllerConfig, DragStart, DragState, DropOutcome, StageTransitionController};
pub use deal::{
    ContactId, Deal, DealDraft, DealFields, DealId, MAX_VALUE_CENTS, UserId, ValidationErrors,
};
pub use error::{PipelineError, PipelineResult, RepositoryError, RepositoryResult};
pub use notify::{BufferedNotifications, Notification, NotificationLevel, TracingNotifications};
pub use ports::{ActivityLog, CurrentUserProvider, DealRepository, NotificationSink};
pub use stage::{InvalidStage, Stage, Transition};
pub use summary::PipelineSummary;
