mod common;

use std::time::Duration;

use chrono::NaiveDate;
use common::{Board, deal, sample_deals};
use platform_authz::AuthzError;
use products_crm::{
    ContactId, ControllerConfig, DealDraft, DealId, DragStart, DragState, DropOutcome,
    NotificationLevel, PipelineError, RepositoryError, Stage,
};

#[tokio::test]
async fn owner_moves_deal_and_aggregates_follow() {
    let mut board = Board::load("u1", sample_deals()).await;
    let lead_before = board.controller.aggregate(Stage::Lead);
    let qualified_before = board.controller.aggregate(Stage::Qualified);

    assert_eq!(board.controller.on_drag_start(DealId(7)), DragStart::Granted);
    assert_eq!(
        board.controller.drag_state(),
        DragState::Dragging { deal: DealId(7) }
    );
    board.controller.on_drag_over(Stage::Proposal);
    board.controller.on_drag_over(Stage::Qualified);
    assert_eq!(board.controller.highlighted_stage(), Some(Stage::Qualified));

    let outcome = board.controller.on_drop(Stage::Qualified).await;
    let moved = outcome.moved().expect("deal moved");
    assert_eq!(moved.stage, Stage::Qualified);

    assert_eq!(board.stage_of(7), Stage::Qualified);
    let lead_after = board.controller.aggregate(Stage::Lead);
    let qualified_after = board.controller.aggregate(Stage::Qualified);
    assert_eq!(lead_after.count, lead_before.count - 1);
    assert_eq!(lead_after.total_cents, lead_before.total_cents - 500_000);
    assert_eq!(qualified_after.count, qualified_before.count + 1);
    assert_eq!(qualified_after.total_cents, qualified_before.total_cents + 500_000);
    board.assert_aggregates_consistent();

    assert_eq!(board.controller.drag_state(), DragState::Idle);
    assert_eq!(board.repository.stage_update_calls(), 1);
    let stored = board.repository.stored(DealId(7)).await.unwrap();
    assert_eq!(stored.stage, Stage::Qualified);

    let notices = board.notices.snapshot();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NotificationLevel::Success);
    assert_eq!(notices[0].message, "Deal moved to Qualified stage");

    let activity = board.activity.entries().await;
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].deal_id, Some(DealId(7)));
    assert_eq!(activity[0].contact_id, Some(ContactId(107)));
}

#[tokio::test]
async fn non_owner_cannot_start_a_drag() {
    let mut board = Board::load("u2", sample_deals()).await;
    let before = board.controller.aggregates().to_vec();

    let start = board.controller.on_drag_start(DealId(7));
    assert!(matches!(
        start,
        DragStart::Refused(PipelineError::Authorization(AuthzError::Denied { .. }))
    ));
    assert_eq!(board.controller.drag_state(), DragState::Idle);
    assert!(!board.controller.can_drag(board.controller.deal(DealId(7)).unwrap()));

    // a drop without a granted drag does nothing
    assert_eq!(board.controller.on_drop(Stage::Qualified).await, DropOutcome::Ignored);

    assert_eq!(board.repository.stage_update_calls(), 0);
    assert_eq!(board.controller.aggregates(), before.as_slice());
    assert_eq!(board.stage_of(7), Stage::Lead);
    let notices = board.notices.snapshot();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "You can only move deals that you own");
}

#[tokio::test]
async fn dropping_on_current_stage_is_a_no_op() {
    let mut board = Board::load("u1", sample_deals()).await;
    let before = board.controller.aggregates().to_vec();

    assert_eq!(board.controller.on_drag_start(DealId(9)), DragStart::Granted);
    board.controller.on_drag_over(Stage::Proposal);
    let outcome = board.controller.on_drop(Stage::Proposal).await;

    assert_eq!(outcome, DropOutcome::Unchanged);
    assert_eq!(board.repository.stage_update_calls(), 0);
    assert!(board.notices.snapshot().is_empty());
    assert_eq!(board.controller.aggregates(), before.as_slice());
    assert_eq!(board.controller.drag_state(), DragState::Idle);
}

#[tokio::test]
async fn rejected_update_leaves_board_untouched() {
    let mut board = Board::load("u1", sample_deals()).await;
    let before = board.controller.aggregates().to_vec();
    board
        .repository
        .reject_next(RepositoryError::Rejected("validation failed upstream".into()))
        .await;

    board.controller.on_drag_start(DealId(7));
    board.controller.on_drag_over(Stage::Negotiation);
    let outcome = board.controller.on_drop(Stage::Negotiation).await;

    assert!(matches!(
        outcome,
        DropOutcome::Failed(PipelineError::Repository(RepositoryError::Rejected(_)))
    ));
    assert_eq!(board.stage_of(7), Stage::Lead);
    assert_eq!(board.controller.aggregates(), before.as_slice());
    assert_eq!(board.controller.drag_state(), DragState::Idle);
    assert_eq!(board.notices.failures(), 1);
    assert_eq!(board.notices.snapshot().len(), 1);
    assert!(board.activity.entries().await.is_empty());
}

#[tokio::test]
async fn unavailable_store_is_reported_once() {
    let mut board = Board::load("u1", sample_deals()).await;
    board.repository.set_offline(true);

    let outcome = board.controller.move_deal(DealId(8), Stage::Closed).await;

    assert!(matches!(
        outcome,
        DropOutcome::Failed(PipelineError::Repository(RepositoryError::Unavailable(_)))
    ));
    assert_eq!(board.stage_of(8), Stage::Lead);
    assert_eq!(board.notices.failures(), 1);
    assert_eq!(board.notices.snapshot()[0].message, "Failed to update deal stage");

    // the board stays usable once the store is back
    board.repository.set_offline(false);
    let retry = board.controller.move_deal(DealId(8), Stage::Closed).await;
    assert!(retry.moved().is_some());
    assert_eq!(board.stage_of(8), Stage::Closed);
}

#[tokio::test]
async fn ownership_is_rechecked_at_drop() {
    let mut board = Board::load("u1", sample_deals()).await;
    assert_eq!(board.controller.on_drag_start(DealId(7)), DragStart::Granted);
    board.controller.on_drag_over(Stage::Proposal);

    board.user.switch_to(None);
    let outcome = board.controller.on_drop(Stage::Proposal).await;

    assert!(matches!(
        outcome,
        DropOutcome::Refused(PipelineError::Authorization(AuthzError::Unauthenticated { .. }))
    ));
    assert_eq!(board.repository.stage_update_calls(), 0);
    assert_eq!(board.stage_of(7), Stage::Lead);
    assert_eq!(board.controller.drag_state(), DragState::Idle);
}

#[tokio::test]
async fn store_refuses_moves_by_non_owners() {
    let mut board = Board::load("u2", sample_deals()).await;

    // skip the client-side guard to exercise the store's own check
    let outcome = board.controller.update_stage(DealId(7), Stage::Qualified).await;

    assert!(matches!(
        outcome,
        DropOutcome::Failed(PipelineError::Repository(RepositoryError::Forbidden(DealId(7))))
    ));
    assert_eq!(board.stage_of(7), Stage::Lead);
    assert_eq!(board.notices.failures(), 1);
}

#[tokio::test]
async fn drag_leave_clears_highlight_but_keeps_drag() {
    let mut board = Board::load("u1", sample_deals()).await;
    board.controller.on_drag_start(DealId(7));
    board.controller.on_drag_over(Stage::Closed);
    board.controller.on_drag_leave();

    assert_eq!(board.controller.highlighted_stage(), None);
    assert_eq!(board.controller.dragged_deal().map(|d| d.id), Some(DealId(7)));

    let outcome = board.controller.on_drop(Stage::Closed).await;
    assert!(outcome.moved().is_some());
    assert_eq!(board.controller.dragged_deal(), None);
}

#[tokio::test]
async fn unknown_deal_cannot_be_dragged() {
    let mut board = Board::load("u1", sample_deals()).await;
    assert_eq!(
        board.controller.on_drag_start(DealId(404)),
        DragStart::Refused(PipelineError::UnknownDeal(DealId(404)))
    );
    assert!(board.notices.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_store_times_out_without_mutation() {
    let config = ControllerConfig {
        stage_update_timeout: Duration::from_secs(1),
    };
    let mut board = Board::load_with("u1", sample_deals(), config).await;
    board
        .repository
        .set_latency(Some(Duration::from_secs(60)))
        .await;

    let outcome = board.controller.move_deal(DealId(7), Stage::Qualified).await;

    assert_eq!(
        outcome,
        DropOutcome::Failed(PipelineError::Timeout(Duration::from_secs(1)))
    );
    assert_eq!(board.stage_of(7), Stage::Lead);
    assert_eq!(board.controller.drag_state(), DragState::Idle);
    let notices = board.notices.snapshot();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "Deal stage update timed out");
}

#[tokio::test(start_paused = true)]
async fn teardown_lets_inflight_update_finish() {
    let mut board = Board::load("u1", sample_deals()).await;
    board
        .repository
        .set_latency(Some(Duration::from_secs(5)))
        .await;

    let abandoned = tokio::time::timeout(
        Duration::from_secs(1),
        board.controller.move_deal(DealId(7), Stage::Qualified),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(board.repository.completed_stage_updates(), 1);
    let stored = board.repository.stored(DealId(7)).await.unwrap();
    assert_eq!(stored.stage, Stage::Qualified);
    // the late result is discarded, not applied to the board
    assert_eq!(board.stage_of(7), Stage::Lead);
    assert!(board.notices.snapshot().is_empty());

    board.controller.reload().await.unwrap();
    assert_eq!(board.stage_of(7), Stage::Qualified);
    board.assert_aggregates_consistent();
}

#[tokio::test]
async fn failed_reload_keeps_previous_board() {
    let mut board = Board::load("u1", sample_deals()).await;
    board.repository.set_offline(true);

    let err = board.controller.reload().await.unwrap_err();

    assert!(matches!(err, PipelineError::Repository(RepositoryError::Unavailable(_))));
    assert_eq!(board.controller.deals().len(), 5);
    assert_eq!(board.notices.snapshot()[0].message, "Failed to load pipeline data");
}

#[tokio::test]
async fn aggregates_stay_consistent_across_moves() {
    let mut board = Board::load("u1", sample_deals()).await;
    let moves = [
        (7, Stage::Qualified),
        (8, Stage::Closed),
        (9, Stage::Lead),
        (7, Stage::Negotiation),
        (9, Stage::Lead),
    ];
    for (id, stage) in moves {
        board.controller.move_deal(DealId(id), stage).await;
        board.assert_aggregates_consistent();
    }
    let total: i64 = board.controller.aggregates().iter().map(|a| a.total_cents).sum();
    assert_eq!(total, sample_deals().iter().map(|d| d.value_cents).sum::<i64>());
}

fn draft(title: &str) -> DealDraft {
    DealDraft {
        title: title.into(),
        contact_id: Some(ContactId(42)),
        value_cents: Some(250_000),
        stage: None,
        probability: Some(20),
        expected_close: NaiveDate::from_ymd_opt(2026, 11, 1),
        notes: Some("intro call booked".into()),
    }
}

#[tokio::test]
async fn created_deal_lands_in_lead_owned_by_creator() {
    let mut board = Board::load("u1", sample_deals()).await;
    let lead_before = board.controller.aggregate(Stage::Lead);

    let created = board.controller.create_deal(draft("Support renewal")).await.unwrap();

    assert_eq!(created.stage, Stage::Lead);
    assert_eq!(created.owner.as_str(), "u1");
    assert_eq!(board.controller.aggregate(Stage::Lead).count, lead_before.count + 1);
    assert!(board.controller.can_drag(&created));
    let activity = board.activity.entries().await;
    assert_eq!(activity[0].description, "New deal created: Support renewal");
}

#[tokio::test]
async fn invalid_draft_never_reaches_the_store() {
    let mut board = Board::load("u1", sample_deals()).await;
    let mut input = draft("");
    input.value_cents = Some(0);

    let err = board.controller.create_deal(input).await.unwrap_err();

    let PipelineError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.get("title").is_some());
    assert!(errors.get("value").is_some());
    assert_eq!(board.controller.deals().len(), 5);
    assert!(board.notices.snapshot().is_empty());
}

#[tokio::test]
async fn edits_and_deletes_require_ownership() {
    let mut board = Board::load("u1", sample_deals()).await;

    let err = board
        .controller
        .edit_deal(DealId(10), draft("Hijacked"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Authorization(AuthzError::Denied { .. })));
    let err = board.controller.delete_deal(DealId(11)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Authorization(_)));
    assert_eq!(board.controller.deals().len(), 5);

    let mut own = DealDraft::from(board.controller.deal(DealId(9)).unwrap());
    own.value_cents = Some(450_000);
    let edited = board.controller.edit_deal(DealId(9), own).await.unwrap();
    assert_eq!(edited.value_cents, 450_000);
    assert_eq!(board.controller.aggregate(Stage::Proposal).total_cents, 450_000);

    board.controller.delete_deal(DealId(9)).await.unwrap();
    assert!(board.controller.deal(DealId(9)).is_none());
    assert_eq!(board.controller.aggregate(Stage::Proposal).count, 0);
    board.assert_aggregates_consistent();
}

#[tokio::test]
async fn summary_reflects_current_board() {
    let mut board = Board::load(
        "u1",
        vec![
            deal(1, "u1", Stage::Lead, 100_000),
            deal(2, "u1", Stage::Negotiation, 300_000),
        ],
    )
    .await;
    board.controller.move_deal(DealId(2), Stage::Closed).await;

    let today = NaiveDate::from_ymd_opt(2026, 12, 10).unwrap();
    let summary = board.controller.summary(today);
    assert_eq!(summary.total_deals, 2);
    assert_eq!(summary.total_value_cents, 400_000);
    assert_eq!(summary.conversion_rate, 50.0);
    assert_eq!(summary.at_risk, vec![DealId(1)]);
}

#[tokio::test]
async fn edit_without_stage_keeps_the_deal_in_place() {
    let mut board = Board::load("u1", sample_deals()).await;
    let proposal_before = board.controller.aggregate(Stage::Proposal);

    let mut retitled = draft("Platform migration");
    retitled.value_cents = Some(300_000);
    let edited = board.controller.edit_deal(DealId(9), retitled).await.unwrap();

    assert_eq!(edited.stage, Stage::Proposal);
    assert_eq!(edited.title, "Platform migration");
    assert_eq!(board.stage_of(9), Stage::Proposal);
    assert_eq!(board.repository.stored(DealId(9)).await.unwrap().stage, Stage::Proposal);
    assert_eq!(board.controller.aggregate(Stage::Proposal), proposal_before);
    assert_eq!(board.controller.aggregate(Stage::Lead).count, 2);
    board.assert_aggregates_consistent();
}

#[tokio::test]
async fn edit_with_stage_moves_the_deal_and_its_totals() {
    let mut board = Board::load("u1", sample_deals()).await;

    let mut advanced = DealDraft::from(board.controller.deal(DealId(9)).unwrap());
    advanced.stage = Some(Stage::Negotiation);
    let edited = board.controller.edit_deal(DealId(9), advanced).await.unwrap();

    assert_eq!(edited.stage, Stage::Negotiation);
    assert_eq!(board.stage_of(9), Stage::Negotiation);
    assert_eq!(board.controller.aggregate(Stage::Proposal).count, 0);
    assert_eq!(board.controller.aggregate(Stage::Proposal).total_cents, 0);
    assert_eq!(board.controller.aggregate(Stage::Negotiation).count, 1);
    assert_eq!(board.controller.aggregate(Stage::Negotiation).total_cents, 300_000);
    board.assert_aggregates_consistent();
}

#[tokio::test]
async fn oversized_value_is_rejected_before_the_store() {
    let mut board = Board::load("u1", sample_deals()).await;
    let mut input = draft("Moonshot");
    input.value_cents = Some(i64::MAX);

    let err = board.controller.create_deal(input).await.unwrap_err();

    let PipelineError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.get("value"), Some("Deal value is too large"));
    assert_eq!(board.controller.deals().len(), 5);
    assert!(board.repository.stored(DealId(12)).await.is_none());
    board.assert_aggregates_consistent();
}
