use serde::Serialize;

use crate::{deal::Deal, stage::Stage};

/// Count and value total of the deals currently in one stage.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StageAggregate {
    pub stage: Stage,
    pub count: usize,
    pub total_cents: i64,
}

/// One aggregate per stage, in board order, empty stages included.
/// Totals saturate at `i64::MAX`.
pub fn stage_aggregates(deals: &[Deal]) -> Vec<StageAggregate> {
    Stage::ALL
        .iter()
        .map(|&stage| {
            let (count, total_cents) = deals
                .iter()
                .filter(|deal| deal.stage == stage)
                .fold((0usize, 0i64), |(count, total), deal| {
                    (count + 1, total.saturating_add(deal.value_cents))
                });
            StageAggregate {
                stage,
                count,
                total_cents,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::deal::{ContactId, DealId, UserId};

    fn deal(id: i32, stage: Stage, value_cents: i64) -> Deal {
        Deal {
            id: DealId(id),
            title: format!("Deal {id}"),
            value_cents,
            stage,
            probability: 50,
            expected_close: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            notes: String::new(),
            owner: UserId::new("u1"),
            contact_id: ContactId(1),
        }
    }

    #[test]
    fn empty_board_has_five_zeroed_stages() {
        let aggregates = stage_aggregates(&[]);
        assert_eq!(aggregates.len(), 5);
        assert!(aggregates.iter().all(|a| a.count == 0 && a.total_cents == 0));
        let order: Vec<Stage> = aggregates.iter().map(|a| a.stage).collect();
        assert_eq!(order, Stage::ALL.to_vec());
    }

    #[test]
    fn oversized_totals_saturate() {
        let deals = vec![deal(1, Stage::Lead, i64::MAX), deal(2, Stage::Lead, 1)];
        let aggregates = stage_aggregates(&deals);
        assert_eq!(aggregates[0].count, 2);
        assert_eq!(aggregates[0].total_cents, i64::MAX);
    }

    #[test]
    fn counts_and_sums_per_stage() {
        let deals = vec![
            deal(1, Stage::Lead, 500_000),
            deal(2, Stage::Lead, 250_000),
            deal(3, Stage::Proposal, 1_000_000),
            deal(4, Stage::Closed, 0),
        ];
        let aggregates = stage_aggregates(&deals);
        for aggregate in &aggregates {
            let subset: Vec<&Deal> = deals.iter().filter(|d| d.stage == aggregate.stage).collect();
            assert_eq!(aggregate.count, subset.len());
            assert_eq!(
                aggregate.total_cents,
                subset.iter().map(|d| d.value_cents).sum::<i64>()
            );
        }
        assert_eq!(aggregates[0].count, 2);
        assert_eq!(aggregates[0].total_cents, 750_000);
        assert_eq!(aggregates[1].count, 0);
        assert_eq!(aggregates[4].count, 1);
        assert_eq!(aggregates[4].total_cents, 0);
    }

    #[test]
    fn order_does_not_depend_on_counts() {
        let deals = vec![
            deal(1, Stage::Closed, 10),
            deal(2, Stage::Closed, 10),
            deal(3, Stage::Negotiation, 10),
        ];
        let order: Vec<Stage> = stage_aggregates(&deals).iter().map(|a| a.stage).collect();
        assert_eq!(order, Stage::ALL.to_vec());
    }
}
