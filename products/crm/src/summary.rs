use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    deal::{Deal, DealId},
    stage::Stage,
};

/// Open deals closing within this many days are flagged as at risk.
pub const AT_RISK_WINDOW_DAYS: i64 = 14;

/// Headline numbers shown above the board.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub total_deals: usize,
    pub total_value_cents: i64,
    pub average_deal_cents: i64,
    /// Percentage of deals in the closed stage.
    pub conversion_rate: f64,
    pub at_risk: Vec<DealId>,
}

impl PipelineSummary {
    pub fn from_deals(deals: &[Deal], today: NaiveDate) -> Self {
        let total_deals = deals.len();
        let total_value_cents = deals
            .iter()
            .fold(0i64, |total, deal| total.saturating_add(deal.value_cents));
        if total_deals == 0 {
            return Self {
                total_deals,
                total_value_cents,
                average_deal_cents: 0,
                conversion_rate: 0.0,
                at_risk: Vec::new(),
            };
        }
        let won = deals.iter().filter(|deal| deal.stage == Stage::Closed).count();
        Self {
            total_deals,
            total_value_cents,
            average_deal_cents: total_value_cents / total_deals as i64,
            conversion_rate: won as f64 / total_deals as f64 * 100.0,
            at_risk: at_risk_deals(deals, today)
                .map(|deal| deal.id)
                .collect(),
        }
    }
}

/// Open deals whose expected close falls between today and the risk window.
pub fn at_risk_deals(deals: &[Deal], today: NaiveDate) -> impl Iterator<Item = &Deal> {
    deals.iter().filter(move |deal| {
        let days_left = (deal.expected_close - today).num_days();
        deal.stage != Stage::Closed && (0..=AT_RISK_WINDOW_DAYS).contains(&days_left)
    })
}
