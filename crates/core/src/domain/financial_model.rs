use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialModel {
    pub summary: String,
    pub total_investment: f64,
    pub costs: Vec<ProjectionLineItem>,
    pub revenue_uplift: Vec<ProjectionLineItem>,
    pub roi_metrics: RoiMetrics,
    pub sensitivity_analysis: Vec<String>,
    pub risk_factors: Vec<String>,
}

/// One row of a three-year projection, used for both costs and revenue uplift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionLineItem {
    pub category: String,
    pub year_1: f64,
    pub year_2: f64,
    pub year_3: f64,
    pub description: String,
    pub assumptions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiMetrics {
    pub payback_period: String,
    pub net_present_value: f64,
    pub irr: f64,
    pub benefit_cost_ratio: f64,
    pub key_assumptions: Vec<String>,
}

impl ProjectionLineItem {
    pub fn three_year_total(&self) -> f64 {
        self.year_1 + self.year_2 + self.year_3
    }
}

impl FinancialModel {
    /// True when nothing was extracted from the model output.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn total_costs(&self) -> f64 {
        self.costs.iter().map(ProjectionLineItem::three_year_total).sum()
    }

    pub fn total_revenue_uplift(&self) -> f64 {
        self.revenue_uplift
            .iter()
            .map(ProjectionLineItem::three_year_total)
            .sum()
    }
}
