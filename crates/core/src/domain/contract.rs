use crate::domain::financial_model::{FinancialModel, ProjectionLineItem, RoiMetrics};
use anyhow::{ensure, Context};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const MODEL_FIELDS: [&str; 7] = [
    "summary",
    "total_investment",
    "costs",
    "revenue_uplift",
    "roi_metrics",
    "sensitivity_analysis",
    "risk_factors",
];

/// Financial model as emitted by the LLM. Every field may be missing;
/// numbers may arrive as strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmFinancialModel {
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_investment: Option<f64>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub costs: Option<Vec<LlmProjectionLineItem>>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub revenue_uplift: Option<Vec<LlmProjectionLineItem>>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub roi_metrics: Option<LlmRoiMetrics>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub sensitivity_analysis: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub risk_factors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmProjectionLineItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub year_1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub year_2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub year_3: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub assumptions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmRoiMetrics {
    #[serde(default, deserialize_with = "lenient_string")]
    pub payback_period: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub net_present_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub irr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub benefit_cost_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub key_assumptions: Option<Vec<String>>,
}

impl LlmFinancialModel {
    /// Decodes a structured block, either `{"financial_model": {...}}` or the
    /// model object itself. A bare object must carry at least one model field.
    pub fn from_block(value: Value) -> anyhow::Result<Self> {
        let inner = match value {
            Value::Object(mut map) if map.contains_key("financial_model") => map
                .remove("financial_model")
                .unwrap_or(Value::Null),
            Value::Object(map) => {
                ensure!(
                    MODEL_FIELDS.iter().any(|field| map.contains_key(*field)),
                    "JSON object has no financial model fields"
                );
                Value::Object(map)
            }
            other => other,
        };
        ensure!(
            inner.is_object(),
            "financial_model must be a JSON object (got {})",
            json_kind(&inner)
        );
        serde_json::from_value::<Self>(inner)
            .context("structured block does not match the financial model schema")
    }

    pub fn into_financial_model(self) -> FinancialModel {
        FinancialModel {
            summary: clean(self.summary),
            total_investment: self.total_investment.unwrap_or_default(),
            costs: into_line_items(self.costs),
            revenue_uplift: into_line_items(self.revenue_uplift),
            roi_metrics: self
                .roi_metrics
                .map(LlmRoiMetrics::into_roi_metrics)
                .unwrap_or_default(),
            sensitivity_analysis: clean_list(self.sensitivity_analysis),
            risk_factors: clean_list(self.risk_factors),
        }
    }
}

impl LlmProjectionLineItem {
    fn into_line_item(self) -> ProjectionLineItem {
        ProjectionLineItem {
            category: clean(self.category),
            year_1: self.year_1.unwrap_or_default(),
            year_2: self.year_2.unwrap_or_default(),
            year_3: self.year_3.unwrap_or_default(),
            description: clean(self.description),
            assumptions: clean_list(self.assumptions),
        }
    }
}

impl LlmRoiMetrics {
    fn into_roi_metrics(self) -> RoiMetrics {
        RoiMetrics {
            payback_period: clean(self.payback_period),
            net_present_value: self.net_present_value.unwrap_or_default(),
            irr: self.irr.unwrap_or_default(),
            benefit_cost_ratio: self.benefit_cost_ratio.unwrap_or_default(),
            key_assumptions: clean_list(self.key_assumptions),
        }
    }
}

fn into_line_items(items: Option<Vec<LlmProjectionLineItem>>) -> Vec<ProjectionLineItem> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(LlmProjectionLineItem::into_line_item)
        .collect()
}

fn clean(s: Option<String>) -> String {
    s.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn clean_list(items: Option<Vec<String>>) -> Vec<String> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parses "1,000,000.00", "$250000", "25.5%" and the like.
fn parse_loose_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '%' | '_' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_loose_number(&s),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_string))
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(items.into_iter().filter_map(value_to_string).collect()),
        Some(other) => value_to_string(other).map(|s| vec![s]),
        None => None,
    })
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(None);
    };
    // Entries that are not objects of the expected shape are dropped, not fatal.
    Ok(Some(
        items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value::<T>(item).ok())
            .collect(),
    ))
}

fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(Value::is_object)
        .and_then(|v| serde_json::from_value::<T>(v).ok()))
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
