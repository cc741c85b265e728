use crate::domain::financial_model::FinancialModel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const LOYALTY_PROGRAM_DESIGN_KEY: &str = "loyalty_program_design";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub company_name: String,

    /// Outputs of earlier pipeline stages, keyed by stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_data: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_prompt_data: Option<CurrentPromptData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_input_data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentPromptData {
    #[serde(default)]
    pub existing_generated_output: Option<String>,
    #[serde(default)]
    pub user_feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub generated_output: String,
    pub structured_data: StructuredData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
    pub financial_model: FinancialModel,
}

impl GenerationRequest {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            ..Default::default()
        }
    }

    pub fn loyalty_program_design(&self) -> Option<&Value> {
        self.previous_data
            .as_ref()?
            .get(LOYALTY_PROGRAM_DESIGN_KEY)
            .filter(|v| !is_blank(v))
    }

    /// Previous-stage entries other than the program design, in key order.
    pub fn other_previous_data(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.previous_data
            .iter()
            .flat_map(|m| m.iter())
            .filter(|(k, v)| k.as_str() != LOYALTY_PROGRAM_DESIGN_KEY && !is_blank(v))
    }

    pub fn existing_output(&self) -> Option<&str> {
        self.current_prompt_data
            .as_ref()?
            .existing_generated_output
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn user_feedback(&self) -> Option<&str> {
        self.current_prompt_data
            .as_ref()?
            .user_feedback
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn other_input(&self) -> Option<&Map<String, Value>> {
        self.other_input_data.as_ref().filter(|m| !m.is_empty())
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}
