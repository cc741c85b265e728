//! Prompt construction for the financial model generator.
//!
//! Both prompts are pure functions of the request: no clock, no randomness,
//! and JSON objects are rendered in key order.

use crate::domain::generation::GenerationRequest;
use serde_json::Value;

pub const JSON_START_MARKER: &str = "[JSON_START]";
pub const JSON_END_MARKER: &str = "[JSON_END]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn for_request(req: &GenerationRequest) -> Self {
        Self {
            system: system_prompt(),
            user: user_prompt(req),
        }
    }
}

pub fn system_prompt() -> String {
    let schema = [
        "{",
        "  \"financial_model\": {",
        "    \"summary\": \"Brief overview of financial projections\",",
        "    \"total_investment\": 1000000.00,",
        "    \"costs\": [",
        "      {",
        "        \"category\": \"Technology\",",
        "        \"year_1\": 500000.00,",
        "        \"year_2\": 100000.00,",
        "        \"year_3\": 100000.00,",
        "        \"description\": \"Description of costs\",",
        "        \"assumptions\": [\"assumption1\", \"assumption2\"]",
        "      }",
        "    ],",
        "    \"revenue_uplift\": [",
        "      {",
        "        \"category\": \"Increased Frequency\",",
        "        \"year_1\": 200000.00,",
        "        \"year_2\": 400000.00,",
        "        \"year_3\": 600000.00,",
        "        \"description\": \"Description of impact\",",
        "        \"assumptions\": [\"assumption1\", \"assumption2\"]",
        "      }",
        "    ],",
        "    \"roi_metrics\": {",
        "      \"payback_period\": \"18 months\",",
        "      \"net_present_value\": 1500000.00,",
        "      \"irr\": 25.5,",
        "      \"benefit_cost_ratio\": 2.5,",
        "      \"key_assumptions\": [\"assumption1\", \"assumption2\"]",
        "    },",
        "    \"sensitivity_analysis\": [\"factor1\", \"factor2\"],",
        "    \"risk_factors\": [\"risk1\", \"risk2\"]",
        "  }",
        "}",
    ]
    .join("\n");

    format!(
        "You are an expert in loyalty program financial modeling and ROI analysis. \
Create detailed financial projections that include implementation costs, revenue uplift, and ROI metrics. Consider:\n\n\
1. Cost Structure\n\
   - Technology implementation\n\
   - Program administration\n\
   - Rewards and redemption costs\n\
   - Marketing and communication\n\n\
2. Revenue Impact\n\
   - Increased purchase frequency\n\
   - Higher average transaction value\n\
   - Improved retention rates\n\
   - New customer acquisition\n\n\
3. ROI Analysis\n\
   - Payback period\n\
   - Net present value\n\
   - Internal rate of return\n\
   - Benefit-cost ratio\n\n\
Provide your response in two parts:\n\
1. A detailed explanation in natural language\n\
2. A structured JSON object with this exact schema:\n\
{schema}\n\n\
Rules for the JSON object:\n\
- Place it after the explanation, between the markers {JSON_START_MARKER} and {JSON_END_MARKER}.\n\
- Do not wrap it in markdown code fences.\n\
- All monetary values and percentages are plain JSON numbers (no currency symbols, no thousands separators).\n\
- No trailing commas. No comments. Use double quotes for all JSON strings."
    )
}

pub fn user_prompt(req: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Please create a financial model for {}'s loyalty program.",
        req.company_name.trim()
    );

    if let Some(design) = req.loyalty_program_design() {
        prompt.push_str("\n\nConsider this program design:\n");
        prompt.push_str(&render_value(design));
    }

    let mut others = req.other_previous_data().peekable();
    if others.peek().is_some() {
        prompt.push_str("\n\nAdditional context from earlier stages:");
        for (key, value) in others {
            prompt.push_str(&format!("\n- {key}:\n{}", render_value(value)));
        }
    }

    if let Some(existing) = req.existing_output() {
        prompt.push_str("\n\nPrevious financial model:\n");
        prompt.push_str(existing.trim());
    }

    if let Some(feedback) = req.user_feedback() {
        prompt.push_str("\n\nPlease refine the model based on this feedback: ");
        prompt.push_str(feedback);
    }

    if let Some(other) = req.other_input() {
        prompt.push_str("\n\nOther input data:\n");
        prompt.push_str(&render_value(&Value::Object(other.clone())));
    }

    prompt
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
