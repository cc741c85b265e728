use crate::domain::contract::LlmFinancialModel;
use crate::domain::financial_model::FinancialModel;
use crate::domain::generation::{GenerationResponse, StructuredData};
use crate::prompt::{JSON_END_MARKER, JSON_START_MARKER};
use anyhow::Context;

/// Location of the structured block inside the model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredBlock<'a> {
    pub json: &'a str,
    /// Byte range of the block including any markers or fences.
    pub span: std::ops::Range<usize>,
}

/// Finds the structured block: `[JSON_START]...[JSON_END]` first, then a
/// fenced code block, then the outermost `{...}` span.
pub fn extract_block(text: &str) -> Option<StructuredBlock<'_>> {
    if let Some(start) = text.find(JSON_START_MARKER) {
        let body_start = start + JSON_START_MARKER.len();
        // A missing end marker usually means the completion was truncated;
        // take the rest of the text and let the decoder decide.
        let (body_end, span_end) = match text[body_start..].find(JSON_END_MARKER) {
            Some(rel) => (body_start + rel, body_start + rel + JSON_END_MARKER.len()),
            None => (text.len(), text.len()),
        };
        let inner = &text[body_start..body_end];
        let json = fenced_body(inner).unwrap_or(inner).trim();
        return Some(StructuredBlock {
            json,
            span: start..span_end,
        });
    }

    if let Some(block) = extract_fenced(text) {
        return Some(block);
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(StructuredBlock {
        json: text[start..=end].trim(),
        span: start..end + 1,
    })
}

fn extract_fenced(text: &str) -> Option<StructuredBlock<'_>> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find("```") {
        let fence_start = search_from + rel;
        let after_fence = fence_start + 3;
        // Skip the info string (```json).
        let body_start = after_fence + text[after_fence..].find('\n')? + 1;
        let body_end = body_start + text[body_start..].find("```")?;
        let body = text[body_start..body_end].trim();
        if body.starts_with('{') {
            return Some(StructuredBlock {
                json: body,
                span: fence_start..body_end + 3,
            });
        }
        search_from = body_end + 3;
    }
    None
}

fn fenced_body(inner: &str) -> Option<&str> {
    let trimmed = inner.trim();
    let rest = trimmed.strip_prefix("```")?;
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    Some(body.rfind("```").map(|end| &body[..end]).unwrap_or(body))
}

pub fn parse_financial_model(text: &str) -> anyhow::Result<FinancialModel> {
    let block = extract_block(text).context("no structured block found in LLM output")?;
    let value = serde_json::from_str::<serde_json::Value>(block.json)
        .with_context(|| format!("structured block is not valid JSON: {}", block.json))?;
    Ok(LlmFinancialModel::from_block(value)?.into_financial_model())
}

/// Narrative text with the structured block cut out. Falls back to the full
/// text when nothing else remains.
pub fn narrative(text: &str, block: &StructuredBlock<'_>) -> String {
    let before = text[..block.span.start].trim();
    let after = text[block.span.end..].trim();
    match (before.is_empty(), after.is_empty()) {
        (false, false) => format!("{before}\n\n{after}"),
        (false, true) => before.to_string(),
        (true, false) => after.to_string(),
        (true, true) => text.to_string(),
    }
}

/// Shapes raw model output into a response. Never fails: when the structured
/// block is missing or malformed the narrative is the unchanged text and the
/// financial model is all defaults.
pub fn shape_response(text: &str) -> GenerationResponse {
    match parse_financial_model(text) {
        Ok(financial_model) => {
            let generated_output = extract_block(text)
                .map(|block| narrative(text, &block))
                .unwrap_or_else(|| text.to_string());
            GenerationResponse {
                generated_output,
                structured_data: StructuredData { financial_model },
            }
        }
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "structured block not parsed; returning defaults");
            GenerationResponse {
                generated_output: text.to_string(),
                structured_data: StructuredData::default(),
            }
        }
    }
}
