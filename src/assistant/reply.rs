use serde_json::Value;

use crate::query::{FilterClause, QueryDecision};

/// What the router model answered, once parsed.
#[derive(Debug, PartialEq)]
pub enum PlannerReply {
    /// A table and the filters to apply to it.
    Decision(QueryDecision),
    /// The model said explicitly that it cannot route the question.
    CannotDetermine(String),
    /// Nothing usable in the reply.
    Unparseable,
}

impl PlannerReply {
    /// Parse a router reply: whole text, then a fenced block, then the outermost braces.
    pub fn parse(input: &str) -> Self {
        match extract_json(input) {
            Some(value) => Self::from_value(value),
            None => PlannerReply::Unparseable,
        }
    }

    pub fn get_decision(&self) -> Option<&QueryDecision> {
        match self {
            PlannerReply::Decision(d) => Some(d),
            _ => None,
        }
    }

    fn from_value(value: Value) -> Self {
        if let Some(err) = value.get("error") {
            let message = match err {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return PlannerReply::CannotDetermine(message);
        }

        let has_list = value.get("filtros").is_some() || value.get("filters").is_some();
        let flat_clause = if has_list {
            None
        } else {
            serde_json::from_value::<FilterClause>(value.clone())
                .ok()
                .filter(|c| !c.column.is_empty() || !c.value.is_empty())
        };

        match serde_json::from_value::<QueryDecision>(value) {
            Ok(mut decision) => {
                // Single-clause replies: {"dataframe", "columna", "valor"}
                if let Some(clause) = flat_clause {
                    decision.filters.push(clause);
                }
                PlannerReply::Decision(decision)
            }
            Err(_) => PlannerReply::Unparseable,
        }
    }
}

/// Find the first JSON object in a model reply.
pub fn extract_json(input: &str) -> Option<Value> {
    let as_object = |text: &str| {
        serde_json::from_str::<Value>(text.trim())
            .ok()
            .filter(Value::is_object)
    };

    if let Some(v) = as_object(input) {
        return Some(v);
    }
    if let Some(v) = fenced_block(input).and_then(as_object) {
        return Some(v);
    }
    brace_span(input).and_then(as_object)
}

/// Body of the first ``` fence, skipping a language tag such as `json`.
fn fenced_block(input: &str) -> Option<&str> {
    let start = input.find("```")?;
    let after = &input[start + 3..];
    let tag_len = after
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    let body = &after[tag_len..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// From the first `{` to the last `}`.
fn brace_span(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}
