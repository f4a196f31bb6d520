use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// Comparison applied by a single filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    #[default]
    Contains,
}

impl Operator {
    /// Accepts the symbols and words the router prompt allows; anything else is `Contains`.
    pub fn parse(raw: &str) -> Self {
        Self::recognize(raw).unwrap_or_else(|| {
            warn!(operator = raw, "Unrecognized filter operator, using contains");
            Operator::Contains
        })
    }

    /// `None` for spellings outside the known set.
    pub fn recognize(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "=" | "==" | "equals" | "igual" => Some(Operator::Equals),
            "!=" | "<>" | "not_equals" | "distinto" => Some(Operator::NotEquals),
            ">" | "greater_than" | "mayor" => Some(Operator::GreaterThan),
            "<" | "less_than" | "menor" => Some(Operator::LessThan),
            "" | "contains" | "contiene" => Some(Operator::Contains),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::Contains => "contiene",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.map(|s| Operator::parse(&s)).unwrap_or_default())
    }
}

/// One row-matching condition. An empty `column` searches every text column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    #[serde(rename = "columna", alias = "column", default, deserialize_with = "lenient_string")]
    pub column: String,
    #[serde(rename = "valor", alias = "value", default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(rename = "operador", alias = "operator", default)]
    pub operator: Operator,
}

impl FilterClause {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            operator,
        }
    }
}

impl fmt::Display for FilterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column = if self.column.is_empty() {
            "*"
        } else {
            self.column.as_str()
        };
        write!(f, "{} {} \"{}\"", column, self.operator, self.value)
    }
}

/// Clauses applied in order as successive narrowing passes.
pub type FilterSpec = Vec<FilterClause>;

/// Where the router decided to look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDecision {
    #[serde(rename = "dataframe", alias = "table", alias = "tabla", alias = "table_name")]
    pub table_name: String,
    #[serde(rename = "filtros", alias = "filters", default)]
    pub filters: FilterSpec,
    #[serde(
        rename = "explicacion",
        alias = "explanation",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub explanation: String,
}

/// Render filters as `a; b; c`, or a dash when there are none.
pub fn describe_filters(filters: &[FilterClause]) -> String {
    if filters.is_empty() {
        return "—".to_string();
    }
    filters
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Models sometimes emit numbers or null where a string is expected.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
