use chrono::{DateTime, Utc};
use serde_json::Value;

/// Attribute predicate evaluated against the JSON attributes of an entry
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Attribute equals the value, or a multi-valued attribute contains it
    Equals(String, String),
    /// Date attribute is at or before the given instant
    LessOrEqual(String, DateTime<Utc>),
    /// Attribute is set and not null
    Present(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn equals(attribute: &str, value: impl Into<String>) -> Self {
        Self::Equals(attribute.to_string(), value.into())
    }

    pub fn less_or_equal(attribute: &str, date: DateTime<Utc>) -> Self {
        Self::LessOrEqual(attribute.to_string(), date)
    }

    pub fn present(attribute: &str) -> Self {
        Self::Present(attribute.to_string())
    }

    /// Matches every entry
    pub fn any() -> Self {
        Self::And(Vec::new())
    }

    pub fn matches(&self, attributes: &Value) -> bool {
        match self {
            Self::Equals(attribute, expected) => match attributes.get(attribute) {
                Some(Value::Array(values)) => values.iter().any(|v| scalar_equals(v, expected)),
                Some(value) => scalar_equals(value, expected),
                None => false,
            },
            Self::LessOrEqual(attribute, bound) => attributes
                .get(attribute)
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|date| date.with_timezone(&Utc) <= *bound)
                .unwrap_or(false),
            Self::Present(attribute) => {
                matches!(attributes.get(attribute), Some(value) if !value.is_null())
            }
            Self::And(filters) => filters.iter().all(|f| f.matches(attributes)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(attributes)),
        }
    }
}

fn scalar_equals(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        _ => false,
    }
}
