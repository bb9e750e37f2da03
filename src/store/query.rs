use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::keys::pattern::KeyPattern;

use super::{Document, KEY_FIELD, error::StoreError};

/// Resolves a dotted path (`buckets.bucketStart`) inside a document
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, part| value.get(part))
}

/// Orders numbers with numbers and strings with strings, nothing else
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    Eq { field: String, value: Value },
    Gte { field: String, value: Value },
    Lte { field: String, value: Value },
    Regex { field: String, regex: Regex },
    And(Vec<Filter>),
}

impl Filter {
    /// Matches the documents whose `key` matches `pattern`
    pub fn key_pattern(pattern: &KeyPattern) -> Result<Self, StoreError> {
        Ok(Self::Regex {
            field: KEY_FIELD.to_string(),
            regex: Regex::new(&pattern.to_string())?,
        })
    }

    /// Inclusive on both ends
    pub fn between(field: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Self::And(vec![
            Self::Gte {
                field: field.to_string(),
                value: from.into(),
            },
            Self::Lte {
                field: field.to_string(),
                value: to.into(),
            },
        ])
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq { field, value } => lookup(doc, field).is_some_and(|v| v == value),
            Self::Gte { field, value } => lookup(doc, field)
                .and_then(|v| compare_values(v, value))
                .is_some_and(Ordering::is_ge),
            Self::Lte { field, value } => lookup(doc, field)
                .and_then(|v| compare_values(v, value))
                .is_some_and(Ordering::is_le),
            Self::Regex { field, regex } => match lookup(doc, field) {
                Some(Value::String(s)) => regex.is_match(s),
                _ => false,
            },
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }

    /// Literal prefix every matching `key` must start with, when the filter
    /// pins one. Lets a store turn the filter into a key range scan.
    pub fn key_prefix(&self) -> Option<String> {
        match self {
            Self::Regex { field, regex } if field == KEY_FIELD => {
                let prefix = regex.as_str().strip_prefix('^')?;
                let literal = !prefix.is_empty()
                    && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == ':');
                literal.then(|| prefix.to_string())
            }
            Self::And(filters) => filters.iter().find_map(Self::key_prefix),
            _ => None,
        }
    }
}

/// Smallest string greater than every string starting with `prefix`
pub fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(next) = char::from_u32(last as u32 + 1) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct Sort {
    pub field: String,
    pub ascending: bool,
}

impl Sort {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: true,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: false,
        }
    }
}

/// Stable sort by each key in turn. Missing fields sort first.
pub fn sort_documents(docs: &mut [Document], sort: &[Sort]) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        sort.iter()
            .map(|s| {
                let ord = match (lookup(a, &s.field), lookup(b, &s.field)) {
                    (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if s.ascending { ord } else { ord.reverse() }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}
