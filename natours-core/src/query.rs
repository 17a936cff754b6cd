//! List query language shared by every `get_all` endpoint.
//!
//! `?difficulty=easy&price[lt]=1500&sort=-price,name&fields=name,price&page=2&limit=10`
//!
//! The in-memory evaluation here and the SQL built by the Postgres
//! repository must agree on comparison semantics: numeric values compare
//! numerically against numeric fields only, text values compare against the
//! text rendering of the field, missing fields never match.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::{CoreError, CoreResult};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;
pub const DEFAULT_SORT: &str = "-createdAt";

const RESERVED: [&str; 4] = ["page", "sort", "limit", "fields"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "eq" => Some(FilterOp::Eq),
            "ne" => Some(FilterOp::Ne),
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }

    fn accepts(&self, ord: Ordering) -> bool {
        match self {
            FilterOp::Eq => ord == Ordering::Equal,
            FilterOp::Ne => ord != Ordering::Equal,
            FilterOp::Gt => ord == Ordering::Greater,
            FilterOp::Gte => ord != Ordering::Less,
            FilterOp::Lt => ord == Ordering::Less,
            FilterOp::Lte => ord != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

impl FilterValue {
    fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => FilterValue::Number(n),
            _ => FilterValue::Text(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn matches(&self, doc: &Value) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        let ord = match &self.value {
            FilterValue::Number(expected) => actual.as_f64().and_then(|n| n.partial_cmp(expected)),
            FilterValue::Text(expected) => text_form(actual).map(|s| s.as_str().cmp(expected.as_str())),
        };
        ord.map(|ord| self.op.accepts(ord)).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub fields: Option<Vec<String>>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: vec![SortKey { field: "createdAt".to_string(), descending: true }],
            fields: None,
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListQuery {
    /// Parses raw query-string pairs in request order; later reserved keys win.
    pub fn parse<I, K, V>(pairs: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = ListQuery::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "page" => query.page = parse_positive(key, value)?,
                "limit" => {
                    let limit = parse_positive(key, value)?;
                    if limit > MAX_LIMIT {
                        return Err(CoreError::validation(format!("limit must not exceed {}", MAX_LIMIT)));
                    }
                    query.limit = limit;
                }
                "sort" => query.sort = parse_sort(value)?,
                "fields" => query.fields = Some(parse_field_list(value)?),
                _ => query.filters.push(parse_filter(key, value)?),
            }
        }

        Ok(query)
    }

    /// Single equality filter on a text field, used for lookups like user-by-email.
    pub fn by_field(field: &str, value: impl Into<String>) -> Self {
        ListQuery {
            filters: vec![Filter {
                field: field.to_string(),
                op: FilterOp::Eq,
                value: FilterValue::Text(value.into()),
            }],
            ..ListQuery::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Filters, sorts and pages a set of documents.
    pub fn apply(&self, docs: Vec<Value>) -> Vec<Value> {
        let mut docs: Vec<Value> = docs.into_iter().filter(|d| self.matches(d)).collect();
        docs.sort_by(|a, b| self.compare(a, b));
        docs.into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect()
    }

    /// Field selection; `id` is always kept.
    pub fn project(&self, doc: Value) -> Value {
        let Some(fields) = &self.fields else {
            return doc;
        };
        match doc {
            Value::Object(map) => {
                let projected: Map<String, Value> = map
                    .into_iter()
                    .filter(|(k, _)| k == "id" || fields.iter().any(|f| f == k))
                    .collect();
                Value::Object(projected)
            }
            other => other,
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for key in &self.sort {
            let ord = compare_json(a.get(&key.field), b.get(&key.field));
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        compare_json(a.get("id"), b.get("id"))
    }
}

pub fn is_valid_field(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_positive(key: &str, value: &str) -> CoreResult<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(CoreError::validation(format!("{} must be a positive integer", key))),
    }
}

fn parse_field_list(value: &str) -> CoreResult<Vec<String>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| {
            if is_valid_field(f) {
                Ok(f.to_string())
            } else {
                Err(CoreError::validation(format!("Invalid field name: {}", f)))
            }
        })
        .collect()
}

fn parse_sort(value: &str) -> CoreResult<Vec<SortKey>> {
    let keys: Vec<SortKey> = value
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| {
            let (field, descending) = match k.strip_prefix('-') {
                Some(field) => (field, true),
                None => (k, false),
            };
            if is_valid_field(field) {
                Ok(SortKey { field: field.to_string(), descending })
            } else {
                Err(CoreError::validation(format!("Invalid sort field: {}", field)))
            }
        })
        .collect::<CoreResult<_>>()?;

    if keys.is_empty() {
        return parse_sort(DEFAULT_SORT);
    }
    Ok(keys)
}

fn parse_filter(key: &str, value: &str) -> CoreResult<Filter> {
    let (field, op) = match key.split_once('[') {
        Some((field, rest)) => {
            let op = rest
                .strip_suffix(']')
                .and_then(FilterOp::parse)
                .ok_or_else(|| CoreError::validation(format!("Unsupported filter operator in {}", key)))?;
            (field, op)
        }
        None => (key, FilterOp::Eq),
    };

    if !is_valid_field(field) || RESERVED.contains(&field) {
        return Err(CoreError::validation(format!("Invalid filter field: {}", field)));
    }

    Ok(Filter {
        field: field.to_string(),
        op,
        value: FilterValue::parse(value),
    })
}

/// Text rendering of a JSON value, matching Postgres `->>`.
fn text_form(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Orders like jsonb: null < string < number < bool < array < object;
/// missing fields sort last.
fn compare_json(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::String(_) => 1,
            Value::Number(_) => 2,
            Value::Bool(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tours() -> Vec<Value> {
        vec![
            json!({"id": "a", "name": "The Forest Hiker", "price": 397, "difficulty": "easy", "createdAt": "2026-01-01T00:00:00Z"}),
            json!({"id": "b", "name": "The Sea Explorer", "price": 497, "difficulty": "medium", "createdAt": "2026-01-02T00:00:00Z"}),
            json!({"id": "c", "name": "The Snow Adventurer", "price": 997, "difficulty": "difficult", "createdAt": "2026-01-03T00:00:00Z"}),
            json!({"id": "d", "name": "The City Wanderer", "price": 1197, "difficulty": "easy", "createdAt": "2026-01-04T00:00:00Z"}),
        ]
    }

    fn ids(docs: &[Value]) -> Vec<&str> {
        docs.iter().map(|d| d["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_defaults() {
        let query = ListQuery::parse(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(ids(&query.apply(tours())), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_operator_filters() {
        let query = ListQuery::parse([("price[gte]", "497"), ("price[lt]", "1000")]).unwrap();
        let result = query.apply(tours());
        assert_eq!(ids(&result), vec!["c", "b"]);
    }

    #[test]
    fn test_equality_and_sort() {
        let query = ListQuery::parse([("difficulty", "easy"), ("sort", "price")]).unwrap();
        assert_eq!(ids(&query.apply(tours())), vec!["a", "d"]);

        let query = ListQuery::parse([("sort", "-price,name")]).unwrap();
        assert_eq!(ids(&query.apply(tours())), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_numeric_value_never_matches_text_field() {
        let query = ListQuery::parse([("name", "497")]).unwrap();
        assert!(query.apply(tours()).is_empty());
    }

    #[test]
    fn test_pagination() {
        let query = ListQuery::parse([("sort", "price"), ("limit", "2"), ("page", "2")]).unwrap();
        assert_eq!(query.offset(), 2);
        assert_eq!(ids(&query.apply(tours())), vec!["c", "d"]);
    }

    #[test]
    fn test_projection_keeps_id() {
        let query = ListQuery::parse([("fields", "name,price")]).unwrap();
        let doc = query.project(tours().remove(0));
        assert_eq!(doc, json!({"id": "a", "name": "The Forest Hiker", "price": 397}));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(ListQuery::parse([("price[regex]", "1")]).is_err());
        assert!(ListQuery::parse([("doc->>'x'", "1")]).is_err());
        assert!(ListQuery::parse([("page", "0")]).is_err());
        assert!(ListQuery::parse([("limit", "5000")]).is_err());
        assert!(ListQuery::parse([("sort", "price;drop")]).is_err());
    }

    #[test]
    fn test_by_field_is_text_equality() {
        let query = ListQuery::by_field("difficulty", "medium");
        assert_eq!(ids(&query.apply(tours())), vec!["b"]);
    }
}
