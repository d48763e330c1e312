//! Query features: filtering, keyword search, field selection, sorting and pagination
//!
//! A client query string is turned into an immutable [`QuerySpec`] by a fixed
//! pipeline of pure stages:
//!
//! ```text
//! filter → search → limit_fields → sort → paginate(total)
//! ```
//!
//! Pagination runs last because it needs the number of documents matching the
//! filter and the keyword search, which only the store can count.
//!
//! # Query string format
//!
//! ```text
//! GET /products?price[gte]=50&price[lt]=200&brand=<uuid>
//!              &keyword=shirt&fields=title,price&sort=-price,title
//!              &page=2&limit=20
//! ```
//!
//! Any parameter outside `page, limit, sort, fields, keyword` is a filter on
//! the field of the same name. There is no field allow-list: unknown fields
//! simply match nothing. Keys that are not a plain (dotted) field name,
//! optionally followed by one of `[gte] [gt] [lte] [lt]`, reject the whole
//! request.

use crate::core::entity::EntityKind;
use crate::core::error::{Result, ShopError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Query parameters that are never treated as filters
pub const RESERVED_PARAMS: [&str; 5] = ["page", "limit", "sort", "fields", "keyword"];

/// Internal revision field hidden from list results by default
pub const VERSION_FIELD: &str = "version";

/// Raw query-string parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    /// Build from key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Paging limits applied when the client does not specify them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefaults {
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

fn default_limit() -> u64 {
    50
}

fn default_max_limit() -> u64 {
    100
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Comparison operator of a filter clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Parse a range token as written in the query string (`price[gte]`)
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    /// The MongoDB operator for this comparison
    pub fn mongo_operator(&self) -> &'static str {
        match self {
            CompareOp::Eq => "$eq",
            CompareOp::Gt => "$gt",
            CompareOp::Gte => "$gte",
            CompareOp::Lt => "$lt",
            CompareOp::Lte => "$lte",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }
}

/// One `field op value` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Clause {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Equality clause
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CompareOp::Eq, value)
    }

    /// Evaluate against a JSON document.
    ///
    /// Array fields match when any element matches. Query-string values are
    /// strings; they are coerced to the document's type (number, boolean,
    /// timestamp) before comparing.
    pub fn matches(&self, doc: &Value) -> bool {
        match lookup(doc, &self.field) {
            None | Some(Value::Null) => self.op == CompareOp::Eq && self.value.is_null(),
            Some(Value::Array(items)) => items.iter().any(|item| self.matches_scalar(item)),
            Some(target) => self.matches_scalar(target),
        }
    }

    fn matches_scalar(&self, target: &Value) -> bool {
        compare_scalar(target, &self.value).is_some_and(|ord| self.op.accepts(ord))
    }
}

/// Conjunction of clauses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub clauses: Vec<Clause>,
}

impl Filter {
    /// A filter matching every document
    pub fn all() -> Self {
        Self::default()
    }

    /// A single equality filter
    pub fn by(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(Clause::eq(field, value))
    }

    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Concatenate two filters
    pub fn merge(mut self, other: Filter) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|c| c.matches(doc))
    }
}

// =============================================================================
// Search, projection, sort
// =============================================================================

/// Case-insensitive literal substring match, OR-combined over `fields`
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub keyword: String,
    pub fields: Vec<String>,
}

impl Search {
    pub fn matches(&self, doc: &Value) -> bool {
        let needle = self.keyword.to_lowercase();
        self.fields.iter().any(|field| {
            lookup(doc, field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(&needle))
        })
    }
}

/// Which fields a list query returns
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Every field except the internal version
    Default,
    /// Only these fields (plus `id`)
    Only(Vec<String>),
}

impl Projection {
    pub fn apply(&self, doc: Value) -> Value {
        match (self, doc) {
            (Projection::Default, Value::Object(mut map)) => {
                map.remove(VERSION_FIELD);
                Value::Object(map)
            }
            (Projection::Only(fields), Value::Object(map)) => {
                let source = Value::Object(map);
                let mut out = Map::new();
                if let Some(id) = source.get("id") {
                    out.insert("id".to_string(), id.clone());
                }
                for field in fields {
                    if let Some(value) = lookup(&source, field) {
                        insert_path(&mut out, field, value.clone());
                    }
                }
                Value::Object(out)
            }
            (_, other) => other,
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Compare two documents by a list of sort keys
pub fn compare_documents(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ord = compare_for_sort(lookup(a, &key.field), lookup(b, &key.field));
        let ord = if key.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

// =============================================================================
// QuerySpec and the pipeline
// =============================================================================

/// Storage-agnostic description of a read query
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub filter: Filter,
    pub search: Option<Search>,
    pub projection: Projection,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl QuerySpec {
    /// Unbounded query over `base`
    pub fn new(base: Filter) -> Self {
        Self {
            filter: base,
            search: None,
            projection: Projection::Default,
            sort: Vec::new(),
            skip: 0,
            limit: None,
        }
    }

    /// Whether a document satisfies both the filter and the keyword search
    pub fn matches(&self, doc: &Value) -> bool {
        self.filter.matches(doc) && self.search.as_ref().is_none_or(|s| s.matches(doc))
    }
}

/// Pagination descriptor returned alongside list results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u64,
    pub limit: u64,
    pub number_of_pages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<u64>,
}

/// Largest skip handed to a store; backends take signed offsets
const MAX_SKIP: u64 = i64::MAX as u64;

fn skip_for(page: u64, limit: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit).min(MAX_SKIP)
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        Self {
            current_page: page,
            limit,
            number_of_pages: total.div_ceil(limit),
            next: (page.saturating_mul(limit) < total).then(|| page + 1),
            prev: (skip_for(page, limit) > 0).then(|| page - 1),
        }
    }
}

/// Stage 1: every non-reserved parameter becomes a clause
pub fn filter(mut spec: QuerySpec, params: &QueryParams) -> Result<QuerySpec> {
    for (key, value) in params.iter() {
        if RESERVED_PARAMS.contains(&key) {
            continue;
        }
        let (field, op) = parse_filter_key(key)?;
        spec.filter.clauses.push(Clause::new(field, op, value));
    }
    Ok(spec)
}

/// Stage 2: keyword search, merged with the filter
pub fn search(mut spec: QuerySpec, params: &QueryParams, kind: EntityKind) -> QuerySpec {
    if let Some(keyword) = params.get("keyword").filter(|k| !k.is_empty()) {
        spec.search = Some(Search {
            keyword: keyword.to_string(),
            fields: kind.search_fields().iter().map(|f| f.to_string()).collect(),
        });
    }
    spec
}

/// Stage 3: field selection
pub fn limit_fields(mut spec: QuerySpec, params: &QueryParams) -> Result<QuerySpec> {
    spec.projection = match params.get("fields") {
        Some(fields) => Projection::Only(split_field_list(fields, "fields")?),
        None => Projection::Default,
    };
    Ok(spec)
}

/// Stage 4: sort keys, newest first by default
pub fn sort(mut spec: QuerySpec, params: &QueryParams) -> Result<QuerySpec> {
    spec.sort = match params.get("sort") {
        Some(raw) => split_field_list(raw, "sort")?
            .into_iter()
            .map(|token| match token.strip_prefix('-') {
                Some(field) => SortKey::desc(field),
                None => SortKey::asc(token),
            })
            .collect(),
        None => vec![SortKey::desc("created_at")],
    };
    Ok(spec)
}

/// Stage 5: skip/limit from `page` and `limit`, given the matching count
pub fn paginate(
    mut spec: QuerySpec,
    params: &QueryParams,
    defaults: &QueryDefaults,
    total: u64,
) -> (QuerySpec, Pagination) {
    let page = positive_param(params, "page").unwrap_or(1);
    let limit = positive_param(params, "limit")
        .unwrap_or(defaults.default_limit)
        .min(defaults.max_limit.max(1));

    let pagination = Pagination::new(page, limit, total);
    spec.skip = skip_for(page, pagination.limit);
    spec.limit = Some(pagination.limit);
    (spec, pagination)
}

/// Run stages 1–4; the caller counts matches and finishes with [`paginate`]
pub fn prepare(base: Filter, params: &QueryParams, kind: EntityKind) -> Result<QuerySpec> {
    let spec = filter(QuerySpec::new(base), params)?;
    let spec = search(spec, params, kind);
    let spec = limit_fields(spec, params)?;
    sort(spec, params)
}

fn positive_param(params: &QueryParams, key: &str) -> Option<u64> {
    params
        .get(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v >= 1)
}

fn parse_filter_key(key: &str) -> Result<(String, CompareOp)> {
    let malformed = || ShopError::Validation(format!("malformed query parameter '{}'", key));

    let (field, op) = match key.split_once('[') {
        None => (key, CompareOp::Eq),
        Some((field, rest)) => {
            let token = rest.strip_suffix(']').ok_or_else(malformed)?;
            (field, CompareOp::from_token(token).ok_or_else(malformed)?)
        }
    };

    if !is_valid_field_name(field) {
        return Err(malformed());
    }
    Ok((field.to_string(), op))
}

fn split_field_list(raw: &str, param: &str) -> Result<Vec<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|token| {
            let name = token.strip_prefix('-').unwrap_or(token);
            if is_valid_field_name(name) {
                Ok(token.to_string())
            } else {
                Err(ShopError::Validation(format!(
                    "invalid field '{}' in '{}'",
                    token, param
                )))
            }
        })
        .collect()
}

/// `[A-Za-z0-9_]+` segments separated by dots
pub fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

// =============================================================================
// JSON document helpers
// =============================================================================

/// Resolve a dotted path inside a JSON document
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

fn insert_path(out: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            out.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = out
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn compare_scalar(target: &Value, wanted: &Value) -> Option<Ordering> {
    match (target, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Number(a), Value::String(b)) => {
            a.as_f64()?.partial_cmp(&b.trim().parse::<f64>().ok()?)
        }
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::String(b)) => Some(a.cmp(&b.parse::<bool>().ok()?)),
        (Value::String(a), Value::String(b)) => match (parse_timestamp(a), parse_timestamp(b)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(a.as_str().cmp(b.as_str())),
        },
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (parse_timestamp(x), parse_timestamp(y)) {
                (Some(dx), Some(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_filter_skips_reserved_params() {
        let spec = filter(
            QuerySpec::new(Filter::all()),
            &params(&[
                ("page", "2"),
                ("limit", "5"),
                ("sort", "price"),
                ("keyword", "x"),
                ("fields", "title"),
                ("color", "red"),
            ]),
        )
        .unwrap();
        assert_eq!(spec.filter.clauses, vec![Clause::eq("color", "red")]);
    }

    #[test]
    fn test_filter_translates_range_operators() {
        let spec = filter(
            QuerySpec::new(Filter::all()),
            &params(&[("price[gte]", "50"), ("ratings_average[lt]", "4")]),
        )
        .unwrap();
        assert!(spec.filter.clauses.contains(&Clause::new("price", CompareOp::Gte, "50")));
        assert!(spec.filter.clauses.contains(&Clause::new("ratings_average", CompareOp::Lt, "4")));

        assert!(spec.filter.matches(&json!({"price": 50.0, "ratings_average": 3.5})));
        assert!(!spec.filter.matches(&json!({"price": 49.99, "ratings_average": 3.5})));
        assert!(!spec.filter.matches(&json!({"price": 80, "ratings_average": 4})));
    }

    #[test]
    fn test_filter_rejects_malformed_keys() {
        for key in ["price[foo]", "price[gte", "$where", "price[gte]x", "a..b", ""] {
            let result = filter(QuerySpec::new(Filter::all()), &params(&[(key, "1")]));
            assert!(matches!(result, Err(ShopError::Validation(_))), "{key} should be rejected");
        }
    }

    #[test]
    fn test_filter_keeps_base_clauses() {
        let base = Filter::by("category", "c1");
        let spec = filter(QuerySpec::new(base), &params(&[("brand", "b1")])).unwrap();
        assert_eq!(spec.filter.clauses.len(), 2);
        assert!(spec.matches(&json!({"category": "c1", "brand": "b1"})));
        assert!(!spec.matches(&json!({"category": "c2", "brand": "b1"})));
    }

    #[test]
    fn test_equality_coerces_query_strings() {
        assert!(Clause::eq("active", "true").matches(&json!({"active": true})));
        assert!(Clause::eq("quantity", "3").matches(&json!({"quantity": 3})));
        assert!(!Clause::eq("quantity", "three").matches(&json!({"quantity": 3})));
        assert!(!Clause::eq("missing", "x").matches(&json!({"quantity": 3})));
    }

    #[test]
    fn test_array_field_matches_any_element() {
        let doc = json!({"colors": ["red", "blue"]});
        assert!(Clause::eq("colors", "blue").matches(&doc));
        assert!(!Clause::eq("colors", "green").matches(&doc));
    }

    #[test]
    fn test_dotted_paths() {
        let doc = json!({"shipping_address": {"city": "Riyadh"}});
        assert!(Clause::eq("shipping_address.city", "Riyadh").matches(&doc));
    }

    #[test]
    fn test_timestamp_range() {
        let doc = json!({"created_at": "2026-03-01T10:00:00.123456789Z"});
        assert!(Clause::new("created_at", CompareOp::Gte, "2026-03-01T00:00:00Z").matches(&doc));
        assert!(!Clause::new("created_at", CompareOp::Gt, "2026-03-02T00:00:00Z").matches(&doc));
    }

    #[test]
    fn test_search_product_matches_title_or_description() {
        let spec = search(
            QuerySpec::new(Filter::all()),
            &params(&[("keyword", "shirt")]),
            EntityKind::Product,
        );
        assert!(spec.matches(&json!({"title": "Blue SHIRT", "description": ""})));
        assert!(spec.matches(&json!({"title": "Top", "description": "a linen shirt"})));
        assert!(!spec.matches(&json!({"title": "Top", "description": "linen", "name": "shirt"})));
    }

    #[test]
    fn test_search_named_matches_name_only() {
        let spec = search(
            QuerySpec::new(Filter::all()),
            &params(&[("keyword", "ELEC")]),
            EntityKind::Named,
        );
        assert!(spec.matches(&json!({"name": "Electronics"})));
        assert!(!spec.matches(&json!({"title": "Electronics"})));
    }

    #[test]
    fn test_search_is_merged_with_filter() {
        let spec = prepare(
            Filter::all(),
            &params(&[("keyword", "shirt"), ("color", "red")]),
            EntityKind::Product,
        )
        .unwrap();
        assert!(spec.matches(&json!({"title": "shirt", "color": "red"})));
        assert!(!spec.matches(&json!({"title": "shirt", "color": "blue"})));
        assert!(!spec.matches(&json!({"title": "pants", "color": "red"})));
    }

    #[test]
    fn test_keyword_is_literal() {
        let spec = search(
            QuerySpec::new(Filter::all()),
            &params(&[("keyword", ".*")]),
            EntityKind::Named,
        );
        assert!(!spec.matches(&json!({"name": "anything"})));
        assert!(spec.matches(&json!({"name": "wild.*card"})));
    }

    #[test]
    fn test_limit_fields() {
        let spec =
            limit_fields(QuerySpec::new(Filter::all()), &params(&[("fields", "title,price")]))
                .unwrap();
        let doc = json!({"id": "1", "title": "T", "price": 3, "description": "d", "version": 2});
        assert_eq!(
            spec.projection.apply(doc.clone()),
            json!({"id": "1", "title": "T", "price": 3})
        );

        let spec = limit_fields(QuerySpec::new(Filter::all()), &params(&[])).unwrap();
        assert_eq!(
            spec.projection.apply(doc),
            json!({"id": "1", "title": "T", "price": 3, "description": "d"})
        );
    }

    #[test]
    fn test_sort_parsing() {
        let spec =
            sort(QuerySpec::new(Filter::all()), &params(&[("sort", "-price,title")])).unwrap();
        assert_eq!(spec.sort, vec![SortKey::desc("price"), SortKey::asc("title")]);

        let spec = sort(QuerySpec::new(Filter::all()), &params(&[])).unwrap();
        assert_eq!(spec.sort, vec![SortKey::desc("created_at")]);

        assert!(sort(QuerySpec::new(Filter::all()), &params(&[("sort", "price;drop")])).is_err());
    }

    #[test]
    fn test_compare_documents() {
        let keys = vec![SortKey::desc("price"), SortKey::asc("title")];
        let a = json!({"price": 10, "title": "b"});
        let b = json!({"price": 10, "title": "a"});
        let c = json!({"price": 20, "title": "z"});
        assert_eq!(compare_documents(&a, &b, &keys), Ordering::Greater);
        assert_eq!(compare_documents(&c, &a, &keys), Ordering::Less);
    }

    #[test]
    fn test_paginate_middle_page() {
        let (spec, pagination) = paginate(
            QuerySpec::new(Filter::all()),
            &params(&[("page", "2"), ("limit", "50")]),
            &QueryDefaults::default(),
            120,
        );
        assert_eq!(
            pagination,
            Pagination {
                current_page: 2,
                limit: 50,
                number_of_pages: 3,
                next: Some(3),
                prev: Some(1),
            }
        );
        assert_eq!(spec.skip, 50);
        assert_eq!(spec.limit, Some(50));
    }

    #[test]
    fn test_paginate_defaults_and_edges() {
        let (spec, pagination) = paginate(
            QuerySpec::new(Filter::all()),
            &params(&[("page", "abc"), ("limit", "0")]),
            &QueryDefaults::default(),
            10,
        );
        assert_eq!(pagination.current_page, 1);
        assert_eq!(pagination.limit, 50);
        assert_eq!(pagination.number_of_pages, 1);
        assert_eq!(pagination.next, None);
        assert_eq!(pagination.prev, None);
        assert_eq!(spec.skip, 0);

        let (_, last) = paginate(
            QuerySpec::new(Filter::all()),
            &params(&[("page", "3"), ("limit", "50")]),
            &QueryDefaults::default(),
            120,
        );
        assert_eq!(last.next, None);
        assert_eq!(last.prev, Some(2));

        let (_, empty) =
            paginate(QuerySpec::new(Filter::all()), &params(&[]), &QueryDefaults::default(), 0);
        assert_eq!(empty.number_of_pages, 0);
    }

    #[test]
    fn test_paginate_huge_page_saturates() {
        let (spec, pagination) = paginate(
            QuerySpec::new(Filter::all()),
            &params(&[("page", "18446744073709551615"), ("limit", "50")]),
            &QueryDefaults::default(),
            10,
        );
        assert_eq!(pagination.current_page, u64::MAX);
        assert_eq!(pagination.next, None);
        assert_eq!(pagination.prev, Some(u64::MAX - 1));
        assert_eq!(spec.skip, i64::MAX as u64);

        let pagination = Pagination::new(u64::MAX, 1, u64::MAX);
        assert_eq!(pagination.next, None);
    }

    #[test]
    fn test_paginate_caps_limit() {
        let (spec, pagination) = paginate(
            QuerySpec::new(Filter::all()),
            &params(&[("limit", "10000")]),
            &QueryDefaults::default(),
            500,
        );
        assert_eq!(pagination.limit, 100);
        assert_eq!(spec.limit, Some(100));
    }
}
