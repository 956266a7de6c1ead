//! Query Builder: turns raw query-string parameters into typed filter, sort,
//! projection and paging specifications.
//!
//! Every field name is checked against the record type's allow-list and
//! every operator against [`FilterOp`], so nothing from the query string
//! reaches the store uninterpreted.

mod pagination;

use std::cmp::Ordering;
use std::collections::HashMap;

use shelf_http::error::AppError;
use shelf_kernel::settings::PaginationSettings;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub use pagination::{PageRef, PageWindow, Pagination};

/// Parameters consumed by the builder itself rather than used as filters.
pub const RESERVED_KEYS: [&str; 4] = ["select", "sort", "page", "limit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Timestamp,
}

/// A field value as seen by filters and sorts.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Missing,
    Text(String),
    Number(f64),
    Timestamp(OffsetDateTime),
}

impl FieldValue {
    fn parse(kind: FieldKind, raw: &str) -> Option<Self> {
        match kind {
            FieldKind::Text => Some(Self::Text(raw.to_string())),
            FieldKind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Self::Number),
            FieldKind::Timestamp => OffsetDateTime::parse(raw.trim(), &Rfc3339)
                .ok()
                .map(Self::Timestamp),
        }
    }

    /// Missing values order before everything else.
    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Missing, Self::Missing) => Some(Ordering::Equal),
            (Self::Missing, _) => Some(Ordering::Less),
            (_, Self::Missing) => Some(Ordering::Greater),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// The allow-listed fields of a queryable record type.
pub trait QueryField: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    fn parse(name: &str) -> Option<Self>;
    fn name(self) -> &'static str;
    fn kind(self) -> FieldKind;
    /// Ordering applied when the request names none.
    fn default_sort() -> SortKey<Self>;
}

/// A record that filters and sorts can inspect.
pub trait Queryable {
    type Field: QueryField;

    fn id(&self) -> &str;
    fn field(&self, field: Self::Field) -> FieldValue;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition<F> {
    pub field: F,
    pub op: FilterOp,
    pub operands: Vec<FieldValue>,
}

impl<F: QueryField> Condition<F> {
    fn matches<R: Queryable<Field = F>>(&self, record: &R) -> bool {
        let value = record.field(self.field);
        if value == FieldValue::Missing {
            return false;
        }

        let against = |operand: &FieldValue| value.compare(operand);
        let first = self.operands.first().and_then(against);
        match self.op {
            FilterOp::Eq => first == Some(Ordering::Equal),
            FilterOp::In => self
                .operands
                .iter()
                .any(|operand| against(operand) == Some(Ordering::Equal)),
            FilterOp::Gt => first == Some(Ordering::Greater),
            FilterOp::Gte => matches!(first, Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => first == Some(Ordering::Less),
            FilterOp::Lte => matches!(first, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

/// Conjunction of conditions; an empty spec matches everything.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec<F> {
    pub conditions: Vec<Condition<F>>,
}

impl<F> Default for FilterSpec<F> {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }
}

impl<F: QueryField> FilterSpec<F> {
    pub fn matches<R: Queryable<Field = F>>(&self, record: &R) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey<F> {
    pub field: F,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec<F> {
    pub keys: Vec<SortKey<F>>,
}

impl<F: QueryField> SortSpec<F> {
    /// Ties on every key are broken by ascending id.
    pub fn compare<R: Queryable<Field = F>>(&self, a: &R, b: &R) -> Ordering {
        for key in &self.keys {
            let ordering = a
                .field(key.field)
                .compare(&b.field(key.field))
                .unwrap_or(Ordering::Equal);
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id().cmp(b.id())
    }
}

/// Everything a list request asks of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec<F> {
    pub filter: FilterSpec<F>,
    pub sort: SortSpec<F>,
    /// Fields to return besides the id; empty means all.
    pub select: Vec<F>,
    pub window: PageWindow,
}

impl<F: QueryField> QuerySpec<F> {
    /// Filter, order and page `records`, returning the page together with
    /// the number of records that matched before paging.
    pub fn apply<R>(&self, records: Vec<R>) -> (Vec<R>, u64)
    where
        R: Queryable<Field = F>,
    {
        let mut matched: Vec<R> = records
            .into_iter()
            .filter(|record| self.filter.matches(record))
            .collect();
        let total = matched.len() as u64;
        matched.sort_by(|a, b| self.sort.compare(a, b));
        (self.window.slice(matched), total)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("unsupported operator '{op}' on field '{field}'")]
    UnsupportedOperator { field: String, op: String },

    #[error("invalid value '{value}' for field '{field}'")]
    InvalidValue { field: &'static str, value: String },
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    default_limit: u64,
    max_limit: Option<u64>,
}

impl QueryBuilder {
    pub fn new(settings: &PaginationSettings) -> Self {
        Self {
            default_limit: settings.default_limit.max(1),
            max_limit: settings.max_limit.map(|max| max.max(1)),
        }
    }

    pub fn window(&self, params: &HashMap<String, String>) -> PageWindow {
        PageWindow::from_params(
            params.get("page").map(String::as_str),
            params.get("limit").map(String::as_str),
            self.default_limit,
            self.max_limit,
        )
    }

    pub fn build<F: QueryField>(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<QuerySpec<F>, QueryError> {
        Ok(QuerySpec {
            filter: filter_spec(params)?,
            sort: sort_spec(params.get("sort").map(String::as_str))?,
            select: select_list(params.get("select").map(String::as_str))?,
            window: self.window(params),
        })
    }
}

fn filter_spec<F: QueryField>(params: &HashMap<String, String>) -> Result<FilterSpec<F>, QueryError> {
    let mut keys: Vec<&String> = params
        .keys()
        .filter(|key| !RESERVED_KEYS.contains(&key.as_str()))
        .collect();
    keys.sort();

    let mut conditions = Vec::with_capacity(keys.len());
    for key in keys {
        let (name, op) = split_key(key)?;
        let field = F::parse(name).ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
        let raw = &params[key];

        let operands = match op {
            FilterOp::In => raw
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| operand(field, v))
                .collect::<Result<Vec<_>, _>>()?,
            _ => vec![operand(field, raw)?],
        };
        conditions.push(Condition {
            field,
            op,
            operands,
        });
    }

    Ok(FilterSpec { conditions })
}

/// Split `field[op]` or `field.op` into its parts; a bare key is equality.
fn split_key(key: &str) -> Result<(&str, FilterOp), QueryError> {
    let parts = if let Some(open) = key.find('[') {
        match key[open + 1..].strip_suffix(']') {
            Some(op) => Some((&key[..open], op)),
            None => return Err(QueryError::UnknownField(key.to_string())),
        }
    } else {
        key.split_once('.')
    };

    match parts {
        None => Ok((key, FilterOp::Eq)),
        Some((name, op)) => FilterOp::parse(op).map(|op| (name, op)).ok_or_else(|| {
            QueryError::UnsupportedOperator {
                field: name.to_string(),
                op: op.to_string(),
            }
        }),
    }
}

fn operand<F: QueryField>(field: F, raw: &str) -> Result<FieldValue, QueryError> {
    FieldValue::parse(field.kind(), raw).ok_or_else(|| QueryError::InvalidValue {
        field: field.name(),
        value: raw.to_string(),
    })
}

fn sort_spec<F: QueryField>(raw: Option<&str>) -> Result<SortSpec<F>, QueryError> {
    let mut keys = Vec::new();
    for item in raw.unwrap_or_default().split(',').map(str::trim) {
        if item.is_empty() {
            continue;
        }
        let (name, direction) = match item.strip_prefix('-') {
            Some(name) => (name, SortDirection::Desc),
            None => (item.trim_start_matches('+'), SortDirection::Asc),
        };
        let field = F::parse(name).ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
        keys.push(SortKey { field, direction });
    }

    if keys.is_empty() {
        keys.push(F::default_sort());
    }
    Ok(SortSpec { keys })
}

fn select_list<F: QueryField>(raw: Option<&str>) -> Result<Vec<F>, QueryError> {
    let mut fields = Vec::new();
    for name in raw.unwrap_or_default().split(',').map(str::trim) {
        if name.is_empty() {
            continue;
        }
        let field = F::parse(name).ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    Ok(fields)
}
