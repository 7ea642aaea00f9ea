//! # Query Request Model
//!
//! Wire types for the analytics query endpoint. Requests arrive as camelCase
//! JSON; every response cell is text.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{QueryError, Result};

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Traces,
    Logs,
    Exceptions,
}

/// A declarative analytics query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub data_type: DataType,
    /// Missing range falls back to a window ending now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    pub select: Vec<SelectField>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub group_by: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub order_by: Vec<OrderBy>,
    /// Non-positive limits read as absent.
    #[serde(
        default,
        deserialize_with = "positive_limit",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectField {
    pub function: SelectFunction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<FunctionParam>,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectFunction {
    Col,
    Custom,
    TimeBucket,
    Apdex,
    InteractionSuccessCount,
    InteractionErrorCount,
    InteractionErrorDistinctUsers,
    FrozenFrame,
    Anr,
    Crash,
    UserCategoryExcellent,
    UserCategoryGood,
    UserCategoryAverage,
    UserCategoryPoor,
    DurationP50,
    DurationP95,
    DurationP99,
    #[serde(rename = "NET_0")]
    Net0,
    #[serde(rename = "NET_2XX")]
    Net2xx,
    #[serde(rename = "NET_3XX")]
    Net3xx,
    #[serde(rename = "NET_4XX")]
    Net4xx,
    #[serde(rename = "NET_5XX")]
    Net5xx,
}

/// `{field}` for COL, `{expression, bucket?}` for CUSTOM and TIME_BUCKET.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionParam {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    /// Scalars and numbers are normalised to a list of strings.
    #[serde(default, deserialize_with = "one_or_many")]
    pub value: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOperator {
    Eq,
    In,
    Like,
    /// Raw predicate carried in `value`; never narrows a dimension.
    Additional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

// =============================================================================
// Response
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResponse {
    pub fn column(&self, alias: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == alias)
    }

    /// All cells of one column, in row order.
    pub fn values(&self, alias: &str) -> Vec<&str> {
        match self.column(alias) {
            Some(idx) => self.rows.iter().map(|r| r[idx].as_str()).collect(),
            None => Vec::new(),
        }
    }
}

// =============================================================================
// Accessors
// =============================================================================

impl QueryRequest {
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(QueryError::from)
    }

    /// Aliases in select order; these are the response fields.
    pub fn aliases(&self) -> Vec<String> {
        self.select.iter().map(|s| s.alias.clone()).collect()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.select.iter().any(|s| s.alias == alias)
    }

    pub fn has_alias_ignore_case(&self, alias: &str) -> bool {
        self.select.iter().any(|s| s.alias.eq_ignore_ascii_case(alias))
    }

    pub fn has_time_bucket(&self) -> bool {
        self.select
            .iter()
            .any(|s| s.function == SelectFunction::TimeBucket)
    }

    pub fn time_bucket_field(&self) -> Option<&SelectField> {
        self.select
            .iter()
            .find(|s| s.function == SelectFunction::TimeBucket)
    }

    /// `t1` is the conventional bucket alias even when no TIME_BUCKET select names it.
    pub fn is_time_alias(&self, name: &str) -> bool {
        name == "t1"
            || self
                .select
                .iter()
                .any(|s| s.function == SelectFunction::TimeBucket && s.alias == name)
    }

    pub fn groups_by(&self, field: &str) -> bool {
        self.group_by.iter().any(|g| g == field)
    }

    /// Group-by entries that are real dimensions rather than bucket aliases.
    pub fn dimension_groups(&self) -> impl Iterator<Item = &String> {
        self.group_by.iter().filter(|g| !self.is_time_alias(g))
    }

    pub fn is_grouped(&self) -> bool {
        self.dimension_groups().next().is_some()
    }

    /// The COL select whose alias names this group-by entry.
    pub fn column_for_group(&self, group: &str) -> Option<&SelectField> {
        self.select
            .iter()
            .find(|s| s.function == SelectFunction::Col && s.alias == group)
    }

    pub fn filter(&self, field: &str, operator: FilterOperator) -> Option<&Filter> {
        self.filters
            .iter()
            .find(|f| f.field == field && f.operator == operator)
    }

    pub fn filter_value(&self, field: &str, operator: FilterOperator) -> Option<&str> {
        self.filter(field, operator).and_then(Filter::first_value)
    }

    pub fn uses_expression(&self, fragment: &str) -> bool {
        self.select.iter().any(|s| {
            s.function == SelectFunction::Custom
                && s.param
                    .as_ref()
                    .and_then(|p| p.expression.as_deref())
                    .is_some_and(|e| e.contains(fragment))
        })
    }

    /// A zero limit is treated as absent.
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|l| *l > 0)
    }
}

impl SelectField {
    pub fn expression(&self) -> &str {
        self.param
            .as_ref()
            .and_then(|p| p.expression.as_deref())
            .unwrap_or("")
    }

    pub fn column(&self) -> Option<&str> {
        self.param.as_ref().and_then(|p| p.field.as_deref())
    }
}

impl Filter {
    /// Whether the filter names a field whose values can narrow results.
    pub fn is_structured(&self) -> bool {
        self.operator != FilterOperator::Additional
    }

    pub fn first_value(&self) -> Option<&str> {
        self.value
            .iter()
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }
}

// =============================================================================
// Serde helpers
// =============================================================================

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    })
}

fn positive_limit<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.filter(|l| *l > 0).and_then(|l| usize::try_from(l).ok()))
}

fn scalar_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
