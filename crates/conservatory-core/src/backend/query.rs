//! Table query description shared by the REST and in-memory backends.
//!
//! A `Query` is a list of filters, an ordering, and an optional limit. The
//! REST backend renders it as PostgREST query parameters; the in-memory
//! backend evaluates it directly against JSON rows.

use std::cmp::Ordering;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    NotNull(String),
    /// Matches when any nested filter matches.
    AnyOf(Vec<Filter>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: &str) -> Self {
        Self::new().eq("id", id)
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.to_string(), value.into()))
    }

    pub fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Neq(column.to_string(), value.into()))
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt(column.to_string(), value.into()))
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lte(column.to_string(), value.into()))
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gt(column.to_string(), value.into()))
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gte(column.to_string(), value.into()))
    }

    pub fn in_list<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Filter::In(column.to_string(), values))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(Filter::IsNull(column.to_string()))
    }

    pub fn not_null(self, column: &str) -> Self {
        self.filter(Filter::NotNull(column.to_string()))
    }

    pub fn any_of(self, filters: Vec<Filter>) -> Self {
        self.filter(Filter::AnyOf(filters))
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            descending: false,
        });
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render as PostgREST query parameters.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|f| match f {
                Filter::AnyOf(inner) => (
                    "or".to_string(),
                    format!(
                        "({})",
                        inner
                            .iter()
                            .map(Filter::to_nested_expr)
                            .collect::<Vec<_>>()
                            .join(",")
                    ),
                ),
                other => (other.column().to_string(), other.to_operator_expr()),
            })
            .collect();

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| {
                    format!(
                        "{}.{}",
                        o.column,
                        if o.descending { "desc" } else { "asc" }
                    )
                })
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Evaluate the filters against a single row.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Apply ordering and limit to rows that already passed `matches`.
    /// The sort is stable so rows with equal keys keep insertion order.
    pub fn arrange(&self, rows: &mut Vec<Value>) {
        if !self.order.is_empty() {
            rows.sort_by(|a, b| {
                for o in &self.order {
                    let ord = cmp_nulls_last(a.get(&o.column), b.get(&o.column), o.descending);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
    }
}

impl Filter {
    fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::Lt(c, _)
            | Filter::Lte(c, _)
            | Filter::Gt(c, _)
            | Filter::Gte(c, _)
            | Filter::In(c, _)
            | Filter::IsNull(c)
            | Filter::NotNull(c) => c,
            Filter::AnyOf(_) => "or",
        }
    }

    fn to_operator_expr(&self) -> String {
        match self {
            Filter::Eq(_, v) => format!("eq.{}", render_value(v)),
            Filter::Neq(_, v) => format!("neq.{}", render_value(v)),
            Filter::Lt(_, v) => format!("lt.{}", render_value(v)),
            Filter::Lte(_, v) => format!("lte.{}", render_value(v)),
            Filter::Gt(_, v) => format!("gt.{}", render_value(v)),
            Filter::Gte(_, v) => format!("gte.{}", render_value(v)),
            Filter::In(_, values) => format!(
                "in.({})",
                values
                    .iter()
                    .map(render_list_value)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Filter::IsNull(_) => "is.null".to_string(),
            Filter::NotNull(_) => "not.is.null".to_string(),
            Filter::AnyOf(inner) => format!(
                "or({})",
                inner
                    .iter()
                    .map(Filter::to_nested_expr)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }

    /// Inside `or=(...)` PostgREST uses `column.op.value` instead of `column=op.value`.
    fn to_nested_expr(&self) -> String {
        match self {
            Filter::AnyOf(_) => self.to_operator_expr(),
            other => format!("{}.{}", other.column(), other.to_operator_expr()),
        }
    }

    pub fn matches(&self, row: &Value) -> bool {
        let field = |c: &str| row.get(c).filter(|v| !v.is_null());
        match self {
            Filter::Eq(c, v) => field(c).is_some_and(|f| values_equal(f, v)),
            Filter::Neq(c, v) => field(c).is_some_and(|f| !values_equal(f, v)),
            Filter::Lt(c, v) => cmp_field(field(c), v) == Some(Ordering::Less),
            Filter::Lte(c, v) => matches!(
                cmp_field(field(c), v),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::Gt(c, v) => cmp_field(field(c), v) == Some(Ordering::Greater),
            Filter::Gte(c, v) => matches!(
                cmp_field(field(c), v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::In(c, values) => {
                field(c).is_some_and(|f| values.iter().any(|v| values_equal(f, v)))
            }
            Filter::IsNull(c) => field(c).is_none(),
            Filter::NotNull(c) => field(c).is_some(),
            Filter::AnyOf(inner) => inner.iter().any(|f| f.matches(row)),
        }
    }
}

fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn render_list_value(v: &Value) -> String {
    match v {
        Value::String(s) if s.contains([',', '(', ')', '"']) => {
            format!("\"{}\"", s.replace('"', "\\\""))
        }
        other => render_value(other),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn cmp_field(field: Option<&Value>, v: &Value) -> Option<Ordering> {
    compare_values(field?, v)
}

fn cmp_nulls_last(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ord = compare_values(x, y).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}
