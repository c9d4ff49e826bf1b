//! Dynamic WHERE-clause construction for the filtered list queries.
//!
//! Each optional predicate is ANDed in only when its value is present, and
//! every value travels as a bind parameter. Column names and sort keys are
//! always `'static` strings chosen by the caller, never client input.

use sqlx::{
    postgres::PgArguments,
    query::{QueryAs, QueryScalar},
    Postgres,
};

use crate::filters::Filters;

/// Typed bind value for dynamically-built list queries.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    BigInt(i64),
    Text(String),
    TextArray(Vec<String>),
}

#[derive(Debug, Default)]
pub struct WhereBuilder {
    conditions: Vec<String>,
    binds: Vec<BindValue>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, condition: String, value: BindValue) {
        self.conditions.push(condition);
        self.binds.push(value);
    }

    fn placeholder(&self) -> usize {
        self.binds.len() + 1
    }

    /// Case-insensitive substring match. `%`, `_` and `\` in `value` match
    /// literally.
    pub fn ilike(&mut self, column: &'static str, value: &str) -> &mut Self {
        if !value.is_empty() {
            let idx = self.placeholder();
            self.push(
                format!("{column} ILIKE ${idx}"),
                BindValue::Text(format!("%{}%", escape_like(value))),
            );
        }
        self
    }

    pub fn eq_text(&mut self, column: &'static str, value: &str) -> &mut Self {
        if !value.is_empty() {
            let idx = self.placeholder();
            self.push(format!("{column} = ${idx}"), BindValue::Text(value.to_string()));
        }
        self
    }

    pub fn eq_int(&mut self, column: &'static str, value: Option<i64>) -> &mut Self {
        if let Some(v) = value {
            let idx = self.placeholder();
            self.push(format!("{column} = ${idx}"), BindValue::BigInt(v));
        }
        self
    }

    /// Array containment: the row must hold every one of `values`.
    pub fn contains_all(&mut self, column: &'static str, values: &[String]) -> &mut Self {
        if !values.is_empty() {
            let idx = self.placeholder();
            self.push(
                format!("{column} @> ${idx}"),
                BindValue::TextArray(values.to_vec()),
            );
        }
        self
    }

    /// Empty when no predicate is active, otherwise starts with `WHERE `.
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Index of the next free `$n` placeholder.
    pub fn next_index(&self) -> usize {
        self.placeholder()
    }

    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// ORDER BY for a safelisted sort, falling back to primary-key order.
pub fn order_clause(filters: &Filters) -> String {
    match filters.sort_column() {
        Some(column) if column == "id" => format!("ORDER BY id {}", filters.sort_direction()),
        Some(column) => format!("ORDER BY {column} {}, id ASC", filters.sort_direction()),
        None => "ORDER BY id ASC".to_string(),
    }
}

pub fn bind_query_as<'q, O>(
    mut q: QueryAs<'q, Postgres, O, PgArguments>,
    binds: &[BindValue],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for val in binds {
        q = match val {
            BindValue::BigInt(v) => q.bind(*v),
            BindValue::Text(v) => q.bind(v.clone()),
            BindValue::TextArray(v) => q.bind(v.clone()),
        };
    }
    q
}

pub fn bind_query_scalar<'q>(
    mut q: QueryScalar<'q, Postgres, i64, PgArguments>,
    binds: &[BindValue],
) -> QueryScalar<'q, Postgres, i64, PgArguments> {
    for val in binds {
        q = match val {
            BindValue::BigInt(v) => q.bind(*v),
            BindValue::Text(v) => q.bind(v.clone()),
            BindValue::TextArray(v) => q.bind(v.clone()),
        };
    }
    q
}
