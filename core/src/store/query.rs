// tidemark/src/store/query.rs

//! Row transport type and the small query vocabulary shared by every backend.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A row as it travels between a backend and a container: a JSON object keyed by column name.
pub type Row = Map<String, Value>;

/// One predicate of a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
  Eq(String, Value),
  In(String, Vec<Value>),
}

/// Conjunction of column predicates. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
  predicates: Vec<Predicate>,
}

impl Filter {
  pub fn all() -> Self {
    Self::default()
  }

  pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.predicates.push(Predicate::Eq(column.into(), value.into()));
    self
  }

  pub fn any_of<V: Into<Value>>(mut self, column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
    self
      .predicates
      .push(Predicate::In(column.into(), values.into_iter().map(Into::into).collect()));
    self
  }

  pub fn predicates(&self) -> &[Predicate] {
    &self.predicates
  }

  pub fn is_empty(&self) -> bool {
    self.predicates.is_empty()
  }

  /// Missing columns compare as JSON `null`.
  pub fn matches(&self, row: &Row) -> bool {
    self.predicates.iter().all(|p| match p {
      Predicate::Eq(col, expected) => row.get(col).unwrap_or(&Value::Null) == expected,
      Predicate::In(col, allowed) => {
        let actual = row.get(col).unwrap_or(&Value::Null);
        allowed.iter().any(|v| v == actual)
      }
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
  pub column: &'static str,
  pub ascending: bool,
}

impl Order {
  pub const fn asc(column: &'static str) -> Self {
    Self { column, ascending: true }
  }

  pub const fn desc(column: &'static str) -> Self {
    Self {
      column,
      ascending: false,
    }
  }

  /// Sorts rows in place the way a backend's `ORDER BY` would: strings
  /// lexically (RFC 3339 timestamps sort chronologically), numbers
  /// numerically, nulls first when ascending.
  pub fn sort(&self, rows: &mut [Row]) {
    rows.sort_by(|a, b| {
      let ord = compare_values(a.get(self.column), b.get(self.column));
      if self.ascending {
        ord
      } else {
        ord.reverse()
      }
    });
  }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  match (a, b) {
    (Some(Value::String(x)), Some(Value::String(y))) => x.to_lowercase().cmp(&y.to_lowercase()).then_with(|| x.cmp(y)),
    (Some(Value::Number(x)), Some(Value::Number(y))) => {
      let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
      x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
    (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
    (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
    (None | Some(Value::Null), _) => Ordering::Less,
    (_, None | Some(Value::Null)) => Ordering::Greater,
    _ => Ordering::Equal,
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
  pub filter: Filter,
  pub order: Option<Order>,
}

impl Query {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn filter(mut self, filter: Filter) -> Self {
    self.filter = filter;
    self
  }

  pub fn order(mut self, order: Order) -> Self {
    self.order = Some(order);
    self
  }
}

/// How an [`Upsert`] treats the stored row when the conflict key already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Merge {
  /// Overwrite every non-key column present in the incoming row.
  Replace,
  /// Add the incoming numeric value of `column` to the stored one.
  Increment(String),
  /// Leave the stored row untouched and return it.
  Keep,
}

/// Atomic insert-or-merge keyed by a declared unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert {
  pub conflict: Vec<String>,
  pub merge: Merge,
}

impl Upsert {
  pub fn on<I, S>(conflict: I, merge: Merge) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      conflict: conflict.into_iter().map(Into::into).collect(),
      merge,
    }
  }
}

/// Column names are spliced into SQL by the Postgres backend; only plain identifiers are allowed.
pub fn is_identifier(name: &str) -> bool {
  !name.is_empty()
    && name.len() <= 63
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    && !name.starts_with(|c: char| c.is_ascii_digit())
}
