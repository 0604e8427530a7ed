//! Generic query representation: an ordered predicate list plus the
//! positional bindings those predicates reference.
//!
//! Invariant: [`FilterQuery::bindings`] is always the in-order flattening of
//! every predicate's values. Execution engines bind parameters by position,
//! so any code that removes a predicate must remove exactly its bindings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Range;

/// How a predicate joins the ones before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// Comparison operators for basic predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// `column <op> value`
    Basic {
        column: String,
        operator: Operator,
        value: Value,
        connector: Connector,
    },
    /// `column [NOT] IN (values...)`
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
        connector: Connector,
    },
    /// `column IS [NOT] NULL`
    Null {
        column: String,
        negated: bool,
        connector: Connector,
    },
    /// A parenthesised group.
    Nested {
        predicates: Vec<Predicate>,
        connector: Connector,
    },
}

impl Predicate {
    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::basic(column, Operator::Eq, value)
    }

    /// `column <op> value`
    pub fn basic(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Predicate::Basic {
            column: column.into(),
            operator,
            value: value.into(),
            connector: Connector::And,
        }
    }

    /// `column IN (values...)`
    pub fn is_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
            connector: Connector::And,
        }
    }

    /// `column NOT IN (values...)`
    pub fn not_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
            connector: Connector::And,
        }
    }

    /// `column IS NULL`
    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::Null {
            column: column.into(),
            negated: false,
            connector: Connector::And,
        }
    }

    /// `column IS NOT NULL`
    pub fn not_null(column: impl Into<String>) -> Self {
        Predicate::Null {
            column: column.into(),
            negated: true,
            connector: Connector::And,
        }
    }

    /// `( predicates... )`
    pub fn nested(predicates: Vec<Predicate>) -> Self {
        Predicate::Nested {
            predicates,
            connector: Connector::And,
        }
    }

    /// The same predicate joined with `OR`.
    pub fn or(mut self) -> Self {
        self.set_connector(Connector::Or);
        self
    }

    /// The column this predicate filters on. Nested groups have none.
    pub fn column(&self) -> Option<&str> {
        match self {
            Predicate::Basic { column, .. }
            | Predicate::In { column, .. }
            | Predicate::Null { column, .. } => Some(column),
            Predicate::Nested { .. } => None,
        }
    }

    pub fn connector(&self) -> Connector {
        match self {
            Predicate::Basic { connector, .. }
            | Predicate::In { connector, .. }
            | Predicate::Null { connector, .. }
            | Predicate::Nested { connector, .. } => *connector,
        }
    }

    pub fn set_connector(&mut self, value: Connector) {
        match self {
            Predicate::Basic { connector, .. }
            | Predicate::In { connector, .. }
            | Predicate::Null { connector, .. }
            | Predicate::Nested { connector, .. } => *connector = value,
        }
    }

    /// Values this predicate binds, in binding order.
    pub fn values(&self) -> Vec<&Value> {
        let mut out = Vec::new();
        self.collect_values(&mut out);
        out
    }

    fn collect_values<'a>(&'a self, out: &mut Vec<&'a Value>) {
        match self {
            Predicate::Basic { value, .. } => out.push(value),
            Predicate::In { values, .. } => out.extend(values.iter()),
            Predicate::Null { .. } => {}
            Predicate::Nested { predicates, .. } => {
                for p in predicates {
                    p.collect_values(out);
                }
            }
        }
    }

    /// Number of positional bindings this predicate occupies.
    pub fn binding_count(&self) -> usize {
        match self {
            Predicate::Basic { .. } => 1,
            Predicate::In { values, .. } => values.len(),
            Predicate::Null { .. } => 0,
            Predicate::Nested { predicates, .. } => {
                predicates.iter().map(Predicate::binding_count).sum()
            }
        }
    }
}

/// Binding ranges for each predicate, in order.
pub fn binding_ranges(predicates: &[Predicate]) -> Vec<Range<usize>> {
    let mut offset = 0;
    predicates
        .iter()
        .map(|p| {
            let start = offset;
            offset += p.binding_count();
            start..offset
        })
        .collect()
}

/// The query-builder surface the scoping layer needs.
///
/// Any builder exposing its predicate list and bindings can be scoped;
/// [`Query`] is the implementation used throughout this crate.
pub trait FilterQuery {
    fn predicates(&self) -> &[Predicate];

    fn bindings(&self) -> &[Value];

    fn set_predicates(&mut self, predicates: Vec<Predicate>);

    fn set_bindings(&mut self, bindings: Vec<Value>);

    /// Append a predicate and its bindings.
    fn push_predicate(&mut self, predicate: Predicate);

    /// Append `column = value`.
    fn add_where(&mut self, column: &str, value: Value) {
        self.push_predicate(Predicate::eq(column, value));
    }

    /// Append `column IN (values...)`.
    fn add_where_in(&mut self, column: &str, values: Vec<Value>) {
        self.push_predicate(Predicate::is_in(column, values));
    }

    /// Whether the bindings match the predicates' values exactly.
    fn is_consistent(&self) -> bool {
        let expected: Vec<&Value> = self.predicates().iter().flat_map(|p| p.values()).collect();
        expected.len() == self.bindings().len()
            && expected.iter().zip(self.bindings()).all(|(a, b)| *a == b)
    }
}

/// A query against a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    table: String,
    predicates: Vec<Predicate>,
    bindings: Vec<Value>,
    limit: Option<u64>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            predicates: Vec::new(),
            bindings: Vec::new(),
            limit: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }

    /// Builder-style `push_predicate`.
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.push_predicate(predicate);
        self
    }
}

impl FilterQuery for Query {
    fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    fn set_predicates(&mut self, predicates: Vec<Predicate>) {
        self.predicates = predicates;
    }

    fn set_bindings(&mut self, bindings: Vec<Value>) {
        self.bindings = bindings;
    }

    fn push_predicate(&mut self, predicate: Predicate) {
        self.bindings.extend(predicate.values().into_iter().cloned());
        self.predicates.push(predicate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_keeps_bindings_in_sync() {
        let q = Query::new("orders")
            .with(Predicate::eq("status", "open"))
            .with(Predicate::is_null("deleted_at"))
            .with(Predicate::is_in("region", ["eu", "us"]));

        assert_eq!(q.bindings(), &[json!("open"), json!("eu"), json!("us")]);
        assert!(q.is_consistent());
    }

    #[test]
    fn test_binding_ranges() {
        let predicates = vec![
            Predicate::eq("a", 1),
            Predicate::is_null("b"),
            Predicate::is_in("c", [2, 3]),
            Predicate::nested(vec![Predicate::eq("d", 4), Predicate::eq("e", 5).or()]),
        ];
        assert_eq!(binding_ranges(&predicates), vec![0..1, 1..1, 1..3, 3..5]);
    }

    #[test]
    fn test_inconsistent_bindings_detected() {
        let mut q = Query::new("orders").with(Predicate::eq("status", "open"));
        q.set_bindings(vec![json!("closed")]);
        assert!(!q.is_consistent());
    }

    #[test]
    fn test_or_sets_connector() {
        let p = Predicate::eq("status", "open").or();
        assert_eq!(p.connector(), Connector::Or);
        assert_eq!(p.column(), Some("status"));
    }
}
