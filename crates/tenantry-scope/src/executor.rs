//! The storage seam.
//!
//! Tenantry does not talk to a database itself; a [`QueryExecutor`] runs the
//! scoped queries. [`MemoryExecutor`] is a small in-process implementation
//! that evaluates predicates against stored rows, used by the tests and the
//! CLI.

use anyhow::bail;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::entity::Row;
use crate::query::{Connector, FilterQuery, Operator, Predicate, Query};

/// Executes queries against storage.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Rows of `query.table()` matching every predicate.
    async fn select(&self, query: &Query) -> anyhow::Result<Vec<Row>>;

    /// Insert `row` and return it as stored (with its primary key).
    async fn insert(&self, table: &str, row: Row) -> anyhow::Result<Row>;

    /// Delete matching rows, returning how many were removed.
    async fn delete(&self, query: &Query) -> anyhow::Result<u64>;
}

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<Row>,
    last_id: i64,
}

impl MemoryTable {
    fn assign_key(&mut self, row: &mut Row, key: &str) {
        match row.get(key).and_then(Value::as_i64) {
            Some(id) => self.last_id = self.last_id.max(id),
            None => {
                self.last_id += 1;
                row.insert(key.to_string(), Value::from(self.last_id));
            }
        }
    }
}

/// In-memory storage with auto-increment `id` keys.
#[derive(Debug)]
pub struct MemoryExecutor {
    tables: RwLock<HashMap<String, MemoryTable>>,
    not_null: HashMap<String, Vec<String>>,
    key_column: String,
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            not_null: HashMap::new(),
            key_column: "id".to_string(),
        }
    }

    /// Reject inserts into `table` where `column` is missing or null,
    /// like a `NOT NULL` column constraint.
    pub fn require_not_null(mut self, table: &str, column: &str) -> Self {
        self.not_null
            .entry(table.to_string())
            .or_default()
            .push(column.to_string());
        self
    }

    /// Store rows directly, bypassing constraints.
    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.write().await;
        let stored = tables.entry(table.to_string()).or_default();
        for mut row in rows {
            stored.assign_key(&mut row, &self.key_column);
            stored.rows.push(row);
        }
    }

    /// Every row currently stored in `table`.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn select(&self, query: &Query) -> anyhow::Result<Vec<Row>> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(query.table()) else {
            return Ok(Vec::new());
        };

        let limit = query.limit().map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(table
            .rows
            .iter()
            .filter(|row| matches(query.predicates(), row))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert(&self, table: &str, mut row: Row) -> anyhow::Result<Row> {
        if let Some(columns) = self.not_null.get(table) {
            for column in columns {
                if row.get(column).is_none_or(Value::is_null) {
                    bail!("NOT NULL constraint failed: {}.{}", table, column);
                }
            }
        }

        let mut tables = self.tables.write().await;
        let stored = tables.entry(table.to_string()).or_default();
        stored.assign_key(&mut row, &self.key_column);
        stored.rows.push(row.clone());
        Ok(row)
    }

    async fn delete(&self, query: &Query) -> anyhow::Result<u64> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(query.table()) else {
            return Ok(0);
        };

        let before = table.rows.len();
        table.rows.retain(|row| !matches(query.predicates(), row));
        Ok((before - table.rows.len()) as u64)
    }
}

static NULL: Value = Value::Null;

/// Evaluate a predicate list against a row with SQL precedence
/// (`AND` binds tighter than `OR`).
pub fn matches(predicates: &[Predicate], row: &Row) -> bool {
    let mut any_chain = false;
    let mut chain = true;
    for (i, predicate) in predicates.iter().enumerate() {
        if i > 0 && predicate.connector() == Connector::Or {
            any_chain |= chain;
            chain = true;
        }
        chain = chain && evaluate(predicate, row);
    }
    any_chain || chain
}

fn evaluate(predicate: &Predicate, row: &Row) -> bool {
    match predicate {
        Predicate::Basic {
            column,
            operator,
            value,
            ..
        } => {
            let actual = lookup(row, column);
            if actual.is_null() || value.is_null() {
                return false;
            }
            match operator {
                Operator::Eq => compare(actual, value) == Some(Ordering::Equal),
                Operator::NotEq => matches!(
                    compare(actual, value),
                    Some(Ordering::Less | Ordering::Greater)
                ),
                Operator::Lt => compare(actual, value) == Some(Ordering::Less),
                Operator::LtEq => matches!(
                    compare(actual, value),
                    Some(Ordering::Less | Ordering::Equal)
                ),
                Operator::Gt => compare(actual, value) == Some(Ordering::Greater),
                Operator::GtEq => matches!(
                    compare(actual, value),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                Operator::Like | Operator::NotLike => match (actual.as_str(), value.as_str()) {
                    (Some(text), Some(pattern)) => {
                        like(text, pattern) == (*operator == Operator::Like)
                    }
                    _ => false,
                },
            }
        }
        Predicate::In {
            column,
            values,
            negated,
            ..
        } => {
            let actual = lookup(row, column);
            if actual.is_null() {
                return false;
            }
            let found = values
                .iter()
                .any(|v| compare(actual, v) == Some(Ordering::Equal));
            found != *negated
        }
        Predicate::Null {
            column, negated, ..
        } => lookup(row, column).is_null() != *negated,
        Predicate::Nested { predicates, .. } => matches(predicates, row),
    }
}

/// Qualified columns (`orders.status`) resolve to the bare row key.
fn lookup<'r>(row: &'r Row, column: &str) -> &'r Value {
    let bare = column.rsplit('.').next().unwrap_or(column);
    row.get(bare).unwrap_or(&NULL)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL `LIKE` with `%` and `_` wildcards.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // reachable[j]: pattern[..j] matches the text consumed so far
    let mut reachable = vec![false; pattern.len() + 1];
    reachable[0] = true;
    for j in 1..=pattern.len() {
        reachable[j] = reachable[j - 1] && pattern[j - 1] == '%';
    }

    for c in text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || reachable[j],
                '_' => reachable[j - 1],
                p => reachable[j - 1] && p == c,
            };
        }
        reachable = next;
    }
    reachable[pattern.len()]
}
