//! Render scoped queries as SQL with positional (`$n`) parameters.

use serde::Serialize;
use serde_json::Value;

use crate::query::{FilterQuery, Predicate, Query};

/// SQL text plus the values for its `$n` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSql {
    pub sql: String,
    pub bindings: Vec<Value>,
}

/// `SELECT * FROM table [WHERE ...] [LIMIT n]`
pub fn render_select(query: &Query) -> RenderedSql {
    let mut sql = format!("SELECT * FROM {}", query.table());
    push_where(&mut sql, query);
    if let Some(limit) = query.limit() {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    RenderedSql {
        sql,
        bindings: query.bindings().to_vec(),
    }
}

/// `DELETE FROM table [WHERE ...]`
pub fn render_delete(query: &Query) -> RenderedSql {
    let mut sql = format!("DELETE FROM {}", query.table());
    push_where(&mut sql, query);
    RenderedSql {
        sql,
        bindings: query.bindings().to_vec(),
    }
}

fn push_where(sql: &mut String, query: &Query) {
    if query.predicates().is_empty() {
        return;
    }
    let mut placeholder = 0;
    sql.push_str(" WHERE ");
    sql.push_str(&render_predicates(query.predicates(), &mut placeholder));
}

fn render_predicates(predicates: &[Predicate], placeholder: &mut usize) -> String {
    let mut out = String::new();
    for (i, predicate) in predicates.iter().enumerate() {
        if i > 0 {
            out.push(' ');
            out.push_str(predicate.connector().as_sql());
            out.push(' ');
        }
        out.push_str(&render_predicate(predicate, placeholder));
    }
    out
}

fn next(placeholder: &mut usize) -> String {
    *placeholder += 1;
    format!("${}", placeholder)
}

fn render_predicate(predicate: &Predicate, placeholder: &mut usize) -> String {
    match predicate {
        Predicate::Basic {
            column, operator, ..
        } => format!("{} {} {}", column, operator.as_sql(), next(placeholder)),
        Predicate::In {
            column,
            values,
            negated,
            ..
        } => {
            if values.is_empty() {
                // IN () is not valid SQL; an empty set matches nothing.
                return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
            }
            let params: Vec<String> = values.iter().map(|_| next(placeholder)).collect();
            let keyword = if *negated { "NOT IN" } else { "IN" };
            format!("{} {} ({})", column, keyword, params.join(", "))
        }
        Predicate::Null {
            column, negated, ..
        } => {
            let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
            format!("{} {}", column, keyword)
        }
        Predicate::Nested { predicates, .. } => {
            format!("({})", render_predicates(predicates, placeholder))
        }
    }
}
