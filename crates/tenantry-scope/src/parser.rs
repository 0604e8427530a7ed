//! SQL parsing into the query model.
//!
//! Maps single-table `SELECT * ... WHERE ...` and `DELETE FROM ... WHERE ...`
//! statements onto a [`Query`] so they can be scoped like any built query.
//! Anything the model cannot express (joins, projections, aliases, ORDER BY)
//! is rejected rather than silently dropped.

use serde_json::Value;
use sqlparser::ast::{
    BinaryOperator, Expr, FromTable, LimitClause, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins, UnaryOperator,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::ScopeError;
use crate::query::{Connector, FilterQuery, Operator, Predicate, Query};

/// Parses SQL statements into scoped-query form.
pub struct SqlAnalyzer {
    dialect: PostgreSqlDialect,
}

impl Clone for SqlAnalyzer {
    fn clone(&self) -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }
}

impl Default for SqlAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// A statement mapped onto the query model.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    pub operation: SqlOperation,
    pub query: Query,
}

/// Types of SQL operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
    Other,
}

impl SqlAnalyzer {
    /// Create a new SQL analyzer.
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Parse a SQL string into statements.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, ScopeError> {
        Parser::parse_sql(&self.dialect, sql).map_err(|e| ScopeError::ParseError(e.to_string()))
    }

    /// Parse exactly one `SELECT` or `DELETE` statement into a [`Query`].
    pub fn parse_query(&self, sql: &str) -> Result<ParsedStatement, ScopeError> {
        let statements = self.parse(sql)?;
        let [stmt] = statements.as_slice() else {
            return Err(unsupported(format!(
                "expected one statement, found {}",
                statements.len()
            )));
        };

        match stmt {
            Statement::Query(query) => {
                let SetExpr::Select(select) = query.body.as_ref() else {
                    return Err(unsupported("only plain SELECT queries are supported"));
                };
                if query.order_by.is_some() {
                    return Err(unsupported("ORDER BY is not supported"));
                }
                if !matches!(select.projection.as_slice(), [SelectItem::Wildcard(_)]) {
                    return Err(unsupported("only SELECT * is supported"));
                }

                let mut out = Query::new(self.single_table(&select.from)?);
                if let Some(selection) = &select.selection {
                    self.push_selection(&mut out, selection)?;
                }
                out.set_limit(self.limit(query.limit_clause.as_ref())?);

                Ok(ParsedStatement {
                    operation: SqlOperation::Select,
                    query: out,
                })
            }
            Statement::Delete(delete) => {
                let tables = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
                };
                let mut out = Query::new(self.single_table(tables)?);
                if let Some(selection) = &delete.selection {
                    self.push_selection(&mut out, selection)?;
                }

                Ok(ParsedStatement {
                    operation: SqlOperation::Delete,
                    query: out,
                })
            }
            other if self.is_ddl(other) => Err(unsupported("DDL statements cannot be scoped")),
            other => Err(unsupported(format!(
                "{:?} statements are not supported",
                self.get_operation(other)
            ))),
        }
    }

    /// Check if a statement is a DDL statement.
    pub fn is_ddl(&self, stmt: &Statement) -> bool {
        matches!(
            stmt,
            Statement::CreateTable { .. }
                | Statement::AlterTable { .. }
                | Statement::Drop { .. }
                | Statement::Truncate { .. }
                | Statement::CreateIndex { .. }
                | Statement::CreateView { .. }
        )
    }

    /// Get the type of SQL operation.
    pub fn get_operation(&self, stmt: &Statement) -> SqlOperation {
        match stmt {
            Statement::Query(_) => SqlOperation::Select,
            Statement::Insert { .. } => SqlOperation::Insert,
            Statement::Update { .. } => SqlOperation::Update,
            Statement::Delete(_) => SqlOperation::Delete,
            Statement::CreateTable { .. }
            | Statement::AlterTable { .. }
            | Statement::Drop { .. }
            | Statement::Truncate { .. } => SqlOperation::Ddl,
            _ => SqlOperation::Other,
        }
    }

    fn single_table(&self, from: &[TableWithJoins]) -> Result<String, ScopeError> {
        let [table] = from else {
            return Err(unsupported("exactly one table is required"));
        };
        if !table.joins.is_empty() {
            return Err(unsupported("joins are not supported"));
        }
        match &table.relation {
            TableFactor::Table {
                name, alias: None, ..
            } => Ok(name.to_string()),
            TableFactor::Table { .. } => Err(unsupported("table aliases are not supported")),
            _ => Err(unsupported("only plain table references are supported")),
        }
    }

    fn limit(&self, clause: Option<&LimitClause>) -> Result<Option<u64>, ScopeError> {
        match clause {
            None => Ok(None),
            Some(LimitClause::LimitOffset {
                limit: Some(expr),
                offset: None,
                ..
            }) => match self.literal(expr).as_ref().and_then(Value::as_u64) {
                Some(n) => Ok(Some(n)),
                None => Err(unsupported("LIMIT must be a non-negative integer")),
            },
            Some(LimitClause::LimitOffset {
                limit: None,
                offset: None,
                ..
            }) => Ok(None),
            Some(_) => Err(unsupported("OFFSET is not supported")),
        }
    }

    fn push_selection(&self, out: &mut Query, selection: &Expr) -> Result<(), ScopeError> {
        let mut predicates = Vec::new();
        self.collect(selection, Connector::And, &mut predicates)?;
        for predicate in predicates {
            out.push_predicate(predicate);
        }
        Ok(())
    }

    /// Flatten `AND`/`OR` chains into connector-tagged predicates.
    fn collect(
        &self,
        expr: &Expr,
        connector: Connector,
        out: &mut Vec<Predicate>,
    ) -> Result<(), ScopeError> {
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                self.collect_and_operand(left, connector, out)?;
                self.collect_and_operand(right, Connector::And, out)
            }
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Or,
                right,
            } => {
                self.collect(left, connector, out)?;
                self.collect(right, Connector::Or, out)
            }
            Expr::Nested(inner) => self.collect_group(inner, connector, out),
            _ => {
                let mut predicate = self.predicate(expr)?;
                predicate.set_connector(connector);
                out.push(predicate);
                Ok(())
            }
        }
    }

    // An OR directly under an AND must stay grouped to keep its meaning.
    fn collect_and_operand(
        &self,
        expr: &Expr,
        connector: Connector,
        out: &mut Vec<Predicate>,
    ) -> Result<(), ScopeError> {
        match expr {
            Expr::BinaryOp {
                op: BinaryOperator::Or,
                ..
            } => self.collect_group(expr, connector, out),
            _ => self.collect(expr, connector, out),
        }
    }

    fn collect_group(
        &self,
        expr: &Expr,
        connector: Connector,
        out: &mut Vec<Predicate>,
    ) -> Result<(), ScopeError> {
        let mut group = Vec::new();
        self.collect(expr, Connector::And, &mut group)?;
        let mut predicate = match group.len() {
            1 => group.remove(0),
            _ => Predicate::nested(group),
        };
        predicate.set_connector(connector);
        out.push(predicate);
        Ok(())
    }

    fn predicate(&self, expr: &Expr) -> Result<Predicate, ScopeError> {
        match expr {
            Expr::BinaryOp { left, op, right } => {
                let operator = comparison(op)
                    .ok_or_else(|| unsupported(format!("operator {} is not supported", op)))?;
                if let (Some(column), Some(value)) = (self.column(left), self.literal(right)) {
                    return Ok(Predicate::basic(column, operator, value));
                }
                if let (Some(value), Some(column)) = (self.literal(left), self.column(right)) {
                    return Ok(Predicate::basic(column, flip(operator), value));
                }
                Err(unsupported(format!(
                    "comparison must be between a column and a literal: {}",
                    expr
                )))
            }
            Expr::InList {
                expr: inner,
                list,
                negated,
                ..
            } => {
                let column = self.column_or_err(inner)?;
                let values = list
                    .iter()
                    .map(|item| {
                        self.literal(item)
                            .ok_or_else(|| unsupported(format!("IN list item {} is not a literal", item)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if *negated {
                    Predicate::not_in(column, values)
                } else {
                    Predicate::is_in(column, values)
                })
            }
            Expr::IsNull(inner) => Ok(Predicate::is_null(self.column_or_err(inner)?)),
            Expr::IsNotNull(inner) => Ok(Predicate::not_null(self.column_or_err(inner)?)),
            Expr::Like {
                negated,
                expr: inner,
                pattern,
                ..
            } => {
                let column = self.column_or_err(inner)?;
                let pattern = self
                    .literal(pattern)
                    .ok_or_else(|| unsupported("LIKE pattern must be a literal"))?;
                let operator = if *negated {
                    Operator::NotLike
                } else {
                    Operator::Like
                };
                Ok(Predicate::basic(column, operator, pattern))
            }
            _ => Err(unsupported(format!("expression {} is not supported", expr))),
        }
    }

    fn column(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Identifier(ident) => Some(ident.value.clone()),
            Expr::CompoundIdentifier(idents) => Some(
                idents
                    .iter()
                    .map(|i| i.value.as_str())
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            _ => None,
        }
    }

    fn column_or_err(&self, expr: &Expr) -> Result<String, ScopeError> {
        self.column(expr)
            .ok_or_else(|| unsupported(format!("expected a column, found {}", expr)))
    }

    fn literal(&self, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Value(value_with_span) => match &value_with_span.value {
                sqlparser::ast::Value::Number(n, _) => number(n),
                sqlparser::ast::Value::SingleQuotedString(s) => Some(Value::String(s.clone())),
                sqlparser::ast::Value::Boolean(b) => Some(Value::Bool(*b)),
                sqlparser::ast::Value::Null => Some(Value::Null),
                _ => None,
            },
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr: inner,
            } => match self.literal(inner)? {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Some(Value::from(-i)),
                    None => n.as_f64().and_then(|f| number(&(-f).to_string())),
                },
                _ => None,
            },
            Expr::Nested(inner) => self.literal(inner),
            _ => None,
        }
    }
}

fn number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::from(i));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

fn comparison(op: &BinaryOperator) -> Option<Operator> {
    match op {
        BinaryOperator::Eq => Some(Operator::Eq),
        BinaryOperator::NotEq => Some(Operator::NotEq),
        BinaryOperator::Lt => Some(Operator::Lt),
        BinaryOperator::LtEq => Some(Operator::LtEq),
        BinaryOperator::Gt => Some(Operator::Gt),
        BinaryOperator::GtEq => Some(Operator::GtEq),
        _ => None,
    }
}

/// `5 < total` is `total > 5`.
fn flip(operator: Operator) -> Operator {
    match operator {
        Operator::Lt => Operator::Gt,
        Operator::LtEq => Operator::GtEq,
        Operator::Gt => Operator::Lt,
        Operator::GtEq => Operator::LtEq,
        other => other,
    }
}

fn unsupported(reason: impl Into<String>) -> ScopeError {
    ScopeError::Unsupported {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(sql: &str) -> ParsedStatement {
        SqlAnalyzer::new().parse_query(sql).unwrap()
    }

    #[test]
    fn test_parse_simple_select() {
        let parsed = parse("SELECT * FROM orders WHERE status = 'open'");
        assert_eq!(parsed.operation, SqlOperation::Select);
        assert_eq!(parsed.query.table(), "orders");
        assert_eq!(parsed.query.predicates(), &[Predicate::eq("status", "open")]);
        assert_eq!(parsed.query.bindings(), &[json!("open")]);
    }

    #[test]
    fn test_parse_precedence() {
        let parsed = parse("SELECT * FROM orders WHERE a = 1 OR b = 2 AND c = 3");
        assert_eq!(
            parsed.query.predicates(),
            &[
                Predicate::eq("a", 1),
                Predicate::eq("b", 2).or(),
                Predicate::eq("c", 3),
            ]
        );
    }

    #[test]
    fn test_parse_parenthesised_or() {
        let parsed = parse("SELECT * FROM orders WHERE (a = 1 OR b = 2) AND c = 3");
        assert_eq!(
            parsed.query.predicates(),
            &[
                Predicate::nested(vec![Predicate::eq("a", 1), Predicate::eq("b", 2).or()]),
                Predicate::eq("c", 3),
            ]
        );
    }

    #[test]
    fn test_parse_in_null_like_and_limit() {
        let parsed = parse(
            "SELECT * FROM orders WHERE region IN ('eu', 'us') AND shipped_at IS NULL \
             AND code LIKE 'INV-%' AND 10 < total LIMIT 5",
        );
        assert_eq!(
            parsed.query.predicates(),
            &[
                Predicate::is_in("region", ["eu", "us"]),
                Predicate::is_null("shipped_at"),
                Predicate::basic("code", Operator::Like, "INV-%"),
                Predicate::basic("total", Operator::Gt, 10),
            ]
        );
        assert_eq!(parsed.query.limit(), Some(5));
    }

    #[test]
    fn test_parse_delete() {
        let parsed = parse("DELETE FROM orders WHERE orders.id = -3");
        assert_eq!(parsed.operation, SqlOperation::Delete);
        assert_eq!(parsed.query.predicates(), &[Predicate::eq("orders.id", -3)]);
    }

    #[test]
    fn test_rejects_joins_and_ddl() {
        let analyzer = SqlAnalyzer::new();
        assert!(matches!(
            analyzer.parse_query("SELECT * FROM orders o JOIN users u ON o.user_id = u.id"),
            Err(ScopeError::Unsupported { .. })
        ));
        assert!(matches!(
            analyzer.parse_query("DROP TABLE orders"),
            Err(ScopeError::Unsupported { .. })
        ));
        assert!(matches!(
            analyzer.parse_query("SELEC nonsense"),
            Err(ScopeError::ParseError(_))
        ));
    }

    #[test]
    fn test_detect_ddl() {
        let analyzer = SqlAnalyzer::new();

        let stmts = analyzer.parse("CREATE TABLE test (id INT)").unwrap();
        assert!(analyzer.is_ddl(&stmts[0]));

        let stmts = analyzer.parse("SELECT * FROM users").unwrap();
        assert!(!analyzer.is_ddl(&stmts[0]));
    }
}
