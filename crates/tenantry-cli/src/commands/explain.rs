//! `tenantry explain` command implementation.
//!
//! Parses a statement, scopes it for the given actor and prints the SQL that
//! would be sent to the database.

use anyhow::{Context, Result, bail};
use serde_json::json;

use tenantry_core::{Actor, Principal, TenantContext, TenantryConfig};
use tenantry_scope::{
    RenderedSql, ScopeState, ScopedQuery, SqlAnalyzer, SqlOperation, TenantScope, render_delete,
    render_select,
};

/// A statement after scoping.
#[derive(Debug)]
pub struct Explanation {
    pub table: String,
    pub state: ScopeState,
    pub rendered: RenderedSql,
}

/// Scope `sql` for `actor`.
///
/// Without an actor the context is left unresolved, so statements against
/// scoped tables fail the same way an unauthenticated request would.
pub fn explain(config: &TenantryConfig, actor: Option<&Principal>, sql: &str) -> Result<Explanation> {
    let parsed = SqlAnalyzer::new()
        .parse_query(sql)
        .context("Failed to parse statement")?;

    let context = match actor {
        Some(actor) => TenantContext::for_actor(Some(actor as &dyn Actor)),
        None => TenantContext::new(),
    };

    let table = parsed.query.table().to_string();
    let scope = TenantScope::new(&config.tenancy, table.as_str());
    let scoped = ScopedQuery::from_query(parsed.query, scope, &context)
        .with_context(|| format!("Cannot scope statement on {}", table))?;
    let state = scoped.state();
    let query = scoped.into_query();

    let rendered = match parsed.operation {
        SqlOperation::Select => render_select(&query),
        SqlOperation::Delete => render_delete(&query),
        other => bail!("{:?} statements are not supported", other),
    };

    Ok(Explanation {
        table,
        state,
        rendered,
    })
}

pub fn run(
    config: &TenantryConfig,
    actor: Option<&Principal>,
    sql: &str,
    as_json: bool,
) -> Result<()> {
    let explanation = explain(config, actor, sql)?;
    tracing::debug!(
        table = %explanation.table,
        state = ?explanation.state,
        "statement scoped"
    );

    if as_json {
        let out = json!({
            "table": explanation.table,
            "state": format!("{:?}", explanation.state),
            "sql": explanation.rendered.sql,
            "bindings": explanation.rendered.bindings,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", explanation.rendered.sql);
    for (i, value) in explanation.rendered.bindings.iter().enumerate() {
        println!("  ${} = {}", i + 1, value);
    }
    if explanation.state != ScopeState::ScopeApplied {
        println!("  ({:?}: no tenant constraint)", explanation.state);
    }
    Ok(())
}
