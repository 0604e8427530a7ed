//! `tenantry check` command implementation.
//!
//! Validates the tenancy section of a configuration file:
//! - tenant column names are non-empty identifiers
//! - no table is both global and given a tenant column
//! - global table lists carry no duplicates

use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::path::Path;

use tenantry_core::{TenancyConfig, TenantryConfig};

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Location within the configuration (e.g. `tenancy.tables.orders`).
    pub location: String,
    pub message: String,
}

impl CheckFinding {
    fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            location: location.into(),
            message: message.into(),
        }
    }

    fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location: location.into(),
            message: message.into(),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_column(location: &str, column: &str) -> Option<CheckFinding> {
    if column.trim().is_empty() {
        Some(CheckFinding::error(location, "tenant column is empty"))
    } else if !is_identifier(column) {
        Some(CheckFinding::error(
            location,
            format!("tenant column '{}' is not a valid identifier", column),
        ))
    } else {
        None
    }
}

/// Run every check against a tenancy configuration.
pub fn check_tenancy(tenancy: &TenancyConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    findings.extend(check_column("tenancy.tenant_column", &tenancy.tenant_column));

    let mut seen = HashSet::new();
    for table in &tenancy.global_tables {
        if !seen.insert(table.as_str()) {
            findings.push(CheckFinding::warning(
                "tenancy.global_tables",
                format!("'{}' is listed more than once", table),
            ));
        }
    }

    let mut tables: Vec<_> = tenancy.tables.iter().collect();
    tables.sort_by(|a, b| a.0.cmp(b.0));
    for (name, table) in tables {
        let location = format!("tenancy.tables.{}", name);
        let global = table.global || seen.contains(name.as_str());

        match &table.tenant_column {
            Some(_) if global => findings.push(CheckFinding::error(
                &location,
                "table is global but also configures a tenant column",
            )),
            Some(column) => findings.extend(check_column(&location, column)),
            None => {}
        }
    }

    findings
}

fn print_findings(findings: &[CheckFinding]) {
    for finding in findings {
        println!(
            "  [{}] {}: {}",
            finding.severity, finding.location, finding.message
        );
    }
}

pub fn run(config_path: &Path) -> Result<()> {
    println!("Checking {}", config_path.display());

    let config = TenantryConfig::load_with_context(config_path)
        .context("Failed to load configuration")?;
    let mut findings = check_tenancy(&config.tenancy);
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));

    if findings.is_empty() {
        println!("All checks passed.");
        return Ok(());
    }

    print_findings(&findings);
    let errors = findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count();
    println!(
        "Summary: {} error(s), {} warning(s)",
        errors,
        findings.len() - errors
    );

    if errors > 0 {
        bail!("Configuration has {} error(s)", errors);
    }
    Ok(())
}
