//! Tenancy configuration.
//!
//! Defines which column carries the tenant id on each scoped table and which
//! tables are global (never scoped).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::ConfigError;

/// Configuration for tenant isolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Name of the tenant foreign-key column on every scoped table,
    /// unless overridden per table.
    #[serde(default = "default_tenant_column")]
    pub tenant_column: String,

    /// Qualify the tenant column with the table name in generated
    /// predicates (`orders.tenant_id` instead of `tenant_id`).
    #[serde(default = "default_true")]
    pub qualify_columns: bool,

    /// Per-table tenant column configuration.
    #[serde(default)]
    pub tables: HashMap<String, TableTenancyConfig>,

    /// Tables that are global (no tenant scoping applied).
    #[serde(default)]
    pub global_tables: Vec<String>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            tenant_column: default_tenant_column(),
            qualify_columns: true,
            tables: HashMap::new(),
            global_tables: Vec::new(),
        }
    }
}

/// Per-table tenancy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableTenancyConfig {
    /// The column name used for tenant isolation in this table.
    #[serde(default)]
    pub tenant_column: Option<String>,

    /// Whether this is a global table (no tenant scoping).
    #[serde(default)]
    pub global: bool,
}

impl TenancyConfig {
    /// Load tenancy configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Load tenancy configuration from a file path relative to a base directory.
    ///
    /// Absolute paths are used as-is.
    pub fn load_from_path(
        tenancy_file: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let tenancy_file = tenancy_file.as_ref();
        let tenancy_path = if tenancy_file.is_absolute() {
            tenancy_file.to_path_buf()
        } else {
            base_dir.as_ref().join(tenancy_file)
        };

        if tenancy_path.exists() {
            Self::from_file(&tenancy_path)
        } else {
            Err(ConfigError::Config(format!(
                "Tenancy file not found: {}",
                tenancy_path.display()
            )))
        }
    }

    /// Parse tenancy configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Get the tenant column for a given table.
    ///
    /// Returns `None` if the table is global.
    pub fn tenant_column_for(&self, table_name: &str) -> Option<&str> {
        if self.is_global_table(table_name) {
            return None;
        }

        self.tables
            .get(table_name)
            .and_then(|t| t.tenant_column.as_deref())
            .or(Some(self.tenant_column.as_str()))
    }

    /// The tenant column as it should appear in predicates for `table_name`,
    /// qualified with the table name when `qualify_columns` is set.
    pub fn qualified_tenant_column(&self, table_name: &str) -> Option<String> {
        let column = self.tenant_column_for(table_name)?;
        if self.qualify_columns {
            Some(format!("{}.{}", table_name, column))
        } else {
            Some(column.to_string())
        }
    }

    /// Check if a table is global (no tenant scoping).
    pub fn is_global_table(&self, table_name: &str) -> bool {
        if self.global_tables.iter().any(|t| t == table_name) {
            return true;
        }

        self.tables
            .get(table_name)
            .map(|t| t.global)
            .unwrap_or(false)
    }
}

fn default_tenant_column() -> String {
    "tenant_id".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tenant_column() {
        let config = TenancyConfig::default();
        assert_eq!(config.tenant_column_for("orders"), Some("tenant_id"));
        assert_eq!(
            config.qualified_tenant_column("orders").as_deref(),
            Some("orders.tenant_id")
        );
    }

    #[test]
    fn test_per_table_override() {
        let mut config = TenancyConfig::default();
        config.tables.insert(
            "orders".to_string(),
            TableTenancyConfig {
                tenant_column: Some("customer_id".to_string()),
                global: false,
            },
        );
        assert_eq!(config.tenant_column_for("orders"), Some("customer_id"));
        assert_eq!(config.tenant_column_for("users"), Some("tenant_id"));
    }

    #[test]
    fn test_global_tables() {
        let mut config = TenancyConfig::default();
        config.global_tables.push("countries".to_string());
        assert_eq!(config.tenant_column_for("countries"), None);
        assert!(config.is_global_table("countries"));
        assert_eq!(config.qualified_tenant_column("countries"), None);
    }

    #[test]
    fn test_unqualified_columns() {
        let config = TenancyConfig {
            qualify_columns: false,
            ..Default::default()
        };
        assert_eq!(
            config.qualified_tenant_column("orders").as_deref(),
            Some("tenant_id")
        );
    }

    #[test]
    fn test_parse_tenancy_yaml() {
        let yaml = r#"
tenant_column: organization_id

tables:
  invoices:
    tenant_column: billing_org_id
  plans:
    global: true

global_tables:
  - currencies
"#;
        let config = TenancyConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.tenant_column, "organization_id");
        assert!(config.qualify_columns);
        assert_eq!(config.tenant_column_for("users"), Some("organization_id"));
        assert_eq!(config.tenant_column_for("invoices"), Some("billing_org_id"));
        assert!(config.is_global_table("plans"));
        assert!(config.is_global_table("currencies"));
    }

    #[test]
    fn test_missing_tenancy_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TenancyConfig::load_from_path("nope.yaml", dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }

    #[test]
    fn test_tenancy_file_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tenancy.yaml"), "tenant_column: team_id\n").unwrap();
        let config = TenancyConfig::load_from_path("tenancy.yaml", dir.path()).unwrap();
        assert_eq!(config.tenant_column, "team_id");
    }
}
