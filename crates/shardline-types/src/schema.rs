//! Schema snapshots exchanged with the metadata loader.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Database dialect of the physical data sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    #[default]
    #[serde(rename = "MySQL", alias = "mysql")]
    MySql,
    #[serde(rename = "PostgreSQL", alias = "postgresql")]
    PostgreSql,
    #[serde(rename = "Oracle", alias = "oracle")]
    Oracle,
    #[serde(rename = "SQLServer", alias = "sqlserver")]
    SqlServer,
    #[serde(rename = "H2", alias = "h2")]
    H2,
    #[serde(rename = "SQL92", alias = "sql92")]
    Sql92,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MySql => "MySQL",
            Self::PostgreSql => "PostgreSQL",
            Self::Oracle => "Oracle",
            Self::SqlServer => "SQLServer",
            Self::H2 => "H2",
            Self::Sql92 => "SQL92",
        };
        f.write_str(name)
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ColumnMetaData {
    /// Column name.
    pub name: String,
    /// Dialect type name, e.g. `"bigint"`.
    pub data_type: String,
    /// Part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Value is generated (auto-increment or key generator).
    #[serde(default)]
    pub generated: bool,
    /// Comparisons on the column are case sensitive.
    #[serde(default)]
    pub case_sensitive: bool,
}

impl ColumnMetaData {
    /// A column with every flag cleared.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            primary_key: false,
            generated: false,
            case_sensitive: false,
        }
    }

    /// Builder-style primary key flag.
    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Builder-style generated flag.
    pub fn generated(mut self, generated: bool) -> Self {
        self.generated = generated;
        self
    }
}

/// An index of a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexMetaData {
    /// Index name.
    pub name: String,
}

impl IndexMetaData {
    /// Create an index entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Columns and indexes of one table, physical or logical.
///
/// Column order is significant: two shards listing the same columns in a
/// different order are not interchangeable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetaData {
    /// Table name.
    pub name: String,
    /// Columns in ordinal order.
    #[serde(default)]
    pub columns: Vec<ColumnMetaData>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<IndexMetaData>,
}

impl TableMetaData {
    /// Create a table snapshot.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnMetaData>,
        indexes: Vec<IndexMetaData>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes,
        }
    }

    /// Look up a column by name, ignoring case.
    pub fn column(&self, name: &str) -> Option<&ColumnMetaData> {
        self.columns
            .iter()
            .find(|each| each.name.eq_ignore_ascii_case(name))
    }

    /// Names of the primary key columns in ordinal order.
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|each| each.primary_key)
            .map(|each| each.name.as_str())
            .collect()
    }
}
