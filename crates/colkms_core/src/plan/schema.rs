//! Target schema a plan is validated against.

use serde::{Deserialize, Serialize};

/// A column of the target schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Logical column name.
    pub name: String,
    /// Whether the column must be encrypted.
    #[serde(default)]
    pub sensitive: bool,
}

/// The ordered columns of the file being written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a schema from plain column names, none marked sensitive.
    pub fn from_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .fold(Self::new(), |schema, name| schema.column(name))
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.push(name.into(), false);
        self
    }

    /// Appends a column that must be encrypted.
    #[must_use]
    pub fn sensitive_column(mut self, name: impl Into<String>) -> Self {
        self.push(name.into(), true);
        self
    }

    fn push(&mut self, name: String, sensitive: bool) {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.sensitive |= sensitive,
            None => self.columns.push(ColumnSpec { name, sensitive }),
        }
    }

    /// Returns true if the schema has a column named `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Names of columns that must be encrypted.
    pub fn sensitive_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.sensitive)
            .map(|c| c.name.as_str())
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
