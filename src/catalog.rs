// Column catalog discovered from a loaded dataset

use crate::data::Row;
use crate::model::ColumnRef;
use serde_json::Value;

/// Suffix used when every useful view of a column is its `label` sub-field
pub const LABEL_SUFFIX: &str = ".label";

/// Ordered column identifiers of the currently loaded dataset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnCatalog {
    columns: Vec<String>,
}

impl ColumnCatalog {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Key set of the first row, using `<key>.label` where any row exposes a `label` there
    pub fn from_rows(rows: &[Row]) -> Self {
        let Some(first) = rows.first() else {
            return Self::default();
        };

        let columns = first
            .keys()
            .map(|key| {
                let has_label = rows.iter().any(|row| match row.get(key) {
                    Some(Value::Object(obj)) => obj.contains_key("label"),
                    _ => false,
                });
                if has_label {
                    format!("{}{}", key, LABEL_SUFFIX)
                } else {
                    key.clone()
                }
            })
            .collect();

        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Name of a referenced column, if it is a member of this catalog
    pub fn resolve(&self, column: ColumnRef) -> Option<&str> {
        self.columns.get(column.index()).map(String::as_str)
    }

    pub fn contains(&self, column: ColumnRef) -> bool {
        column.index() < self.columns.len()
    }

    pub fn position(&self, name: &str) -> Option<ColumnRef> {
        self.columns.iter().position(|c| c == name).map(ColumnRef)
    }
}
