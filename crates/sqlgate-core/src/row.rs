//! Result rows.

use std::collections::HashMap;
use std::sync::Arc;

use crate::value::Value;

/// Column names of one result set, shared by all of its rows.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    names: Vec<String>,
    /// First occurrence wins for duplicate names
    by_name: HashMap<String, usize>,
}

impl ColumnInfo {
    pub fn new(names: Vec<String>) -> Self {
        let mut by_name = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            by_name.entry(name.clone()).or_insert(i);
        }
        Self { names, by_name }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One fetched row: positional values plus the result's column names.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// A row that owns its column names. Drivers building many rows should
    /// share one `ColumnInfo` through [`Row::with_columns`].
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self::with_columns(Arc::new(ColumnInfo::new(column_names)), values)
    }

    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the first column called `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// (column name, value) pairs in column order, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_share_column_names() {
        let cols = Arc::new(ColumnInfo::new(vec!["id".into(), "name".into()]));
        let a = Row::with_columns(Arc::clone(&cols), vec![Value::Int(1), "a".into()]);
        let b = Row::with_columns(cols, vec![Value::Int(2), Value::Null]);

        assert_eq!(a.get_by_name("name"), Some(&Value::Text("a".into())));
        assert_eq!(b.get_by_name("name"), Some(&Value::Null));
        assert!(a.get_by_name("missing").is_none());
        assert_eq!(b.get(0), Some(&Value::Int(2)));
        assert!(b.get(2).is_none());
    }

    #[test]
    fn test_duplicate_names_resolve_to_first_index() {
        let info = ColumnInfo::new(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(info.index_of("a"), Some(0));
        assert_eq!(info.len(), 3);

        let row = Row::new(
            vec!["a".into(), "a".into()],
            vec![Value::Int(1), Value::Int(2)],
        );
        assert_eq!(row.get_by_name("a"), Some(&Value::Int(1)));
        let pairs: Vec<_> = row.iter().collect();
        assert_eq!(pairs, vec![("a", &Value::Int(1)), ("a", &Value::Int(2))]);
    }
}
