use std::collections::HashMap;

use super::row::Row;

/// Name and position of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub index: usize,
}

/// Column layout of a result, derived from the shape of its first row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMetadata {
    columns: Vec<ColumnMetadata>,
    by_name: HashMap<String, usize>,
}

impl RowMetadata {
    #[must_use]
    pub fn from_row(row: &Row) -> Self {
        let columns: Vec<ColumnMetadata> = row
            .column_names()
            .iter()
            .enumerate()
            .map(|(index, name)| ColumnMetadata {
                name: name.clone(),
                index,
            })
            .collect();
        // first occurrence wins for duplicated names
        let mut by_name = HashMap::with_capacity(columns.len());
        for column in &columns {
            by_name.entry(column.name.clone()).or_insert(column.index);
        }
        Self { columns, by_name }
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Option<&ColumnMetadata> {
        self.columns.get(index)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
