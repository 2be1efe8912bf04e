use std::sync::Arc;

use crate::types::RowValues;

/// A row produced by an engine cursor.
///
/// Column names are shared by every row of one result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    values: Vec<RowValues>,
}

impl Row {
    /// Create a new row
    ///
    /// # Arguments
    ///
    /// * `column_names` - The column names, shared across the result
    /// * `values` - The values for this row, in column order
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        Self {
            column_names,
            values,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value from the row by column name
    ///
    /// Linear in the column count; use [`RowMetadata`](super::RowMetadata) for repeated lookups.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.column_names
            .iter()
            .position(|col| col == column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }
}
