mod metadata;
mod result;
mod row;

pub use metadata::{ColumnMetadata, RowMetadata};
pub use result::{MappedRows, SqlResult};
pub use row::Row;
