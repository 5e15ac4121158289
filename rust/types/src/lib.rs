mod collection;
mod document;
mod field_schema;
mod index;
mod row;

pub use collection::*;
pub use document::*;
pub use field_schema::*;
pub use index::*;
pub use row::*;
