//! VIEWGRANT Lineage - View Dependency Resolution
//!
//! Given a catalog object, computes every table and view it transitively
//! depends on by decoding view definitions and walking the table references
//! in their SQL.

mod cache;
pub mod definition;
pub mod resolver;
pub mod sql;

pub use definition::{decode_view_definition, encode_view_definition};
pub use resolver::LineageResolver;
pub use sql::{extract_table_references, TableReference};
