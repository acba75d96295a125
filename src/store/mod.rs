//! Persistence layer — libSQL-backed storage for settings and questionnaire
//! responses.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::Store;

#[cfg(test)]
pub(crate) mod testing;
