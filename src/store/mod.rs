//! Persistence — schema migrations, the `EmailStore` trait, and the
//! libSQL backend.

pub mod libsql;
pub mod migrations;
pub mod traits;

pub use libsql::LibSqlStore;
pub use traits::{EmailFilter, EmailStore};
