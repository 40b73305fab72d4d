//! Database initialization, schema self-healing and seed data

pub mod init;
pub mod schema_sync;
pub mod seed;
pub mod table_schemas;

pub use init::*;
pub use schema_sync::*;
pub use seed::*;
pub use table_schemas::*;
