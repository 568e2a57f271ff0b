//! Database module for the PostgreSQL vessel registry
//!
//! Connection pooling lives in `connection`; the `VesselRegistry`
//! implementation in `vessel_repo`.

pub mod connection;
pub mod vessel_repo;

pub use connection::{init_pool, DbPool};
pub use vessel_repo::PgRegistry;
