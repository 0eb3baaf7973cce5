//! Cumulus Database Library
//!
//! sqlx/Postgres data access for the Catalog. Schema lives in `migrations/`.

pub mod db;

pub use db::*;
