//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer: machines, setting history, counter readings, settlements, invoices

pub mod migrations;
pub mod repo;

pub use migrations::{init_db, init_db_with_pool_size};
pub use repo::Repository;
