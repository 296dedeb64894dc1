//! Versioned domain settings storage for SESAM clients.
//!
//! Each authenticated user owns an append-only history of opaque blobs.
//! Reads return the newest version; a background task prunes versions
//! older than the retention window.
//!
//! Storage layout: SQLite `domains` table (see db/migrations.rs).

pub mod envelope;
pub mod index;
pub mod retention;
pub mod routes;
pub mod store;
