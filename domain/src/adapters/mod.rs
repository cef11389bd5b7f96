//! In-process adapters that live inside the domain crate for convenience.
//!
//! Used by unit tests, the demo binary and the api-server's `memory` storage
//! provider. The SQLite store and index live in `sqlite-adapter`.

pub mod memory_repo;
