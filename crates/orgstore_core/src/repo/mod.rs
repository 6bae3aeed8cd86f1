//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the store contract consumed by read and write services.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Multi-row writes run inside one transaction.
//! - Repository APIs return semantic errors (`NotFound`, `VersionConflict`,
//!   `NameTaken`) in addition to DB transport errors.

pub mod organization_repo;
