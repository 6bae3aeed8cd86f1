//! Organization aggregate model.
//!
//! # Responsibility
//! - Define the aggregate root and its owned sub-records.
//! - Define write models for create and partial update.
//!
//! # Invariants
//! - Sub-records refer to their owner by `OrganizationId`, never by reference.
//! - Every persisted organization owns exactly one description.

pub mod organization;
