//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Translate store outcomes into caller-correctable [`ServiceError`]s.

pub mod error;
pub mod read_service;
pub mod write_service;

pub use error::{Lookup, ServiceError, ServiceResult};
