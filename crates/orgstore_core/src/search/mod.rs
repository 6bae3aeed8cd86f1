//! Search criteria entry points.
//!
//! # Responsibility
//! - Turn caller-supplied criteria maps into parameterized SQL predicates.
//! - Keep column naming inside core; callers never name SQL identifiers.

pub mod criteria;
