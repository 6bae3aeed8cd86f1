//! Core domain logic for the organization record store.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod mail;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, CoreConfig, DatabaseConfig, LogConfig, MailConfig};
pub use db::{open_db, open_db_in_memory, open_from_config, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use mail::{LogMailer, MailError, MailResult, Mailer, Notifier};
pub use model::organization::{
    Description, Industry, Location, NewDescription, NewLocation, NewOrganization, Organization,
    OrganizationId, OrganizationUpdate, ValidationError,
};
pub use repo::organization_repo::{
    DeletePlan, DeleteStep, OrganizationRepository, RepoError, RepoResult,
    SqliteOrganizationRepository,
};
pub use search::criteria::{compile, CompiledQuery, CriteriaError, SearchCriteria};
pub use service::read_service::{parse_organization_id, OrganizationReadService};
pub use service::write_service::{parse_version_label, OrganizationWriteService};
pub use service::{Lookup, ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
