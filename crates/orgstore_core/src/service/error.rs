//! Error taxonomy shared by read and write services.

use crate::model::organization::ValidationError;
use crate::repo::organization_repo::RepoError;
use crate::search::criteria::{CriteriaError, SearchCriteria};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// What a failed lookup was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Id as supplied by the caller, possibly malformed.
    Id(String),
    /// Non-empty criteria that matched nothing.
    Criteria(SearchCriteria),
}

impl Display for Lookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Criteria(criteria) => write!(f, "criteria {criteria}"),
        }
    }
}

/// Caller-correctable failures of the organization services.
///
/// Everything except `Repo` is a typed, recoverable condition that a
/// transport layer maps onto its own status codes.
#[derive(Debug)]
pub enum ServiceError {
    NotFound(Lookup),
    NameExists(String),
    /// Version label is not a quoted 1-3 digit decimal.
    VersionInvalid(String),
    /// Caller's version is older than the persisted one.
    VersionOutdated {
        version: u32,
    },
    InvalidCriteria(CriteriaError),
    Validation(ValidationError),
    /// Opaque persistence failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(lookup) => write!(f, "no organization found for {lookup}"),
            Self::NameExists(name) => write!(f, "organization name `{name}` already exists"),
            Self::VersionInvalid(label) => write!(f, "version label `{label}` is invalid"),
            Self::VersionOutdated { version } => write!(f, "version {version} is outdated"),
            Self::InvalidCriteria(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCriteria(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(Lookup::Id(id.to_string())),
            RepoError::NameTaken(name) => Self::NameExists(name),
            other => Self::Repo(other),
        }
    }
}

impl From<CriteriaError> for ServiceError {
    fn from(value: CriteriaError) -> Self {
        Self::InvalidCriteria(value)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}
