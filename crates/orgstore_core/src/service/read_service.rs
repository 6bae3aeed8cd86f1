//! Organization read facade.
//!
//! # Responsibility
//! - Resolve id lookups and criteria searches into aggregates.
//! - Own the id format gate shared by every id-based lookup.
//!
//! # Invariants
//! - Description is always loaded; locations only on request.
//! - Returned aggregates never carry a `None` keyword set.
//! - Absent or empty criteria never fail with `NotFound`.

use crate::model::organization::{Organization, OrganizationId};
use crate::repo::organization_repo::OrganizationRepository;
use crate::search::criteria::{compile, SearchCriteria};
use crate::service::error::{Lookup, ServiceError, ServiceResult};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]{0,10}$").expect("valid organization id regex"));

/// Parses a caller-supplied id, accepting 1 to 11 digits without a leading
/// zero.
pub fn parse_organization_id(raw: &str) -> Option<OrganizationId> {
    if !ID_RE.is_match(raw) {
        return None;
    }
    raw.parse().ok()
}

/// Read-side facade over an [`OrganizationRepository`].
pub struct OrganizationReadService<R: OrganizationRepository> {
    repo: R,
}

impl<R: OrganizationRepository> OrganizationReadService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Finds one organization by its textual id.
    ///
    /// Malformed and unknown ids both fail with `NotFound`.
    pub fn find_by_id(&self, id: &str, include_locations: bool) -> ServiceResult<Organization> {
        debug!("event=organization_find_by_id module=service id={id} include_locations={include_locations}");
        let Some(parsed) = parse_organization_id(id) else {
            debug!("event=organization_find_by_id module=service status=rejected reason=id_format");
            return Err(ServiceError::NotFound(Lookup::Id(id.to_string())));
        };
        self.get(parsed, include_locations)
    }

    /// Finds one organization by numeric id.
    pub fn get(
        &self,
        id: OrganizationId,
        include_locations: bool,
    ) -> ServiceResult<Organization> {
        if id <= 0 {
            return Err(ServiceError::NotFound(Lookup::Id(id.to_string())));
        }

        let mut organization = self
            .repo
            .find_one(id, include_locations)?
            .ok_or_else(|| ServiceError::NotFound(Lookup::Id(id.to_string())))?;
        organization.normalize_keywords();

        debug!(
            "event=organization_get module=service status=ok id={} version={} locations={}",
            organization.id,
            organization.version,
            organization.locations.as_ref().map_or(0, Vec::len)
        );
        Ok(organization)
    }

    /// Searches organizations by criteria.
    ///
    /// # Errors
    /// - `InvalidCriteria` for unrecognized keys or unparseable values; the
    ///   store is not touched.
    /// - `NotFound` when non-empty criteria match no row.
    pub fn find(&self, criteria: Option<&SearchCriteria>) -> ServiceResult<Vec<Organization>> {
        if let Some(criteria) = criteria {
            debug!("event=organization_find module=service criteria={criteria}");
        }

        let query = compile(criteria)?;
        let mut organizations = self.repo.find_matching(&query)?;

        if let Some(criteria) = criteria.filter(|criteria| !criteria.is_empty()) {
            if organizations.is_empty() {
                debug!("event=organization_find module=service status=empty");
                return Err(ServiceError::NotFound(Lookup::Criteria(criteria.clone())));
            }
        }

        for organization in &mut organizations {
            organization.normalize_keywords();
        }
        debug!(
            "event=organization_find module=service status=ok count={}",
            organizations.len()
        );
        Ok(organizations)
    }
}
