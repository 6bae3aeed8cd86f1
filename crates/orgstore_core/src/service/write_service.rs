//! Organization write coordinator.
//!
//! # Responsibility
//! - Create, update and delete organization aggregates.
//! - Enforce optimistic concurrency on updates.
//! - Announce new organizations through the [`Notifier`].
//!
//! # Invariants
//! - Version labels are checked before any store access.
//! - A stale caller version never overwrites newer data.
//! - Delete removes description, locations and root atomically.

use crate::mail::{Mailer, Notifier};
use crate::model::organization::{NewOrganization, OrganizationId, OrganizationUpdate};
use crate::repo::organization_repo::{DeletePlan, OrganizationRepository, RepoError};
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::read_service::OrganizationReadService;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"[0-9]{1,3}"$"#).expect("valid version label regex"));

/// Parses a quoted version label such as `"3"` (quotes included).
pub fn parse_version_label(label: &str) -> ServiceResult<u32> {
    if !VERSION_RE.is_match(label) {
        return Err(ServiceError::VersionInvalid(label.to_string()));
    }
    label
        .trim_matches('"')
        .parse()
        .map_err(|_| ServiceError::VersionInvalid(label.to_string()))
}

/// Write-side coordinator over an [`OrganizationRepository`].
pub struct OrganizationWriteService<R, M>
where
    R: OrganizationRepository + Clone,
    M: Mailer,
{
    repo: R,
    reader: OrganizationReadService<R>,
    notifier: Notifier<M>,
}

impl<R, M> OrganizationWriteService<R, M>
where
    R: OrganizationRepository + Clone,
    M: Mailer,
{
    pub fn new(repo: R, notifier: Notifier<M>) -> Self {
        Self {
            reader: OrganizationReadService::new(repo.clone()),
            repo,
            notifier,
        }
    }

    /// Persists a new aggregate and returns its id.
    ///
    /// The creation mail is dispatched after commit and never affects the
    /// result.
    pub fn create(&self, input: &NewOrganization) -> ServiceResult<OrganizationId> {
        input.validate()?;
        if self.repo.exists_by_name(&input.name)? {
            debug!("event=organization_create module=service status=rejected reason=name_exists");
            return Err(ServiceError::NameExists(input.name.clone()));
        }

        let id = self.repo.insert(input)?;
        info!(
            "event=organization_create module=service status=ok id={id} locations={}",
            input.locations.len()
        );

        let delivery = self.notifier.dispatch(
            format!("New organization {id}"),
            format!(
                "Organization with slogan <strong>{}</strong> has been created",
                input.description.slogan
            ),
        );
        // Detached: the create result never waits on mail delivery.
        drop(delivery);
        Ok(id)
    }

    /// Applies `update` if `version_label` is not older than the stored
    /// version; returns the new version.
    pub fn update(
        &self,
        id: OrganizationId,
        update: &OrganizationUpdate,
        version_label: &str,
    ) -> ServiceResult<u32> {
        let version = parse_version_label(version_label)?;
        let mut organization = self.reader.get(id, false)?;

        let persisted_version = organization.version;
        if version < persisted_version {
            debug!(
                "event=organization_update module=service status=rejected reason=outdated id={id} version={version} persisted={persisted_version}"
            );
            return Err(ServiceError::VersionOutdated { version });
        }

        organization.merge(update);
        organization.validate()?;

        let new_version = match self.repo.update_scalars(&organization, persisted_version) {
            Ok(new_version) => new_version,
            Err(RepoError::VersionConflict { .. }) => {
                debug!("event=organization_update module=service status=rejected reason=conflict id={id}");
                return Err(ServiceError::VersionOutdated { version });
            }
            Err(err) => return Err(err.into()),
        };

        info!("event=organization_update module=service status=ok id={id} version={new_version}");
        Ok(new_version)
    }

    /// Removes the aggregate with its description and locations.
    pub fn delete(&self, id: OrganizationId) -> ServiceResult<bool> {
        let organization = self.reader.get(id, true)?;
        let plan = DeletePlan::for_aggregate(&organization);
        let removed = self.repo.execute_delete(&plan)?;

        info!(
            "event=organization_delete module=service status=ok id={id} steps={} removed={removed}",
            plan.steps().len()
        );
        Ok(removed)
    }
}
