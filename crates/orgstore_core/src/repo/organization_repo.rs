//! Organization repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Load aggregates with their description (always) and locations (on
//!   request).
//! - Persist new aggregates, version-gated scalar updates and ordered
//!   cascading deletes.
//!
//! # Invariants
//! - `insert` writes organization, description and locations in one
//!   transaction.
//! - `update_scalars` is a compare-and-set on `version`; a stale expected
//!   version changes nothing.
//! - `execute_delete` runs every [`DeleteStep`] in one transaction; an error
//!   on any step rolls back all earlier steps.

use crate::db::migrations::latest_version;
use crate::db::{DbError, CASEFOLD_FUNCTION};
use crate::model::organization::{
    Description, Industry, Location, NewOrganization, Organization, OrganizationId,
};
use crate::search::criteria::CompiledQuery;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ORGANIZATION_SELECT_SQL: &str = "SELECT
    o.id,
    o.version,
    o.name,
    o.industry,
    o.revenue,
    o.employee_count,
    o.active,
    o.founded_on,
    o.website,
    o.keywords,
    o.created_at,
    o.updated_at,
    d.id AS description_id,
    d.slogan,
    d.mission
FROM organization AS o
INNER JOIN description AS d ON d.organization_id = o.id";

const NAME_UNIQUE_MARKER: &str = "organization.name";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for organization persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(OrganizationId),
    /// Row exists but its version no longer equals the expected one.
    VersionConflict {
        id: OrganizationId,
        expected_version: u32,
    },
    /// UNIQUE constraint on `organization.name` rejected the write.
    NameTaken(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Connection lacks a scalar function registered by `db::open_*`.
    MissingRequiredFunction(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "organization not found: {id}"),
            Self::VersionConflict {
                id,
                expected_version,
            } => write!(
                f,
                "organization {id} is no longer at version {expected_version}"
            ),
            Self::NameTaken(name) => write!(f, "organization name already taken: {name}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "organization repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "organization repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "organization repository requires column `{column}` in table `{table}`"
            ),
            Self::MissingRequiredFunction(name) => {
                write!(f, "organization repository requires SQL function `{name}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted organization data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One row removal of a cascading delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    Description(i64),
    Location(i64),
    Organization(OrganizationId),
}

impl DeleteStep {
    fn sql(self) -> &'static str {
        match self {
            Self::Description(_) => "DELETE FROM description WHERE id = ?1;",
            Self::Location(_) => "DELETE FROM location WHERE id = ?1;",
            Self::Organization(_) => "DELETE FROM organization WHERE id = ?1;",
        }
    }

    fn row_id(self) -> i64 {
        match self {
            Self::Description(id) | Self::Location(id) | Self::Organization(id) => id,
        }
    }
}

/// Ordered delete steps for one aggregate: children first, root last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePlan {
    steps: Vec<DeleteStep>,
}

impl DeletePlan {
    /// Builds the plan from an aggregate loaded with its locations.
    pub fn for_aggregate(organization: &Organization) -> Self {
        let locations = organization.locations.as_deref().unwrap_or_default();
        let mut steps = Vec::with_capacity(locations.len() + 2);
        steps.push(DeleteStep::Description(organization.description.id));
        steps.extend(
            locations
                .iter()
                .map(|location| DeleteStep::Location(location.id)),
        );
        steps.push(DeleteStep::Organization(organization.id));
        Self { steps }
    }

    pub fn steps(&self) -> &[DeleteStep] {
        &self.steps
    }
}

/// Store contract for the organization aggregate.
pub trait OrganizationRepository {
    /// Loads one aggregate; locations only when `include_locations`.
    fn find_one(
        &self,
        id: OrganizationId,
        include_locations: bool,
    ) -> RepoResult<Option<Organization>>;
    /// Loads every aggregate matching `query`, ordered by id.
    fn find_matching(&self, query: &CompiledQuery) -> RepoResult<Vec<Organization>>;
    fn exists_by_name(&self, name: &str) -> RepoResult<bool>;
    /// Inserts organization, description and locations atomically.
    fn insert(&self, input: &NewOrganization) -> RepoResult<OrganizationId>;
    /// Writes scalar fields if the row is still at `expected_version`;
    /// returns the incremented version.
    fn update_scalars(
        &self,
        organization: &Organization,
        expected_version: u32,
    ) -> RepoResult<u32>;
    /// Runs `plan` atomically; returns whether the root row was removed.
    fn execute_delete(&self, plan: &DeletePlan) -> RepoResult<bool>;
    fn count_organizations(&self) -> RepoResult<u64>;
}

/// SQLite-backed organization repository.
#[derive(Clone, Copy)]
pub struct SqliteOrganizationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrganizationRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl OrganizationRepository for SqliteOrganizationRepository<'_> {
    fn find_one(
        &self,
        id: OrganizationId,
        include_locations: bool,
    ) -> RepoResult<Option<Organization>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORGANIZATION_SELECT_SQL} WHERE o.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut organization = parse_organization_row(row)?;
        if include_locations {
            organization.locations = Some(load_locations(self.conn, id)?);
        }
        Ok(Some(organization))
    }

    fn find_matching(&self, query: &CompiledQuery) -> RepoResult<Vec<Organization>> {
        let sql = format!("{ORGANIZATION_SELECT_SQL}{} ORDER BY o.id ASC;", query.where_sql());
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(query.params()))?;
        let mut organizations = Vec::new();
        while let Some(row) = rows.next()? {
            organizations.push(parse_organization_row(row)?);
        }
        Ok(organizations)
    }

    fn exists_by_name(&self, name: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM organization WHERE name = ?1);",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert(&self, input: &NewOrganization) -> RepoResult<OrganizationId> {
        let keywords = encode_keywords(&input.keywords)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO organization (
                name,
                industry,
                revenue,
                employee_count,
                active,
                founded_on,
                website,
                keywords
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                input.name.as_str(),
                input.industry.map(Industry::as_str),
                input.revenue,
                input.employee_count,
                input.active,
                input.founded_on.as_deref(),
                input.website.as_deref(),
                keywords,
            ],
        )
        .map_err(|err| map_name_violation(err, &input.name))?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO description (organization_id, slogan, mission) VALUES (?1, ?2, ?3);",
            params![
                id,
                input.description.slogan.as_str(),
                input.description.mission.as_deref()
            ],
        )?;

        for location in &input.locations {
            tx.execute(
                "INSERT INTO location (organization_id, address, country, city)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    id,
                    location.address.as_str(),
                    location.country.as_deref(),
                    location.city.as_deref()
                ],
            )?;
        }

        tx.commit()?;
        Ok(id)
    }

    fn update_scalars(
        &self,
        organization: &Organization,
        expected_version: u32,
    ) -> RepoResult<u32> {
        let keywords = organization
            .keywords
            .as_deref()
            .map(encode_keywords)
            .transpose()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let changed = tx
            .execute(
                "UPDATE organization
                 SET
                    name = ?1,
                    industry = ?2,
                    revenue = ?3,
                    employee_count = ?4,
                    active = ?5,
                    founded_on = ?6,
                    website = ?7,
                    keywords = ?8,
                    version = version + 1,
                    updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
                 WHERE id = ?9
                   AND version = ?10;",
                params![
                    organization.name.as_str(),
                    organization.industry.map(Industry::as_str),
                    organization.revenue,
                    organization.employee_count,
                    organization.active,
                    organization.founded_on.as_deref(),
                    organization.website.as_deref(),
                    keywords,
                    organization.id,
                    expected_version,
                ],
            )
            .map_err(|err| map_name_violation(err, &organization.name))?;

        let current: Option<i64> = tx
            .query_row(
                "SELECT version FROM organization WHERE id = ?1;",
                [organization.id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Err(RepoError::NotFound(organization.id));
        };
        if changed == 0 {
            return Err(RepoError::VersionConflict {
                id: organization.id,
                expected_version,
            });
        }

        let new_version = decode_version(current)?;
        tx.commit()?;
        Ok(new_version)
    }

    fn execute_delete(&self, plan: &DeletePlan) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut root_removed = false;
        for step in plan.steps() {
            let affected = tx.execute(step.sql(), [step.row_id()])?;
            if matches!(step, DeleteStep::Organization(_)) {
                root_removed = affected > 0;
            }
        }
        tx.commit()?;
        Ok(root_removed)
    }

    fn count_organizations(&self) -> RepoResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM organization;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative organization count {count}")))
    }
}

fn parse_organization_row(row: &Row<'_>) -> RepoResult<Organization> {
    let id: OrganizationId = row.get("id")?;

    let industry = match row.get::<_, Option<String>>("industry")? {
        Some(value) => Some(Industry::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid industry `{value}` in organization.industry"
            ))
        })?),
        None => None,
    };

    let active = match row.get::<_, Option<i64>>("active")? {
        None => None,
        Some(0) => Some(false),
        Some(1) => Some(true),
        Some(other) => {
            return Err(RepoError::InvalidData(format!(
                "invalid active value `{other}` in organization.active"
            )));
        }
    };

    let keywords = match row.get::<_, Option<String>>("keywords")? {
        Some(text) => Some(serde_json::from_str::<Vec<String>>(&text).map_err(|err| {
            RepoError::InvalidData(format!(
                "invalid keywords `{text}` in organization.keywords: {err}"
            ))
        })?),
        None => None,
    };

    Ok(Organization {
        id,
        version: decode_version(row.get("version")?)?,
        name: row.get("name")?,
        industry,
        revenue: row.get("revenue")?,
        employee_count: row.get("employee_count")?,
        active,
        founded_on: row.get("founded_on")?,
        website: row.get("website")?,
        keywords,
        description: Description {
            id: row.get("description_id")?,
            organization_id: id,
            slogan: row.get("slogan")?,
            mission: row.get("mission")?,
        },
        locations: None,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn load_locations(conn: &Connection, organization_id: OrganizationId) -> RepoResult<Vec<Location>> {
    let mut stmt = conn.prepare(
        "SELECT id, organization_id, address, country, city
         FROM location
         WHERE organization_id = ?1
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([organization_id])?;
    let mut locations = Vec::new();
    while let Some(row) = rows.next()? {
        locations.push(Location {
            id: row.get("id")?,
            organization_id: row.get("organization_id")?,
            address: row.get("address")?,
            country: row.get("country")?,
            city: row.get("city")?,
        });
    }
    Ok(locations)
}

fn decode_version(value: i64) -> RepoResult<u32> {
    u32::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid version `{value}` in organization.version"))
    })
}

fn encode_keywords(keywords: &[String]) -> RepoResult<String> {
    serde_json::to_string(keywords)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode keywords: {err}")))
}

fn map_name_violation(err: rusqlite::Error, name: &str) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation && message.contains(NAME_UNIQUE_MARKER)
        {
            return RepoError::NameTaken(name.to_string());
        }
    }
    RepoError::from(err)
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    const REQUIRED: &[(&str, &[&str])] = &[
        ("organization", &["id", "version", "name", "keywords"]),
        ("description", &["id", "organization_id", "slogan", "mission"]),
        ("location", &["id", "organization_id", "address"]),
    ];

    for &(table, columns) in REQUIRED {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    if conn
        .query_row(&format!("SELECT {CASEFOLD_FUNCTION}('');"), [], |row| {
            row.get::<_, String>(0)
        })
        .is_err()
    {
        return Err(RepoError::MissingRequiredFunction(CASEFOLD_FUNCTION));
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{DeletePlan, DeleteStep};
    use crate::model::organization::{Description, Location, Organization};

    fn aggregate(locations: Option<Vec<Location>>) -> Organization {
        Organization {
            id: 7,
            version: 0,
            name: "Acme".to_string(),
            industry: None,
            revenue: 1.0,
            employee_count: None,
            active: None,
            founded_on: None,
            website: None,
            keywords: None,
            description: Description {
                id: 70,
                organization_id: 7,
                slogan: "Build".to_string(),
                mission: None,
            },
            locations,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn location(id: i64) -> Location {
        Location {
            id,
            organization_id: 7,
            address: format!("Street {id}"),
            country: None,
            city: None,
        }
    }

    #[test]
    fn delete_plan_removes_children_before_root() {
        let plan = DeletePlan::for_aggregate(&aggregate(Some(vec![location(3), location(4)])));
        assert_eq!(
            plan.steps(),
            &[
                DeleteStep::Description(70),
                DeleteStep::Location(3),
                DeleteStep::Location(4),
                DeleteStep::Organization(7),
            ]
        );
    }

    #[test]
    fn delete_plan_without_loaded_locations_has_two_steps() {
        let plan = DeletePlan::for_aggregate(&aggregate(None));
        assert_eq!(plan.steps().len(), 2);
    }
}
