//! Organization domain model.
//!
//! # Responsibility
//! - Define the `Organization` aggregate with `Description` and `Location`.
//! - Provide input validation for create and update paths.
//! - Merge partial updates onto a persisted aggregate.
//!
//! # Invariants
//! - `id` is store-assigned and never reused.
//! - `version` is store-maintained; callers never set it directly.
//! - `locations == None` means "not loaded", not "no locations".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned organization identifier.
pub type OrganizationId = i64;

pub const NAME_MAX_CHARS: usize = 50;

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid iso date regex"));

/// Business sector of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    It,
    Finance,
    Health,
    Education,
}

impl Industry {
    /// Storage and wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::It => "it",
            Self::Finance => "finance",
            Self::Health => "health",
            Self::Education => "education",
        }
    }

    /// Parses a storage token, ignoring ASCII case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "it" => Some(Self::It),
            "finance" => Some(Self::Finance),
            "health" => Some(Self::Health),
            "education" => Some(Self::Education),
            _ => None,
        }
    }
}

/// Mandatory one-to-one sub-record of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub id: i64,
    pub organization_id: OrganizationId,
    pub slogan: String,
    pub mission: Option<String>,
}

/// Optional one-to-many sub-record of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub organization_id: OrganizationId,
    pub address: String,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Aggregate root as read from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    /// Optimistic concurrency counter. Starts at 0.
    pub version: u32,
    pub name: String,
    pub industry: Option<Industry>,
    pub revenue: f64,
    pub employee_count: Option<i64>,
    pub active: Option<bool>,
    /// ISO-8601 calendar date (`YYYY-MM-DD`).
    pub founded_on: Option<String>,
    pub website: Option<String>,
    /// `None` when the stored column is NULL; read services normalize it.
    pub keywords: Option<Vec<String>>,
    pub description: Description,
    pub locations: Option<Vec<Location>>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Organization {
    /// Replaces a NULL keyword set with an empty one.
    pub fn normalize_keywords(&mut self) {
        self.keywords.get_or_insert_with(Vec::new);
    }

    /// Applies every field present in `update`; nested records are untouched.
    pub fn merge(&mut self, update: &OrganizationUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(industry) = update.industry {
            self.industry = Some(industry);
        }
        if let Some(revenue) = update.revenue {
            self.revenue = revenue;
        }
        if let Some(employee_count) = update.employee_count {
            self.employee_count = Some(employee_count);
        }
        if let Some(active) = update.active {
            self.active = Some(active);
        }
        if let Some(founded_on) = &update.founded_on {
            self.founded_on = Some(founded_on.clone());
        }
        if let Some(website) = &update.website {
            self.website = Some(website.clone());
        }
        if let Some(keywords) = &update.keywords {
            self.keywords = Some(keywords.clone());
        }
    }

    /// Validates scalar fields before an update is persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_scalars(&self.name, self.revenue, self.founded_on.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDescription {
    pub slogan: String,
    pub mission: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    pub address: String,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Create input: root fields plus owned sub-records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub industry: Option<Industry>,
    pub revenue: f64,
    pub employee_count: Option<i64>,
    pub active: Option<bool>,
    pub founded_on: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub description: NewDescription,
    #[serde(default)]
    pub locations: Vec<NewLocation>,
}

impl NewOrganization {
    /// Creates an input with required fields and empty optional ones.
    pub fn new(name: impl Into<String>, revenue: f64, slogan: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            industry: None,
            revenue,
            employee_count: None,
            active: None,
            founded_on: None,
            website: None,
            keywords: Vec::new(),
            description: NewDescription {
                slogan: slogan.into(),
                mission: None,
            },
            locations: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_scalars(&self.name, self.revenue, self.founded_on.as_deref())?;
        if self.description.slogan.trim().is_empty() {
            return Err(ValidationError::BlankSlogan);
        }
        if let Some(index) = self
            .locations
            .iter()
            .position(|location| location.address.trim().is_empty())
        {
            return Err(ValidationError::BlankAddress { index });
        }
        Ok(())
    }
}

/// Partial update of scalar fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
    pub industry: Option<Industry>,
    pub revenue: Option<f64>,
    pub employee_count: Option<i64>,
    pub active: Option<bool>,
    pub founded_on: Option<String>,
    pub website: Option<String>,
    pub keywords: Option<Vec<String>>,
}

/// Shape violations detected before persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    BlankName,
    NameTooLong { chars: usize },
    InvalidRevenue(f64),
    InvalidFoundedOn(String),
    BlankSlogan,
    BlankAddress { index: usize },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::NameTooLong { chars } => write!(
                f,
                "name has {chars} characters; at most {NAME_MAX_CHARS} are allowed"
            ),
            Self::InvalidRevenue(value) => {
                write!(f, "revenue must be a finite, non-negative number, got {value}")
            }
            Self::InvalidFoundedOn(value) => {
                write!(f, "founded_on must be formatted YYYY-MM-DD, got `{value}`")
            }
            Self::BlankSlogan => write!(f, "description slogan must not be blank"),
            Self::BlankAddress { index } => {
                write!(f, "location #{index} address must not be blank")
            }
        }
    }
}

impl Error for ValidationError {}

fn validate_scalars(
    name: &str,
    revenue: f64,
    founded_on: Option<&str>,
) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::BlankName);
    }
    let chars = name.chars().count();
    if chars > NAME_MAX_CHARS {
        return Err(ValidationError::NameTooLong { chars });
    }
    if !revenue.is_finite() || revenue < 0.0 {
        return Err(ValidationError::InvalidRevenue(revenue));
    }
    if let Some(value) = founded_on {
        if !ISO_DATE_RE.is_match(value) {
            return Err(ValidationError::InvalidFoundedOn(value.to_string()));
        }
    }
    Ok(())
}
