//! Search criteria compiler.
//!
//! # Responsibility
//! - Recognize criteria keys through the closed [`CriteriaKey`] enum.
//! - Compile recognized criteria into a conjunctive, parameterized predicate
//!   over `organization AS o` joined with `description AS d`.
//!
//! # Invariants
//! - Unknown keys fail before any clause is built or any row is read.
//! - SQL identifiers come only from enum variants; values are always bound.
//! - Clause order: free text, tag flags (javascript, typescript, java,
//!   python), then field equality filters in key order.
//! - Empty or absent criteria compile to a match-all predicate.

use crate::model::organization::Industry;
use log::debug;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const FLAG_ENABLED: &str = "true";

/// Loosely-typed criteria as received from a transport layer.
///
/// Keys iterate in lexicographic order, which keeps compiled SQL stable for
/// equal inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchCriteria(BTreeMap<String, String>);

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SearchCriteria {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl Display for SearchCriteria {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// Reserved boolean keys that test keyword-set membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TagFlag {
    Javascript,
    Typescript,
    Java,
    Python,
}

impl TagFlag {
    /// Fixed evaluation order.
    pub const ALL: [TagFlag; 4] = [Self::Javascript, Self::Typescript, Self::Java, Self::Python];

    pub fn key(self) -> &'static str {
        match self {
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Java => "java",
            Self::Python => "python",
        }
    }

    /// Keyword value the flag looks for.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Javascript => "JAVASCRIPT",
            Self::Typescript => "TYPESCRIPT",
            Self::Java => "JAVA",
            Self::Python => "PYTHON",
        }
    }
}

/// Organization attributes usable as equality filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationField {
    Id,
    Version,
    Name,
    Industry,
    Revenue,
    EmployeeCount,
    Active,
    FoundedOn,
    Website,
    Keywords,
    Locations,
    CreatedAt,
    UpdatedAt,
}

impl OrganizationField {
    fn parse(key: &str) -> Option<Self> {
        let field = match key {
            "id" => Self::Id,
            "version" => Self::Version,
            "name" => Self::Name,
            "industry" => Self::Industry,
            "revenue" => Self::Revenue,
            "employee_count" => Self::EmployeeCount,
            "active" => Self::Active,
            "founded_on" => Self::FoundedOn,
            "website" => Self::Website,
            "keywords" => Self::Keywords,
            "locations" => Self::Locations,
            "created_at" => Self::CreatedAt,
            "updated_at" => Self::UpdatedAt,
            _ => return None,
        };
        Some(field)
    }
}

/// Every key a criteria map may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaKey {
    /// Free-text match on the owned description.
    Description,
    Tag(TagFlag),
    Field(OrganizationField),
}

impl CriteriaKey {
    /// Case-sensitive key lookup.
    pub fn parse(key: &str) -> Option<Self> {
        if key == "description" {
            return Some(Self::Description);
        }
        if let Some(flag) = TagFlag::ALL.into_iter().find(|flag| flag.key() == key) {
            return Some(Self::Tag(flag));
        }
        OrganizationField::parse(key).map(Self::Field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriteriaError {
    /// Key is neither an organization attribute nor a reserved tag flag.
    UnknownKey(String),
    /// Value cannot be converted to the attribute's column type.
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

impl Display for CriteriaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKey(key) => write!(f, "unknown search criterion `{key}`"),
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(
                f,
                "invalid value `{value}` for search criterion `{key}`; expected {expected}"
            ),
        }
    }
}

impl Error for CriteriaError {}

/// One conjunct of a compiled predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    sql: String,
    params: Vec<Value>,
}

impl Clause {
    fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Conjunctive predicate produced by [`compile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    clauses: Vec<Clause>,
}

impl CompiledQuery {
    /// Predicate matching every row.
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn is_match_all(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Renders ` WHERE c1 AND c2 ...`, or an empty string for match-all.
    pub fn where_sql(&self) -> String {
        let mut sql = String::new();
        for (index, clause) in self.clauses.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            sql.push_str(&clause.sql);
        }
        sql
    }

    /// Positional parameters matching the `?` placeholders of [`where_sql`].
    ///
    /// [`where_sql`]: CompiledQuery::where_sql
    pub fn params(&self) -> Vec<Value> {
        self.clauses
            .iter()
            .flat_map(|clause| clause.params.iter().cloned())
            .collect()
    }
}

/// Compiles `criteria` into a predicate.
///
/// # Errors
/// - [`CriteriaError::UnknownKey`] for any unrecognized key.
/// - [`CriteriaError::InvalidValue`] when a field value does not parse.
pub fn compile(criteria: Option<&SearchCriteria>) -> Result<CompiledQuery, CriteriaError> {
    let Some(criteria) = criteria.filter(|criteria| !criteria.is_empty()) else {
        return Ok(CompiledQuery::match_all());
    };

    let mut free_text = None;
    let mut flags = Vec::new();
    let mut fields = Vec::new();
    for (key, value) in criteria.iter() {
        match CriteriaKey::parse(key) {
            Some(CriteriaKey::Description) => free_text = Some(value),
            Some(CriteriaKey::Tag(flag)) => {
                if value == FLAG_ENABLED {
                    flags.push(flag);
                }
            }
            Some(CriteriaKey::Field(field)) => fields.push((key, field, value)),
            None => {
                debug!("event=criteria_compile module=search status=rejected key={key}");
                return Err(CriteriaError::UnknownKey(key.to_string()));
            }
        }
    }
    flags.sort();

    let mut clauses = Vec::new();
    if let Some(text) = free_text {
        let pattern = Value::Text(format!("%{}%", escape_like(&text.to_lowercase())));
        clauses.push(Clause::new(
            r"(casefold(d.slogan) LIKE ? ESCAPE '\' OR casefold(COALESCE(d.mission, '')) LIKE ? ESCAPE '\')",
            vec![pattern.clone(), pattern],
        ));
    }
    for flag in flags {
        clauses.push(keyword_clause(flag.keyword()));
    }
    for (key, field, value) in fields {
        clauses.push(field_clause(key, field, value)?);
    }

    debug!(
        "event=criteria_compile module=search status=ok keys={} clauses={}",
        criteria.len(),
        clauses.len()
    );
    Ok(CompiledQuery { clauses })
}

fn keyword_clause(keyword: &str) -> Clause {
    Clause::new(
        "EXISTS (SELECT 1 FROM json_each(o.keywords) WHERE json_each.value = ?)",
        vec![Value::Text(keyword.to_string())],
    )
}

fn field_clause(key: &str, field: OrganizationField, value: &str) -> Result<Clause, CriteriaError> {
    let invalid = |expected: &'static str| CriteriaError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    };
    let text = || Value::Text(value.to_string());

    let clause = match field {
        OrganizationField::Id => equals("o.id", parse_integer(value).ok_or_else(|| invalid("an integer"))?),
        OrganizationField::Version => {
            equals("o.version", parse_integer(value).ok_or_else(|| invalid("an integer"))?)
        }
        OrganizationField::EmployeeCount => equals(
            "o.employee_count",
            parse_integer(value).ok_or_else(|| invalid("an integer"))?,
        ),
        OrganizationField::CreatedAt => equals(
            "o.created_at",
            parse_integer(value).ok_or_else(|| invalid("epoch milliseconds"))?,
        ),
        OrganizationField::UpdatedAt => equals(
            "o.updated_at",
            parse_integer(value).ok_or_else(|| invalid("epoch milliseconds"))?,
        ),
        OrganizationField::Revenue => {
            let revenue = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|revenue| revenue.is_finite())
                .ok_or_else(|| invalid("a number"))?;
            equals("o.revenue", Value::Real(revenue))
        }
        OrganizationField::Active => {
            let active = parse_bool(value).ok_or_else(|| invalid("true or false"))?;
            equals("o.active", Value::Integer(i64::from(active)))
        }
        OrganizationField::Industry => {
            let industry = Industry::parse(value)
                .ok_or_else(|| invalid("one of it|finance|health|education"))?;
            equals("o.industry", Value::Text(industry.as_str().to_string()))
        }
        OrganizationField::Name => equals("o.name", text()),
        OrganizationField::FoundedOn => equals("o.founded_on", text()),
        OrganizationField::Website => equals("o.website", text()),
        OrganizationField::Keywords => keyword_clause(value),
        OrganizationField::Locations => Clause::new(
            "EXISTS (SELECT 1 FROM location l WHERE l.organization_id = o.id \
             AND (l.city = ? OR l.country = ? OR l.address = ?))",
            vec![text(), text(), text()],
        ),
    };
    Ok(clause)
}

fn equals(column: &'static str, value: Value) -> Clause {
    Clause::new(format!("{column} = ?"), vec![value])
}

fn parse_integer(value: &str) -> Option<Value> {
    value.trim().parse::<i64>().ok().map(Value::Integer)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{compile, CriteriaError, CriteriaKey, OrganizationField, SearchCriteria, TagFlag};
    use rusqlite::types::Value;

    #[test]
    fn absent_and_empty_criteria_match_all() {
        assert!(compile(None).unwrap().is_match_all());
        let empty = SearchCriteria::new();
        let compiled = compile(Some(&empty)).unwrap();
        assert!(compiled.is_match_all());
        assert_eq!(compiled.where_sql(), "");
        assert!(compiled.params().is_empty());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let criteria = SearchCriteria::new()
            .with("name", "Acme")
            .with("rust", "true");
        assert_eq!(
            compile(Some(&criteria)).unwrap_err(),
            CriteriaError::UnknownKey("rust".to_string())
        );
    }

    #[test]
    fn keys_are_case_sensitive() {
        assert_eq!(CriteriaKey::parse("Name"), None);
        assert_eq!(CriteriaKey::parse("JAVA"), None);
        assert_eq!(
            CriteriaKey::parse("name"),
            Some(CriteriaKey::Field(OrganizationField::Name))
        );
        assert_eq!(
            CriteriaKey::parse("java"),
            Some(CriteriaKey::Tag(TagFlag::Java))
        );
    }

    #[test]
    fn free_text_leads_then_flags_in_fixed_order_then_fields() {
        let criteria = SearchCriteria::new()
            .with("website", "https://acme.example")
            .with("python", "true")
            .with("javascript", "true")
            .with("description", "future")
            .with("active", "true");
        let compiled = compile(Some(&criteria)).unwrap();
        let sql: Vec<&str> = compiled.clauses().iter().map(|clause| clause.sql()).collect();

        assert!(sql[0].starts_with("(casefold(d.slogan) LIKE"));
        assert_eq!(compiled.clauses()[1].params(), &[Value::Text("JAVASCRIPT".into())]);
        assert_eq!(compiled.clauses()[2].params(), &[Value::Text("PYTHON".into())]);
        assert_eq!(sql[3], "o.active = ?");
        assert_eq!(sql[4], "o.website = ?");

        let where_sql = compiled.where_sql();
        assert!(where_sql.starts_with(" WHERE (casefold(d.slogan) LIKE"));
        assert_eq!(where_sql.matches(" AND ").count(), 4);
    }

    #[test]
    fn flag_without_true_value_is_inert() {
        let criteria = SearchCriteria::new()
            .with("java", "false")
            .with("typescript", "TRUE");
        let compiled = compile(Some(&criteria)).unwrap();
        assert!(compiled.is_match_all());
    }

    #[test]
    fn free_text_escapes_like_wildcards() {
        let criteria = SearchCriteria::new().with("description", "100%_sure");
        let compiled = compile(Some(&criteria)).unwrap();
        assert_eq!(
            compiled.params(),
            vec![
                Value::Text(r"%100\%\_sure%".to_string()),
                Value::Text(r"%100\%\_sure%".to_string())
            ]
        );
    }

    #[test]
    fn free_text_pattern_is_unicode_lowercased() {
        let criteria = SearchCriteria::new().with("description", "ÜBER Alles");
        let compiled = compile(Some(&criteria)).unwrap();
        assert_eq!(
            compiled.clauses()[0].params(),
            &[
                Value::Text("%über alles%".to_string()),
                Value::Text("%über alles%".to_string())
            ]
        );
    }

    #[test]
    fn typed_fields_bind_typed_values() {
        let criteria = SearchCriteria::new()
            .with("employee_count", "42")
            .with("industry", "IT")
            .with("revenue", "1000.5");
        let compiled = compile(Some(&criteria)).unwrap();
        assert_eq!(
            compiled.params(),
            vec![
                Value::Integer(42),
                Value::Text("it".to_string()),
                Value::Real(1000.5)
            ]
        );
    }

    #[test]
    fn unparseable_value_is_rejected() {
        let criteria = SearchCriteria::new().with("employee_count", "many");
        let err = compile(Some(&criteria)).unwrap_err();
        assert!(matches!(err, CriteriaError::InvalidValue { key, .. } if key == "employee_count"));
    }

    #[test]
    fn criteria_display_is_json() {
        let criteria = SearchCriteria::new().with("name", "Acme");
        assert_eq!(criteria.to_string(), r#"{"name":"Acme"}"#);
    }
}
