use orgstore_core::db::open_db_in_memory;
use orgstore_core::{
    CriteriaError, Industry, Lookup, NewLocation, NewOrganization, OrganizationReadService,
    OrganizationRepository, SearchCriteria, ServiceError, SqliteOrganizationRepository,
};
use rusqlite::{params, Connection};

fn seed(conn: &Connection, name: &str, keywords: &[&str], city: Option<&str>) -> i64 {
    let repo = SqliteOrganizationRepository::try_new(conn).unwrap();
    let mut input = NewOrganization::new(name, 500.0, format!("{name} builds things"));
    input.industry = Some(Industry::It);
    input.keywords = keywords.iter().map(|keyword| keyword.to_string()).collect();
    if let Some(city) = city {
        input.locations.push(NewLocation {
            address: format!("{city} Plaza 1"),
            country: None,
            city: Some(city.to_string()),
        });
    }
    repo.insert(&input).unwrap()
}

#[test]
fn find_by_id_returns_aggregate_with_optional_locations() {
    let conn = open_db_in_memory().unwrap();
    let id = seed(&conn, "Acme", &["JAVA"], Some("Berlin"));
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    let with_locations = service.find_by_id(&id.to_string(), true).unwrap();
    assert_eq!(with_locations.id, id);
    assert_eq!(with_locations.description.slogan, "Acme builds things");
    assert_eq!(with_locations.locations.as_ref().map(Vec::len), Some(1));

    let without_locations = service.find_by_id(&id.to_string(), false).unwrap();
    assert!(without_locations.locations.is_none());
}

#[test]
fn find_by_id_with_unknown_or_malformed_id_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, "Acme", &[], None);
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    for raw in ["999999", "0", "-3", "abc", "012"] {
        match service.find_by_id(raw, false) {
            Err(ServiceError::NotFound(Lookup::Id(id))) => assert_eq!(id, raw),
            other => panic!("unexpected result for {raw:?}: {other:?}"),
        }
    }
}

#[test]
fn null_keywords_are_normalized_to_empty() {
    let conn = open_db_in_memory().unwrap();
    let id = seed(&conn, "Acme", &[], None);
    conn.execute(
        "UPDATE organization SET keywords = NULL WHERE id = ?1;",
        params![id],
    )
    .unwrap();
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    let organization = service.get(id, false).unwrap();
    assert_eq!(organization.keywords, Some(Vec::new()));

    let found = service.find(None).unwrap();
    assert_eq!(found[0].keywords, Some(Vec::new()));
}

#[test]
fn empty_or_absent_criteria_return_everything_in_id_order() {
    let conn = open_db_in_memory().unwrap();
    let first = seed(&conn, "Acme", &[], None);
    let second = seed(&conn, "Globex", &[], None);
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    let absent: Vec<_> = service.find(None).unwrap().iter().map(|o| o.id).collect();
    let empty: Vec<_> = service
        .find(Some(&SearchCriteria::new()))
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(absent, vec![first, second]);
    assert_eq!(empty, absent);
}

#[test]
fn empty_store_with_no_criteria_is_an_empty_list() {
    let conn = open_db_in_memory().unwrap();
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());
    assert!(service.find(None).unwrap().is_empty());
}

#[test]
fn unknown_criteria_key_fails_before_querying() {
    let conn = open_db_in_memory().unwrap();
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    let criteria = SearchCriteria::new().with("colour", "blue");
    match service.find(Some(&criteria)) {
        Err(ServiceError::InvalidCriteria(CriteriaError::UnknownKey(key))) => {
            assert_eq!(key, "colour")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn unparseable_criteria_value_is_invalid_criteria() {
    let conn = open_db_in_memory().unwrap();
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    let criteria = SearchCriteria::new().with("employee_count", "many");
    assert!(matches!(
        service.find(Some(&criteria)),
        Err(ServiceError::InvalidCriteria(CriteriaError::InvalidValue { .. }))
    ));
}

#[test]
fn non_empty_criteria_without_match_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, "Acme", &[], None);
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    let criteria = SearchCriteria::new().with("name", "Initech");
    match service.find(Some(&criteria)) {
        Err(ServiceError::NotFound(Lookup::Criteria(reported))) => assert_eq!(reported, criteria),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn tag_flags_match_exact_keywords_only() {
    let conn = open_db_in_memory().unwrap();
    let javascript = seed(&conn, "Scripted", &["JAVASCRIPT"], None);
    let java = seed(&conn, "Beans", &["JAVA", "PYTHON"], None);
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    let ids = |criteria: SearchCriteria| -> Vec<i64> {
        service
            .find(Some(&criteria))
            .unwrap()
            .iter()
            .map(|organization| organization.id)
            .collect()
    };

    assert_eq!(ids(SearchCriteria::new().with("java", "true")), vec![java]);
    assert_eq!(
        ids(SearchCriteria::new().with("javascript", "true")),
        vec![javascript]
    );
    assert_eq!(
        ids(SearchCriteria::new()
            .with("java", "true")
            .with("python", "true")),
        vec![java]
    );
    assert_eq!(
        ids(SearchCriteria::new().with("java", "false")),
        vec![javascript, java]
    );
}

#[test]
fn description_free_text_combines_with_field_equality() {
    let conn = open_db_in_memory().unwrap();
    let acme = seed(&conn, "Acme", &[], Some("Berlin"));
    seed(&conn, "Globex", &[], Some("Berlin"));
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    let criteria = SearchCriteria::new()
        .with("description", "acme builds")
        .with("locations", "Berlin");
    let found = service.find(Some(&criteria)).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, acme);
    assert!(found[0].locations.is_none());
}

#[test]
fn description_free_text_folds_non_ascii_case() {
    let conn = open_db_in_memory().unwrap();
    let id = seed(&conn, "Acme", &[], None);
    conn.execute(
        "UPDATE description SET slogan = 'Über alles', mission = 'Ärzte für alle' WHERE organization_id = ?1;",
        params![id],
    )
    .unwrap();
    let service = OrganizationReadService::new(SqliteOrganizationRepository::try_new(&conn).unwrap());

    for text in ["über", "ÜBER", "ALLES", "ärzte FÜR"] {
        let criteria = SearchCriteria::new().with("description", text);
        let found = service.find(Some(&criteria)).unwrap();
        assert_eq!(found.len(), 1, "{text:?} should match");
        assert_eq!(found[0].id, id);
    }

    let criteria = SearchCriteria::new().with("description", "ueber");
    assert!(matches!(
        service.find(Some(&criteria)),
        Err(ServiceError::NotFound(Lookup::Criteria(_)))
    ));
}
