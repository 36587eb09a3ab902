use rsdrop_core::{drop_user, CatalogBackend, DropOptions};
use rsdrop_emulator::*;
use tempfile::TempDir;

fn user(name: &str, id: i32) -> User {
    User {
        name: name.to_string(),
        id,
        superuser: name == "admin" || name == "rdsdb",
    }
}

/// A small cluster where `bob` holds grants from two grantors, owns a schema,
/// a table and a function, and has default privileges from `carol`
fn cluster() -> Catalog {
    Catalog {
        users: vec![
            user("rdsdb", 1),
            user("admin", 100),
            user("bob", 101),
            user("carol", 102),
            user("dave", 103),
        ],
        databases: vec![Database {
            name: "dev".to_string(),
            owner: "admin".to_string(),
            acl: vec!["admin=CT/admin".to_string(), "bob=T/admin".to_string()],
        }],
        schemas: vec![
            Schema {
                name: "sales".to_string(),
                owner: "admin".to_string(),
                acl: vec!["admin=UC/admin".to_string(), "bob=U/admin".to_string()],
            },
            Schema {
                name: "scratch".to_string(),
                owner: "bob".to_string(),
                acl: vec!["bob=UC/bob".to_string(), "dave=U/bob".to_string()],
            },
        ],
        relations: vec![
            Relation {
                schema: "sales".to_string(),
                name: "orders".to_string(),
                kind: RelationKind::Table,
                owner: "admin".to_string(),
                acl: vec![
                    "admin=arwdRxt/admin".to_string(),
                    "carol=r*/admin".to_string(),
                    "bob=r/admin".to_string(),
                    "bob=w/carol".to_string(),
                ],
            },
            Relation {
                schema: "scratch".to_string(),
                name: "notes".to_string(),
                kind: RelationKind::Table,
                owner: "bob".to_string(),
                acl: vec!["bob=arwdRxt/bob".to_string()],
            },
        ],
        functions: vec![Function {
            schema: "public".to_string(),
            name: "f_add".to_string(),
            arg_types: vec!["integer".to_string(), "integer".to_string()],
            owner: "bob".to_string(),
            acl: vec!["=X/bob".to_string(), "bob=X/bob".to_string()],
        }],
        default_acls: vec![DefaultAcl {
            user: "carol".to_string(),
            schema: Some("sales".to_string()),
            object_type: DefaultAclObject::Tables,
            acl: vec!["bob=r/carol".to_string()],
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_user_is_stripped_and_dropped() {
    let mut backend = EmulatorBackend::from_catalog(cluster(), "admin").unwrap();
    let mut out = Vec::new();

    let report = drop_user(&mut backend, "bob", &DropOptions::default(), &mut out)
        .await
        .unwrap();

    assert_eq!(report.executed, report.statements.len());
    assert_eq!(report.statements.last().unwrap(), "DROP USER bob;");
    assert!(report.warnings.is_empty());

    let catalog = backend.catalog();
    assert!(catalog.user("bob").is_none());
    assert_eq!(catalog.owned_count("bob"), 0);
    assert_eq!(catalog.schemas[1].owner, "admin");
    assert_eq!(catalog.relations[1].owner, "admin");
    assert_eq!(catalog.functions[0].owner, "admin");
    assert_eq!(catalog.schemas[1].acl, vec!["admin=UC/admin", "dave=U/admin"]);
    assert_eq!(catalog.relations[0].acl, vec!["admin=arwdRxt/admin", "carol=r*/admin"]);
    assert!(catalog.default_acls[0].acl.is_empty());
}

#[tokio::test]
async fn test_statements_are_printed_in_order() {
    let mut backend = EmulatorBackend::from_catalog(cluster(), "admin").unwrap();
    let mut out = Vec::new();

    let report = drop_user(&mut backend, "bob", &DropOptions::default(), &mut out)
        .await
        .unwrap();
    let printed = String::from_utf8(out).unwrap();

    let expected: String = report.statements.iter().map(|s| format!("\n{}\n", s)).collect();
    assert_eq!(printed, expected);

    let revoke = printed
        .find("SET SESSION AUTHORIZATION carol;REVOKE ALL on sales.orders FROM bob;")
        .unwrap();
    let transfer = printed.find("alter schema scratch owner to admin;").unwrap();
    let drop = printed.find("DROP USER bob;").unwrap();
    assert!(revoke < transfer && transfer < drop);
}

#[tokio::test]
async fn test_user_with_nothing_is_just_dropped() {
    let mut backend = EmulatorBackend::from_catalog(
        Catalog {
            users: vec![user("admin", 100), user("erin", 104)],
            ..Default::default()
        },
        "admin",
    )
    .unwrap();
    let mut out = Vec::new();
    let report = drop_user(&mut backend, "erin", &DropOptions::default(), &mut out)
        .await
        .unwrap();

    assert_eq!(report.statements, vec!["DROP USER erin;"]);
    assert_eq!(String::from_utf8(out).unwrap(), "\nDROP USER erin;\n");
    assert!(backend.catalog().user("erin").is_none());
}

#[tokio::test]
async fn test_unquoted_user_name_folds_to_lower_case() {
    let mut backend = EmulatorBackend::from_catalog(
        Catalog {
            users: vec![user("admin", 100), user("bob", 101)],
            ..Default::default()
        },
        "admin",
    )
    .unwrap();

    let report = drop_user(&mut backend, "Bob", &DropOptions::default(), &mut Vec::new())
        .await
        .unwrap();

    assert_eq!(report.statements, vec!["DROP USER Bob;"]);
    assert!(backend.catalog().user("bob").is_none());
}

#[tokio::test]
async fn test_grantee_of_dropped_owner_is_dropped_too() {
    let mut backend = EmulatorBackend::from_catalog(cluster(), "admin").unwrap();
    let mut out = Vec::new();

    let report = drop_user(&mut backend, "dave", &DropOptions::default(), &mut out)
        .await
        .unwrap();

    assert_eq!(
        report.statements,
        vec!["REVOKE ALL on schema scratch FROM dave;", "DROP USER dave;"]
    );
    assert_eq!(backend.catalog().schemas[1].acl, vec!["bob=UC/bob"]);
}

#[tokio::test]
async fn test_library_blocks_the_drop() {
    let mut catalog = cluster();
    catalog.libraries.push(Library {
        name: "numpy_helpers".to_string(),
        owner: "bob".to_string(),
    });
    let mut backend = EmulatorBackend::from_catalog(catalog, "admin").unwrap();
    let mut out = Vec::new();

    let err = drop_user(&mut backend, "bob", &DropOptions::default(), &mut out)
        .await
        .unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("DROP USER bob;"));
    assert!(message.contains("owns some object"));

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.starts_with("No DDL available for Python Library"));

    // everything before the drop was already committed
    let catalog = backend.catalog();
    assert!(catalog.user("bob").is_some());
    assert_eq!(catalog.schemas[1].owner, "admin");
    assert_eq!(catalog.libraries[0].owner, "bob");
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let mut backend = EmulatorBackend::from_catalog(cluster(), "admin").unwrap();
    let mut out = Vec::new();
    let options = DropOptions {
        dry_run: true,
        ..Default::default()
    };

    let report = drop_user(&mut backend, "bob", &options, &mut out).await.unwrap();

    assert_eq!(report.executed, 0);
    assert!(!report.statements.is_empty());
    let mut expected = cluster();
    expected.views_installed = true;
    assert_eq!(backend.catalog(), &expected);
}

#[tokio::test]
async fn test_state_file_persists_between_runs() {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("cluster.json");
    FileStorage::new(&state_file).save(&cluster()).await.unwrap();

    let mut backend = EmulatorBackend::new(Some(state_file.clone()), "admin").await.unwrap();
    let options = DropOptions {
        save_grants: Some(dir.path().join("grants").join("bob.sql")),
        ..Default::default()
    };
    let report = drop_user(&mut backend, "bob", &options, &mut Vec::new())
        .await
        .unwrap();
    assert!(report.saved_grants > 0);

    let reopened = EmulatorBackend::new(Some(state_file), "admin").await.unwrap();
    assert!(reopened.catalog().user("bob").is_none());
    assert!(reopened.catalog().views_installed);

    let grants = tokio::fs::read_to_string(dir.path().join("grants").join("bob.sql"))
        .await
        .unwrap();
    assert!(grants.starts_with("-- Grants held by bob"));
    assert!(grants.contains("GRANT SELECT on sales.orders to bob;"));
}

#[tokio::test]
async fn test_session_user_becomes_new_owner() {
    let mut backend = EmulatorBackend::from_catalog(cluster(), "carol").unwrap();
    assert_eq!(backend.session_user(), "carol");

    let mut out = Vec::new();
    let options = DropOptions {
        dry_run: true,
        ..Default::default()
    };
    let report = drop_user(&mut backend, "bob", &options, &mut out).await.unwrap();
    assert!(report
        .statements
        .contains(&"alter schema scratch owner to carol;".to_string()));
}
