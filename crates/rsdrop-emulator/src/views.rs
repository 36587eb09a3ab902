//! Rust evaluation of the two admin views over an emulated catalog

use crate::catalog::*;
use rsdrop_core::types::*;
use rsdrop_parser::{parse_acl_item, AclItem, ParseError};

/// One ACL item on one object, after the view's self-grant and `rdsdb` filters
#[derive(Debug, Clone)]
struct ObjectPrivilege {
    objowner: Option<String>,
    schemaname: Option<String>,
    objname: String,
    objtype: ObjectType,
    acl: AclItem,
    grantseq: i32,
}

impl ObjectPrivilege {
    fn full_name(&self) -> String {
        match (self.objtype, self.schemaname.as_deref()) {
            (ObjectType::DefaultAcl, _) => self.objname.clone(),
            (ObjectType::Function, Some(schema))
                if schema.chars().any(|c| !c.is_ascii_lowercase()) =>
            {
                self.objname.clone()
            }
            (ObjectType::Function, Some(schema)) => {
                format!("{}.{}", quote_ident(schema), self.objname)
            }
            (ObjectType::Function, None) => self.objname.clone(),
            (_, Some(schema)) => format!("{}.{}", quote_ident(schema), quote_ident(&self.objname)),
            (_, None) => quote_ident(&self.objname),
        }
    }

    /// `ALTER DEFAULT PRIVILEGES ...` prefix for default ACL rows
    fn default_privileges_prefix(&self) -> String {
        if self.objtype != ObjectType::DefaultAcl {
            return String::new();
        }
        let schema = self
            .schemaname
            .as_deref()
            .map(|s| format!(" in schema {} ", quote_ident(s)))
            .unwrap_or_else(|| " ".to_string());
        format!(
            "ALTER DEFAULT PRIVILEGES for user {}{}",
            quote_ident(&self.acl.grantor),
            schema
        )
    }
}

fn expand_acl(
    acl: &[String],
    objowner: Option<&str>,
    schemaname: Option<&str>,
    objname: &str,
    objtype: ObjectType,
    out: &mut Vec<ObjectPrivilege>,
) -> Result<(), ParseError> {
    for (i, entry) in acl.iter().enumerate() {
        let item = parse_acl_item(entry)?;
        let self_grant = item.grantee_text == item.grantor_text;
        let internal = item.grantee_text == BOOTSTRAP_USER
            || (item.grantee_text.is_empty() && item.grantor_text == BOOTSTRAP_USER);
        if self_grant || internal {
            continue;
        }

        out.push(ObjectPrivilege {
            objowner: objowner.map(str::to_string),
            schemaname: schemaname.map(|s| s.trim().to_string()),
            objname: objname.to_string(),
            objtype,
            acl: item,
            grantseq: i as i32 + 1,
        });
    }
    Ok(())
}

fn object_privileges(catalog: &Catalog) -> Result<Vec<ObjectPrivilege>, ParseError> {
    let mut privileges = Vec::new();

    for r in &catalog.relations {
        let objtype = match r.kind {
            RelationKind::Table => ObjectType::Table,
            RelationKind::View => ObjectType::View,
        };
        expand_acl(&r.acl, Some(&r.owner), Some(&r.schema), &r.name, objtype, &mut privileges)?;
    }
    for s in &catalog.schemas {
        expand_acl(&s.acl, Some(&s.owner), None, &s.name, ObjectType::Schema, &mut privileges)?;
    }
    for d in &catalog.databases {
        expand_acl(&d.acl, Some(&d.owner), None, &d.name, ObjectType::Database, &mut privileges)?;
    }
    for f in &catalog.functions {
        expand_acl(
            &f.acl,
            Some(&f.owner),
            Some(&f.schema),
            &f.signature(),
            ObjectType::Function,
            &mut privileges,
        )?;
    }
    for l in &catalog.languages {
        expand_acl(&l.acl, None, None, &l.name, ObjectType::Language, &mut privileges)?;
    }
    for d in &catalog.default_acls {
        expand_acl(
            &d.acl,
            Some(&d.user),
            d.schema.as_deref(),
            d.object_type.as_str(),
            ObjectType::DefaultAcl,
            &mut privileges,
        )?;
    }

    Ok(privileges)
}

/// Privilege letters in the order the view expands them, with the keyword
/// used in the GRANT and whether the object type is spelled out
const PRIVILEGE_GRANTS: &[(char, &str, bool)] = &[
    ('a', "INSERT", false),
    ('r', "SELECT", false),
    ('w', "UPDATE", false),
    ('d', "DELETE", false),
    ('R', "RULE", false),
    ('x', "REFERENCES", false),
    ('t', "TRIGGER", false),
    ('U', "USAGE", true),
    ('C', "CREATE", true),
    ('T', "TEMP", true),
];

fn grant_body(p: &ObjectPrivilege) -> String {
    let prefix = p.default_privileges_prefix();
    let full_name = p.full_name();
    let grantee = p.acl.grantee_sql();
    let privileges = p.acl.privilege_text.as_str();
    let terminator = |grant_option: bool| {
        if grant_option {
            " with grant option;"
        } else {
            ";"
        }
    };

    match privileges {
        "arwdRxt" | "a*r*w*d*R*x*t*" => format!(
            "{}GRANT ALL on {} to {}{}",
            prefix,
            full_name,
            grantee,
            terminator(privileges == "a*r*w*d*R*x*t*")
        ),
        "UC" | "U*C*" => format!(
            "{}GRANT ALL on {} {} to {}{}",
            prefix,
            p.objtype,
            full_name,
            grantee,
            terminator(privileges == "U*C*")
        ),
        "CT" => format!("{}GRANT ALL on {} {} to {};", prefix, p.objtype, full_name, grantee),
        _ => {
            let mut ddl = String::new();
            for &(code, keyword, typed) in PRIVILEGE_GRANTS {
                if !p.acl.has(code) {
                    continue;
                }
                let target = if typed {
                    format!("{} {}", p.objtype, full_name)
                } else {
                    full_name.clone()
                };
                ddl.push_str(&format!(
                    "{}GRANT {} on {} to {}{}",
                    prefix,
                    keyword,
                    target,
                    grantee,
                    terminator(p.acl.has_grant_option(code))
                ));
            }
            if p.acl.has('X') {
                let target = if p.objtype == ObjectType::DefaultAcl {
                    full_name.clone()
                } else {
                    format!("{} {}", p.objtype, full_name)
                };
                ddl.push_str(&format!(
                    "{}GRANT EXECUTE on {} to {}{}",
                    prefix,
                    target,
                    grantee,
                    terminator(p.acl.has_grant_option('X'))
                ));
            }
            ddl
        }
    }
}

fn wrap_session(grantor: &str, switch: bool, body: String) -> String {
    if switch {
        format!(
            "SET SESSION AUTHORIZATION {};{}RESET SESSION AUTHORIZATION;",
            quote_ident(grantor),
            body
        )
    } else {
        body
    }
}

fn grant_record(p: &ObjectPrivilege, current_user: &str) -> GrantRevokeRecord {
    let grantor = &p.acl.grantor;
    let switch = grantor != current_user
        && grantor != BOOTSTRAP_USER
        && p.objtype != ObjectType::DefaultAcl;

    GrantRevokeRecord {
        objowner: p.objowner.clone(),
        schemaname: p.schemaname.clone(),
        objname: p.objname.clone(),
        objtype: p.objtype,
        grantor: grantor.clone(),
        grantee: Some(p.acl.grantee_name()),
        ddltype: DdlKind::Grant,
        grantseq: p.grantseq,
        objseq: p.objtype.grant_seq(),
        ddl: wrap_session(grantor, switch, grant_body(p)),
    }
}

fn revoke_record(p: &ObjectPrivilege, current_user: &str) -> GrantRevokeRecord {
    let grantor = &p.acl.grantor;
    // a NULL owner makes the whole condition NULL, i.e. false
    let switch = grantor != current_user
        && grantor != BOOTSTRAP_USER
        && p.objtype != ObjectType::DefaultAcl
        && p.objowner.as_deref().map_or(false, |owner| owner != grantor);

    let body = match p.objtype {
        ObjectType::DefaultAcl => format!(
            "{}REVOKE ALL on {} FROM {};",
            p.default_privileges_prefix(),
            p.full_name(),
            p.acl.grantee_sql()
        ),
        ObjectType::Table | ObjectType::View => {
            format!("REVOKE ALL on {} FROM {};", p.full_name(), p.acl.grantee_sql())
        }
        objtype => format!(
            "REVOKE ALL on {} {} FROM {};",
            objtype,
            p.full_name(),
            p.acl.grantee_sql()
        ),
    };

    GrantRevokeRecord {
        objowner: p.objowner.clone(),
        schemaname: p.schemaname.clone(),
        objname: p.objname.clone(),
        objtype: p.objtype,
        grantor: grantor.clone(),
        grantee: Some(p.acl.grantee_name()),
        ddltype: DdlKind::Revoke,
        grantseq: p.grantseq,
        objseq: p.objtype.revoke_seq(),
        ddl: wrap_session(grantor, switch, body),
    }
}

/// Rows that reset database-wide default ACLs back to their defaults
fn empty_default_acl_records(catalog: &Catalog) -> impl Iterator<Item = GrantRevokeRecord> + '_ {
    catalog
        .default_acls
        .iter()
        .filter(|d| d.schema.is_none())
        .map(|d| {
            let user = quote_ident(&d.user);
            let suffix = match d.object_type {
                DefaultAclObject::Functions => ", PUBLIC;",
                DefaultAclObject::Tables => ";",
            };
            GrantRevokeRecord {
                objowner: None,
                schemaname: None,
                objname: d.object_type.as_str().to_string(),
                objtype: ObjectType::DefaultAcl,
                grantor: d.user.clone(),
                grantee: None,
                ddltype: DdlKind::Revoke,
                grantseq: 5,
                objseq: 5,
                ddl: format!(
                    "ALTER DEFAULT PRIVILEGES for user {} GRANT ALL on {} TO {}{}",
                    user,
                    d.object_type.as_str(),
                    user,
                    suffix
                ),
            }
        })
}

/// Evaluate `admin.v_generate_user_grant_revoke_ddl` as `current_user`
pub fn grant_revoke_records(
    catalog: &Catalog,
    current_user: &str,
) -> Result<Vec<GrantRevokeRecord>, ParseError> {
    let privileges = object_privileges(catalog)?;

    let grants = privileges.iter().map(|p| grant_record(p, current_user));
    let revokes = privileges
        .iter()
        .filter(|p| {
            !(p.objtype == ObjectType::DefaultAcl
                && p.acl.grantee_name() == "PUBLIC"
                && p.objname == "functions")
        })
        .map(|p| revoke_record(p, current_user));

    Ok(grants
        .chain(revokes)
        .chain(empty_default_acl_records(catalog))
        .collect())
}

/// Evaluate `admin.v_find_dropuser_objs`
pub fn ownership_records(catalog: &Catalog) -> Vec<OwnershipRecord> {
    let mut records = Vec::new();
    let mut push = |objtype: OwnedObjectKind, owner: &str, schemaname: Option<String>, objname: String, ddl: String| {
        if let Some(userid) = catalog.user_id(owner) {
            if userid > BOOTSTRAP_USER_ID {
                records.push(OwnershipRecord {
                    objtype,
                    objowner: owner.to_string(),
                    userid,
                    schemaname,
                    objname,
                    ddl: Some(ddl),
                });
            }
        }
    };

    for f in &catalog.functions {
        let signature = f.signature();
        push(
            OwnedObjectKind::Function,
            &f.owner,
            Some(f.schema.clone()),
            signature.clone(),
            format!("alter function {}.{} owner to ", quote_ident(&f.schema), signature),
        );
    }
    for d in &catalog.databases {
        push(
            OwnedObjectKind::Database,
            &d.owner,
            None,
            d.name.clone(),
            format!("alter database {} owner to ", quote_ident(&d.name)),
        );
    }
    for s in &catalog.schemas {
        push(
            OwnedObjectKind::Schema,
            &s.owner,
            None,
            s.name.clone(),
            format!("alter schema {} owner to ", quote_ident(&s.name)),
        );
    }
    for r in catalog
        .relations
        .iter()
        .filter(|r| !r.schema.to_ascii_lowercase().starts_with("pg_temp_"))
    {
        let kind = match r.kind {
            RelationKind::Table => OwnedObjectKind::Table,
            RelationKind::View => OwnedObjectKind::View,
        };
        push(
            kind,
            &r.owner,
            Some(r.schema.clone()),
            r.name.clone(),
            format!(
                "alter table {}.{} owner to ",
                quote_ident(&r.schema),
                quote_ident(&r.name)
            ),
        );
    }
    for l in &catalog.libraries {
        push(
            OwnedObjectKind::Library,
            &l.owner,
            Some(String::new()),
            l.name.clone(),
            format!(
                "{} for Python Library. You should DROP OR REPLACE the Python Library",
                NO_DDL_SENTINEL
            ),
        );
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<User> {
        vec![
            User { name: "rdsdb".to_string(), id: 1, superuser: true },
            User { name: "admin".to_string(), id: 100, superuser: true },
            User { name: "bob".to_string(), id: 101, superuser: false },
            User { name: "carol".to_string(), id: 102, superuser: false },
        ]
    }

    fn table(schema: &str, name: &str, owner: &str, acl: &[&str]) -> Relation {
        Relation {
            schema: schema.to_string(),
            name: name.to_string(),
            kind: RelationKind::Table,
            owner: owner.to_string(),
            acl: acl.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn revokes_for(catalog: &Catalog, grantee: &str) -> Vec<String> {
        grant_revoke_records(catalog, "admin")
            .unwrap()
            .into_iter()
            .filter(|r| r.ddltype == DdlKind::Revoke && r.grantee.as_deref() == Some(grantee))
            .map(|r| r.ddl)
            .collect()
    }

    #[test]
    fn test_table_revoke_has_no_type_keyword() {
        let catalog = Catalog {
            users: users(),
            relations: vec![table("sales", "orders", "admin", &["admin=arwdRxt/admin", "bob=r/admin"])],
            ..Default::default()
        };
        assert_eq!(revokes_for(&catalog, "bob"), vec!["REVOKE ALL on sales.orders FROM bob;"]);
        // the owner's own entry is a self-grant and never listed
        assert!(revokes_for(&catalog, "admin").is_empty());
    }

    #[test]
    fn test_schema_and_database_revokes() {
        let catalog = Catalog {
            users: users(),
            schemas: vec![Schema {
                name: "Finance".to_string(),
                owner: "admin".to_string(),
                acl: vec!["bob=U/admin".to_string()],
            }],
            databases: vec![Database {
                name: "dev".to_string(),
                owner: "admin".to_string(),
                acl: vec!["bob=CT/admin".to_string()],
            }],
            ..Default::default()
        };
        let revokes = revokes_for(&catalog, "bob");
        assert!(revokes.contains(&"REVOKE ALL on schema \"Finance\" FROM bob;".to_string()));
        assert!(revokes.contains(&"REVOKE ALL on database dev FROM bob;".to_string()));
    }

    #[test]
    fn test_third_party_grantor_switches_session() {
        let catalog = Catalog {
            users: users(),
            relations: vec![table("sales", "orders", "admin", &["carol=r*/admin", "bob=r/carol"])],
            ..Default::default()
        };
        assert_eq!(
            revokes_for(&catalog, "bob"),
            vec!["SET SESSION AUTHORIZATION carol;REVOKE ALL on sales.orders FROM bob;RESET SESSION AUTHORIZATION;"]
        );
    }

    #[test]
    fn test_default_acl_revoke() {
        let catalog = Catalog {
            users: users(),
            schemas: vec![Schema {
                name: "sales".to_string(),
                owner: "admin".to_string(),
                acl: vec![],
            }],
            default_acls: vec![DefaultAcl {
                user: "carol".to_string(),
                schema: Some("sales".to_string()),
                object_type: DefaultAclObject::Tables,
                acl: vec!["bob=r/carol".to_string()],
            }],
            ..Default::default()
        };
        assert_eq!(
            revokes_for(&catalog, "bob"),
            vec!["ALTER DEFAULT PRIVILEGES for user carol in schema sales REVOKE ALL on tables FROM bob;"]
        );
    }

    #[test]
    fn test_function_names() {
        let catalog = Catalog {
            users: users(),
            functions: vec![
                Function {
                    schema: "public".to_string(),
                    name: "f_add".to_string(),
                    arg_types: vec!["integer".to_string(), "integer".to_string()],
                    owner: "admin".to_string(),
                    acl: vec!["bob=X/admin".to_string()],
                },
                Function {
                    schema: "etl_util".to_string(),
                    name: "f_clean".to_string(),
                    arg_types: vec!["text".to_string()],
                    owner: "admin".to_string(),
                    acl: vec!["bob=X/admin".to_string()],
                },
            ],
            ..Default::default()
        };
        let revokes = revokes_for(&catalog, "bob");
        assert!(revokes.contains(&"REVOKE ALL on function public.f_add(integer, integer) FROM bob;".to_string()));
        // schema names outside [a-z] are left unqualified
        assert!(revokes.contains(&"REVOKE ALL on function f_clean(text) FROM bob;".to_string()));
    }

    #[test]
    fn test_grant_expansion() {
        let catalog = Catalog {
            users: users(),
            relations: vec![table(
                "sales",
                "orders",
                "admin",
                &["bob=arwdRxt/admin", "carol=r*w/admin", "=r/admin"],
            )],
            ..Default::default()
        };
        let grants: Vec<GrantRevokeRecord> = grant_revoke_records(&catalog, "admin")
            .unwrap()
            .into_iter()
            .filter(|r| r.ddltype == DdlKind::Grant)
            .collect();

        let ddl_for = |grantee: &str| {
            grants
                .iter()
                .find(|r| r.grantee.as_deref() == Some(grantee))
                .map(|r| r.ddl.clone())
                .unwrap()
        };
        assert_eq!(ddl_for("bob"), "GRANT ALL on sales.orders to bob;");
        assert_eq!(
            ddl_for("carol"),
            "GRANT SELECT on sales.orders to carol with grant option;GRANT UPDATE on sales.orders to carol;"
        );
        assert_eq!(ddl_for("PUBLIC"), "GRANT SELECT on sales.orders to PUBLIC;");
    }

    #[test]
    fn test_rdsdb_entries_are_hidden() {
        let catalog = Catalog {
            users: users(),
            languages: vec![Language {
                name: "plpythonu".to_string(),
                acl: vec!["=U/rdsdb".to_string(), "rdsdb=U/admin".to_string(), "bob=U/rdsdb".to_string()],
            }],
            ..Default::default()
        };
        let records = grant_revoke_records(&catalog, "admin").unwrap();
        let revokes: Vec<_> = records.iter().filter(|r| r.ddltype == DdlKind::Revoke).collect();
        assert_eq!(revokes.len(), 1);
        assert_eq!(revokes[0].ddl, "REVOKE ALL on language plpythonu FROM bob;");
        assert_eq!(revokes[0].grantseq, 3);
    }

    #[test]
    fn test_empty_default_acl_rows() {
        let catalog = Catalog {
            users: users(),
            default_acls: vec![DefaultAcl {
                user: "bob".to_string(),
                schema: None,
                object_type: DefaultAclObject::Functions,
                acl: vec![],
            }],
            ..Default::default()
        };
        let records = grant_revoke_records(&catalog, "admin").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].grantee, None);
        assert_eq!(
            records[0].ddl,
            "ALTER DEFAULT PRIVILEGES for user bob GRANT ALL on functions TO bob, PUBLIC;"
        );
    }

    #[test]
    fn test_ownership_records() {
        let catalog = Catalog {
            users: users(),
            relations: vec![
                table("Sales", "Q1 Orders", "bob", &[]),
                table("pg_temp_3", "scratch", "bob", &[]),
                table("sales", "orders", "rdsdb", &[]),
            ],
            libraries: vec![Library {
                name: "numpy_extras".to_string(),
                owner: "bob".to_string(),
            }],
            ..Default::default()
        };
        let records = ownership_records(&catalog);

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].ddl.as_deref(),
            Some("alter table \"Sales\".\"Q1 Orders\" owner to ")
        );
        assert_eq!(records[1].objtype, OwnedObjectKind::Library);
        assert!(records[1].has_no_ddl());
    }
}
