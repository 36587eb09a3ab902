//! Applying executed statements to the emulated catalog

use crate::catalog::*;
use rsdrop_parser::{
    parse_acl_item, split_arg_types, CatalogStatement, DefaultPrivilegesScope, Grantee,
    ObjectName, OwnerKind, ParseError, RevokeKind,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("relation \"{0}\" does not exist")]
    ViewsNotInstalled(String),
    #[error("user \"{0}\" does not exist")]
    UnknownUser(String),
    #[error("{kind} {name} does not exist")]
    UnknownObject { kind: String, name: String },
    #[error("user \"{user}\" cannot be dropped because the user owns some object ({count} owned)")]
    UserOwnsObjects { user: String, count: usize },
    #[error("user \"{0}\" cannot be dropped because the user has a privilege on some object")]
    UserHasPrivileges(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Session state carried between executed statements
#[derive(Debug, Clone)]
pub struct Session {
    pub connected_as: String,
    pub authorization: Option<String>,
}

impl Session {
    pub fn new(connected_as: impl Into<String>) -> Self {
        Self {
            connected_as: connected_as.into(),
            authorization: None,
        }
    }
}

/// Apply one parsed statement.
///
/// Without `SET SESSION AUTHORIZATION` the session acts as a superuser and a
/// revoke removes every entry for the grantee; with it, only entries granted
/// by the authorized user are removed.
pub fn apply_statement(
    catalog: &mut Catalog,
    session: &mut Session,
    statement: &CatalogStatement,
) -> Result<(), CatalogError> {
    debug!(?statement, "applying");
    match statement {
        CatalogStatement::SetSessionAuthorization { user } => {
            require_user(catalog, user)?;
            session.authorization = Some(user.clone());
            Ok(())
        }
        CatalogStatement::ResetSessionAuthorization => {
            session.authorization = None;
            Ok(())
        }
        CatalogStatement::RevokeAll {
            default_privileges: Some(scope),
            object,
            grantee,
            ..
        } => {
            let acl = default_acl_mut(catalog, scope, object)?;
            revoke_from(acl, grantee, session.authorization.as_deref())
        }
        CatalogStatement::RevokeAll {
            default_privileges: None,
            kind,
            object,
            grantee,
        } => {
            let acl = object_acl_mut(catalog, *kind, object)?;
            revoke_from(acl, grantee, session.authorization.as_deref())
        }
        CatalogStatement::AlterOwner {
            kind,
            object,
            new_owner,
        } => {
            require_user(catalog, new_owner)?;
            let (owner, acl) = owned_object_mut(catalog, *kind, object)?;
            let old_owner = std::mem::replace(owner, new_owner.clone());
            reassign_acl(acl, &old_owner, new_owner)
        }
        CatalogStatement::DropUser { name } => drop_user(catalog, name),
    }
}

fn require_user(catalog: &Catalog, name: &str) -> Result<(), CatalogError> {
    catalog
        .user(name)
        .map(|_| ())
        .ok_or_else(|| CatalogError::UnknownUser(name.to_string()))
}

fn unknown(kind: &str, object: &ObjectName) -> CatalogError {
    CatalogError::UnknownObject {
        kind: kind.to_string(),
        name: object.text.clone(),
    }
}

fn function_matches(f: &Function, object: &ObjectName) -> bool {
    f.name == object.name()
        && object.schema().map_or(true, |s| s == f.schema)
        && split_arg_types(&f.arg_types.join(",")) == object.arg_types()
}

fn relation_matches(r: &Relation, object: &ObjectName) -> bool {
    r.name == object.name() && object.schema().map_or(true, |s| s == r.schema)
}

fn object_acl_mut<'a>(
    catalog: &'a mut Catalog,
    kind: Option<RevokeKind>,
    object: &ObjectName,
) -> Result<&'a mut Vec<String>, CatalogError> {
    let name = object.name();
    let acl = match kind {
        None => catalog
            .relations
            .iter_mut()
            .find(|r| relation_matches(r, object))
            .map(|r| &mut r.acl),
        Some(RevokeKind::Schema) => catalog
            .schemas
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| &mut s.acl),
        Some(RevokeKind::Database) => catalog
            .databases
            .iter_mut()
            .find(|d| d.name == name)
            .map(|d| &mut d.acl),
        Some(RevokeKind::Language) => catalog
            .languages
            .iter_mut()
            .find(|l| l.name == name)
            .map(|l| &mut l.acl),
        Some(RevokeKind::Function) => catalog
            .functions
            .iter_mut()
            .find(|f| function_matches(f, object))
            .map(|f| &mut f.acl),
    };

    let label = match kind {
        None => "relation",
        Some(RevokeKind::Schema) => "schema",
        Some(RevokeKind::Database) => "database",
        Some(RevokeKind::Language) => "language",
        Some(RevokeKind::Function) => "function",
    };
    acl.ok_or_else(|| unknown(label, object))
}

fn default_acl_mut<'a>(
    catalog: &'a mut Catalog,
    scope: &DefaultPrivilegesScope,
    object: &ObjectName,
) -> Result<&'a mut Vec<String>, CatalogError> {
    let object_type =
        DefaultAclObject::from_name(object.name()).ok_or_else(|| unknown("default acl", object))?;

    catalog
        .default_acls
        .iter_mut()
        .find(|d| {
            d.user == scope.for_user && d.schema == scope.schema && d.object_type == object_type
        })
        .map(|d| &mut d.acl)
        .ok_or_else(|| unknown("default acl", object))
}

fn owned_object_mut<'a>(
    catalog: &'a mut Catalog,
    kind: OwnerKind,
    object: &ObjectName,
) -> Result<(&'a mut String, &'a mut Vec<String>), CatalogError> {
    let name = object.name();
    let found = match kind {
        OwnerKind::Table => catalog
            .relations
            .iter_mut()
            .find(|r| relation_matches(r, object))
            .map(|r| (&mut r.owner, &mut r.acl)),
        OwnerKind::Schema => catalog
            .schemas
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| (&mut s.owner, &mut s.acl)),
        OwnerKind::Database => catalog
            .databases
            .iter_mut()
            .find(|d| d.name == name)
            .map(|d| (&mut d.owner, &mut d.acl)),
        OwnerKind::Function => catalog
            .functions
            .iter_mut()
            .find(|f| function_matches(f, object))
            .map(|f| (&mut f.owner, &mut f.acl)),
    };

    let label = match kind {
        OwnerKind::Table => "relation",
        OwnerKind::Schema => "schema",
        OwnerKind::Database => "database",
        OwnerKind::Function => "function",
    };
    found.ok_or_else(|| unknown(label, object))
}

fn revoke_from(
    acl: &mut Vec<String>,
    grantee: &Grantee,
    authorization: Option<&str>,
) -> Result<(), CatalogError> {
    let mut kept = Vec::with_capacity(acl.len());
    for entry in acl.iter() {
        let item = parse_acl_item(entry)?;
        let granted_by_session = authorization.map_or(true, |user| item.grantor == user);
        if !(item.grantee == *grantee && granted_by_session) {
            kept.push(entry.clone());
        }
    }
    *acl = kept;
    Ok(())
}

/// Rewrite ACL entries so the new owner takes the old owner's place
fn reassign_acl(acl: &mut [String], old_owner: &str, new_owner: &str) -> Result<(), CatalogError> {
    for entry in acl.iter_mut() {
        let item = parse_acl_item(entry)?;
        let grantee = match &item.grantee {
            Grantee::User(name) if name == old_owner => quote_ident(new_owner),
            _ => item.grantee_text.clone(),
        };
        let grantor = if item.grantor == old_owner {
            quote_ident(new_owner)
        } else {
            item.grantor_text.clone()
        };
        *entry = format!("{}={}/{}", grantee, item.privilege_text, grantor);
    }
    Ok(())
}

fn references_user(acl: &[String], user: &str) -> Result<bool, CatalogError> {
    for entry in acl {
        let item = parse_acl_item(entry)?;
        if item.grantee.is_user(user) || item.grantor == user {
            return Ok(true);
        }
    }
    Ok(false)
}

fn drop_user(catalog: &mut Catalog, name: &str) -> Result<(), CatalogError> {
    require_user(catalog, name)?;

    let owned = catalog.owned_count(name);
    if owned > 0 {
        return Err(CatalogError::UserOwnsObjects {
            user: name.to_string(),
            count: owned,
        });
    }
    for acl in catalog.acls() {
        if references_user(acl, name)? {
            return Err(CatalogError::UserHasPrivileges(name.to_string()));
        }
    }

    catalog.users.retain(|u| u.name != name);
    catalog.default_acls.retain(|d| d.user != name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsdrop_parser::parse_script;

    fn catalog() -> Catalog {
        Catalog {
            users: vec![
                User { name: "admin".to_string(), id: 100, superuser: true },
                User { name: "bob".to_string(), id: 101, superuser: false },
                User { name: "carol".to_string(), id: 102, superuser: false },
            ],
            relations: vec![Relation {
                schema: "sales".to_string(),
                name: "orders".to_string(),
                kind: RelationKind::Table,
                owner: "admin".to_string(),
                acl: vec![
                    "admin=arwdRxt/admin".to_string(),
                    "bob=r/admin".to_string(),
                    "bob=w/carol".to_string(),
                ],
            }],
            schemas: vec![Schema {
                name: "scratch".to_string(),
                owner: "bob".to_string(),
                acl: vec!["bob=UC/bob".to_string(), "carol=U/bob".to_string()],
            }],
            ..Default::default()
        }
    }

    fn run(catalog: &mut Catalog, session: &mut Session, sql: &str) -> Result<(), CatalogError> {
        for statement in parse_script(sql)? {
            apply_statement(catalog, session, &statement)?;
        }
        Ok(())
    }

    #[test]
    fn test_revoke_as_superuser_removes_every_entry() {
        let mut catalog = catalog();
        let mut session = Session::new("admin");
        run(&mut catalog, &mut session, "REVOKE ALL on sales.orders FROM bob;").unwrap();
        assert_eq!(catalog.relations[0].acl, vec!["admin=arwdRxt/admin"]);
    }

    #[test]
    fn test_revoke_under_session_authorization() {
        let mut catalog = catalog();
        let mut session = Session::new("admin");
        run(
            &mut catalog,
            &mut session,
            "SET SESSION AUTHORIZATION carol;REVOKE ALL on sales.orders FROM bob;RESET SESSION AUTHORIZATION;",
        )
        .unwrap();

        assert_eq!(catalog.relations[0].acl, vec!["admin=arwdRxt/admin", "bob=r/admin"]);
        assert!(session.authorization.is_none());
    }

    #[test]
    fn test_alter_owner_rewrites_acl() {
        let mut catalog = catalog();
        let mut session = Session::new("admin");
        run(&mut catalog, &mut session, "alter schema scratch owner to admin;").unwrap();

        assert_eq!(catalog.schemas[0].owner, "admin");
        assert_eq!(catalog.schemas[0].acl, vec!["admin=UC/admin", "carol=U/admin"]);
    }

    #[test]
    fn test_alter_owner_to_unknown_user() {
        let mut catalog = catalog();
        let mut session = Session::new("admin");
        let err = run(&mut catalog, &mut session, "alter schema scratch owner to mallory;").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownUser(name) if name == "mallory"));
    }

    #[test]
    fn test_unknown_object() {
        let mut catalog = catalog();
        let mut session = Session::new("admin");
        let err = run(&mut catalog, &mut session, "REVOKE ALL on sales.returns FROM bob;").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownObject { .. }));
    }

    #[test]
    fn test_drop_user_blocked_by_ownership_then_privileges() {
        let mut catalog = catalog();
        let mut session = Session::new("admin");

        let err = run(&mut catalog, &mut session, "DROP USER bob;").unwrap_err();
        assert!(matches!(err, CatalogError::UserOwnsObjects { count: 1, .. }));

        run(&mut catalog, &mut session, "alter schema scratch owner to admin;").unwrap();
        let err = run(&mut catalog, &mut session, "DROP USER bob;").unwrap_err();
        assert!(matches!(err, CatalogError::UserHasPrivileges(_)));

        run(&mut catalog, &mut session, "REVOKE ALL on sales.orders FROM bob;").unwrap();
        run(&mut catalog, &mut session, "DROP USER bob;").unwrap();
        assert!(catalog.user("bob").is_none());
    }
}
