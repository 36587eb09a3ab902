//! Redshift ACL and statement parser
//!
//! Parses the `grantee=privileges/grantor` items stored in catalog ACL arrays
//! and the small set of statements rsdrop plans: session authorization,
//! `REVOKE ALL`, default-privilege revokes, ownership transfers and
//! `DROP USER`.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct RedshiftParser;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid ACL item '{input}': {message}")]
    Acl { input: String, message: String },
    #[error("invalid statement '{input}': {message}")]
    Statement { input: String, message: String },
}

/// Recipient of a privilege
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Grantee {
    Public,
    User(String),
    Group(String),
}

impl Grantee {
    /// Whether this grantee names `user`
    pub fn is_user(&self, user: &str) -> bool {
        matches!(self, Grantee::User(name) if name == user)
    }
}

/// A single privilege letter, e.g. `r` for SELECT, with its grant option flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Privilege {
    pub code: char,
    pub grant_option: bool,
}

/// One parsed ACL item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclItem {
    pub grantee: Grantee,
    pub privileges: Vec<Privilege>,
    /// Grantor with quotes removed
    pub grantor: String,
    /// Text left of `=`, trimmed, quotes kept; empty for PUBLIC
    pub grantee_text: String,
    /// Text between `=` and `/`
    pub privilege_text: String,
    /// Text right of `/`, quotes kept
    pub grantor_text: String,
}

impl AclItem {
    /// Grantee as the catalog view reports it: quotes stripped, `PUBLIC` for
    /// the empty grantee
    pub fn grantee_name(&self) -> String {
        if self.grantee_text.is_empty() {
            "PUBLIC".to_string()
        } else {
            self.grantee_text.replace('"', "")
        }
    }

    /// Grantee as it must appear in generated DDL
    pub fn grantee_sql(&self) -> String {
        if self.grantee_text.is_empty() {
            "PUBLIC".to_string()
        } else {
            self.grantee_text.clone()
        }
    }

    pub fn has(&self, code: char) -> bool {
        self.privileges.iter().any(|p| p.code == code)
    }

    pub fn has_grant_option(&self, code: char) -> bool {
        self.privileges.iter().any(|p| p.code == code && p.grant_option)
    }
}

/// Parse one ACL item such as `bob=arw/admin` or `group etl=r*/admin`
pub fn parse_acl_item(input: &str) -> Result<AclItem, ParseError> {
    let trimmed = input.trim();
    let acl_error = |message: String| ParseError::Acl {
        input: trimmed.to_string(),
        message,
    };

    let item = RedshiftParser::parse(Rule::acl_item, trimmed)
        .map_err(|e| acl_error(e.to_string()))?
        .next()
        .ok_or_else(|| acl_error("empty input".to_string()))?;

    let mut grantee = Grantee::Public;
    let mut grantee_text = String::new();
    let mut privilege_text = String::new();
    let mut grantor_text = String::new();

    for pair in item.into_inner() {
        match pair.as_rule() {
            Rule::acl_grantee => {
                grantee_text = pair.as_str().trim().to_string();
                let mut is_group = false;
                let mut name = String::new();
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::acl_group => is_group = true,
                        Rule::acl_name => name = unquote(inner.as_str().trim()),
                        _ => {}
                    }
                }
                grantee = if is_group {
                    Grantee::Group(name)
                } else {
                    Grantee::User(name)
                };
            }
            Rule::acl_privileges => privilege_text = pair.as_str().to_string(),
            Rule::acl_grantor => grantor_text = pair.as_str().trim().to_string(),
            _ => {}
        }
    }

    Ok(AclItem {
        grantee,
        privileges: parse_privileges(&privilege_text),
        grantor: grantor_text.replace('"', ""),
        grantee_text,
        privilege_text,
        grantor_text,
    })
}

fn parse_privileges(text: &str) -> Vec<Privilege> {
    let mut privileges: Vec<Privilege> = Vec::new();
    for c in text.chars() {
        if c == '*' {
            if let Some(last) = privileges.last_mut() {
                last.grant_option = true;
            }
        } else {
            privileges.push(Privilege {
                code: c,
                grant_option: false,
            });
        }
    }
    privileges
}

/// A possibly qualified object name, e.g. `"Sales".orders` or `public.f(integer)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    /// Dotted parts with quotes removed
    pub parts: Vec<String>,
    /// Text between the parentheses of a function signature
    pub args: Option<String>,
    /// The name exactly as written
    pub text: String,
}

impl ObjectName {
    /// Last dotted part
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Qualifier, if the name had one
    pub fn schema(&self) -> Option<&str> {
        if self.parts.len() > 1 {
            self.parts.get(self.parts.len() - 2).map(String::as_str)
        } else {
            None
        }
    }

    /// Argument types of a function signature, whitespace-normalized
    pub fn arg_types(&self) -> Vec<String> {
        split_arg_types(self.args.as_deref().unwrap_or_default())
    }
}

/// Split a function argument list the way `regprocedureout` renders it
pub fn split_arg_types(args: &str) -> Vec<String> {
    args.split(',')
        .map(|a| a.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|a| !a.is_empty())
        .collect()
}

/// Object keyword in `REVOKE ALL on <kind> ...`; absent for tables and views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeKind {
    Schema,
    Database,
    Function,
    Language,
}

/// Object keyword in `ALTER <kind> ... owner to`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Function,
    Database,
    Schema,
    /// Tables and views
    Table,
}

/// `ALTER DEFAULT PRIVILEGES for user <u> [in schema <s>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPrivilegesScope {
    pub for_user: String,
    pub schema: Option<String>,
}

/// A statement rsdrop knows how to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogStatement {
    SetSessionAuthorization {
        user: String,
    },
    ResetSessionAuthorization,
    RevokeAll {
        default_privileges: Option<DefaultPrivilegesScope>,
        kind: Option<RevokeKind>,
        object: ObjectName,
        grantee: Grantee,
    },
    AlterOwner {
        kind: OwnerKind,
        object: ObjectName,
        new_owner: String,
    },
    DropUser {
        name: String,
    },
}

/// Parse a `;`-separated script into its statements
pub fn parse_script(sql: &str) -> Result<Vec<CatalogStatement>, ParseError> {
    let statement_error = |message: String| ParseError::Statement {
        input: sql.to_string(),
        message,
    };

    let script = RedshiftParser::parse(Rule::script, sql)
        .map_err(|e| statement_error(e.to_string()))?
        .next()
        .ok_or_else(|| statement_error("empty input".to_string()))?;

    let mut statements = Vec::new();
    for pair in script.into_inner() {
        match pair.as_rule() {
            Rule::EOI => {}
            _ => statements.push(parse_statement(pair).map_err(statement_error)?),
        }
    }
    Ok(statements)
}

fn parse_statement(pair: Pair<Rule>) -> Result<CatalogStatement, String> {
    match pair.as_rule() {
        Rule::set_session => Ok(CatalogStatement::SetSessionAuthorization {
            user: first_identifier(pair)?,
        }),
        Rule::reset_session => Ok(CatalogStatement::ResetSessionAuthorization),
        Rule::drop_user => Ok(CatalogStatement::DropUser {
            name: first_identifier(pair)?,
        }),
        Rule::revoke_all => parse_revoke(pair),
        Rule::alter_owner => parse_alter_owner(pair),
        other => Err(format!("unexpected rule {:?}", other)),
    }
}

fn parse_revoke(pair: Pair<Rule>) -> Result<CatalogStatement, String> {
    let mut default_privileges = None;
    let mut kind = None;
    let mut object = None;
    let mut grantee = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::default_privileges => {
                let mut for_user = String::new();
                let mut schema = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::identifier => for_user = fold_ident(part.as_str()),
                        Rule::in_schema => schema = Some(first_identifier(part)?),
                        _ => {}
                    }
                }
                default_privileges = Some(DefaultPrivilegesScope { for_user, schema });
            }
            Rule::object_kind => {
                kind = Some(match inner.as_str().to_lowercase().as_str() {
                    "schema" => RevokeKind::Schema,
                    "database" => RevokeKind::Database,
                    "function" => RevokeKind::Function,
                    "language" => RevokeKind::Language,
                    other => return Err(format!("unknown object kind {}", other)),
                })
            }
            Rule::object_name => object = Some(parse_object_name(inner)),
            Rule::grantee => grantee = Some(parse_grantee(inner)?),
            _ => {}
        }
    }

    Ok(CatalogStatement::RevokeAll {
        default_privileges,
        kind,
        object: object.ok_or("missing object")?,
        grantee: grantee.ok_or("missing grantee")?,
    })
}

fn parse_alter_owner(pair: Pair<Rule>) -> Result<CatalogStatement, String> {
    let mut kind = None;
    let mut object = None;
    let mut new_owner = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::owner_kind => {
                kind = Some(match inner.as_str().to_lowercase().as_str() {
                    "function" => OwnerKind::Function,
                    "database" => OwnerKind::Database,
                    "schema" => OwnerKind::Schema,
                    "table" => OwnerKind::Table,
                    other => return Err(format!("unknown object kind {}", other)),
                })
            }
            Rule::object_name => object = Some(parse_object_name(inner)),
            Rule::identifier => new_owner = Some(fold_ident(inner.as_str())),
            _ => {}
        }
    }

    Ok(CatalogStatement::AlterOwner {
        kind: kind.ok_or("missing object kind")?,
        object: object.ok_or("missing object")?,
        new_owner: new_owner.ok_or("missing new owner")?,
    })
}

fn parse_object_name(pair: Pair<Rule>) -> ObjectName {
    let text = pair.as_str().to_string();
    let mut parts = Vec::new();
    let mut args = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name_part => parts.push(fold_ident(inner.as_str())),
            Rule::arg_list => {
                let list = inner.as_str();
                args = Some(list[1..list.len() - 1].trim().to_string());
            }
            _ => {}
        }
    }

    ObjectName { parts, args, text }
}

fn parse_grantee(pair: Pair<Rule>) -> Result<Grantee, String> {
    let inner = pair.into_inner().next().ok_or("missing grantee")?;
    match inner.as_rule() {
        Rule::group_grantee => Ok(Grantee::Group(first_identifier(inner)?)),
        Rule::identifier => {
            let text = inner.as_str();
            if text.eq_ignore_ascii_case("public") {
                Ok(Grantee::Public)
            } else {
                Ok(Grantee::User(fold_ident(text)))
            }
        }
        other => Err(format!("unexpected grantee {:?}", other)),
    }
}

fn first_identifier(pair: Pair<Rule>) -> Result<String, String> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::identifier)
        .map(|p| fold_ident(p.as_str()))
        .ok_or_else(|| "missing identifier".to_string())
}

/// Resolve an identifier as the server does: quoted names are kept as
/// written, bare names fold to lower case
pub fn fold_ident(ident: &str) -> String {
    if ident.starts_with('"') {
        unquote(ident)
    } else {
        ident.to_lowercase()
    }
}

/// Strip surrounding double quotes and undouble embedded ones
pub fn unquote(ident: &str) -> String {
    if ident.len() >= 2 && ident.starts_with('"') && ident.ends_with('"') {
        ident[1..ident.len() - 1].replace("\"\"", "\"")
    } else {
        ident.to_string()
    }
}
