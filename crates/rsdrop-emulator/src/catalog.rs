//! In-memory model of the Redshift system catalogs rsdrop reads

use serde::{Deserialize, Serialize};

/// Id of the bootstrap superuser; the ownership view skips it
pub const BOOTSTRAP_USER_ID: i32 = 1;
pub const BOOTSTRAP_USER: &str = "rdsdb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub id: i32,
    #[serde(default)]
    pub superuser: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub acl: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub acl: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Table,
    View,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub schema: String,
    pub name: String,
    pub kind: RelationKind,
    pub owner: String,
    #[serde(default)]
    pub acl: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub arg_types: Vec<String>,
    pub owner: String,
    #[serde(default)]
    pub acl: Vec<String>,
}

impl Function {
    /// Signature as `regprocedureout` prints it, e.g. `f_add(integer, integer)`
    pub fn signature(&self) -> String {
        format!("{}({})", quote_ident(&self.name), self.arg_types.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
    #[serde(default)]
    pub acl: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAclObject {
    Tables,
    Functions,
}

impl DefaultAclObject {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultAclObject::Tables => "tables",
            DefaultAclObject::Functions => "functions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tables" => Some(DefaultAclObject::Tables),
            "functions" => Some(DefaultAclObject::Functions),
            _ => None,
        }
    }
}

/// One `pg_default_acl` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAcl {
    /// User whose future objects receive these privileges
    pub user: String,
    /// `None` means the entry applies database-wide
    #[serde(default)]
    pub schema: Option<String>,
    pub object_type: DefaultAclObject,
    #[serde(default)]
    pub acl: Vec<String>,
}

/// Python UDF library (`pg_library`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    pub owner: String,
}

/// The slice of the cluster catalog that grants and ownership depend on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub databases: Vec<Database>,
    #[serde(default)]
    pub schemas: Vec<Schema>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub default_acls: Vec<DefaultAcl>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    /// Set once the admin views have been created
    #[serde(default)]
    pub views_installed: bool,
}

impl Catalog {
    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn user_id(&self, name: &str) -> Option<i32> {
        self.user(name).map(|u| u.id)
    }

    /// Every ACL array in the catalog
    pub fn acls(&self) -> impl Iterator<Item = &Vec<String>> {
        self.databases
            .iter()
            .map(|d| &d.acl)
            .chain(self.schemas.iter().map(|s| &s.acl))
            .chain(self.relations.iter().map(|r| &r.acl))
            .chain(self.functions.iter().map(|f| &f.acl))
            .chain(self.languages.iter().map(|l| &l.acl))
            .chain(self.default_acls.iter().map(|d| &d.acl))
    }

    /// Number of objects `user` owns
    pub fn owned_count(&self, user: &str) -> usize {
        self.databases.iter().filter(|d| d.owner == user).count()
            + self.schemas.iter().filter(|s| s.owner == user).count()
            + self.relations.iter().filter(|r| r.owner == user).count()
            + self.functions.iter().filter(|f| f.owner == user).count()
            + self.libraries.iter().filter(|l| l.owner == user).count()
    }
}

const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "authorization", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "default",
    "deferrable", "desc", "distinct", "do", "else", "end", "except", "false", "for", "foreign",
    "from", "grant", "group", "having", "in", "initially", "intersect", "into", "leading",
    "limit", "new", "not", "null", "off", "offset", "old", "on", "only", "or", "order",
    "primary", "references", "select", "session_user", "some", "table", "then", "to",
    "trailing", "true", "union", "unique", "user", "using", "when", "where", "with",
];

/// Quote an identifier the way `QUOTE_IDENT` does
pub fn quote_ident(ident: &str) -> String {
    let mut chars = ident.chars();
    let safe = match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => chars
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
        _ => false,
    };

    if safe && !RESERVED_WORDS.contains(&ident) {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}
