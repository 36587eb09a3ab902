//! Core data types for catalog-derived grant and ownership records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker text the ownership view emits for objects without an ownership DDL
pub const NO_DDL_SENTINEL: &str = "No DDL available";

/// Kind of object a grant/revoke record refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Table,
    View,
    Schema,
    Database,
    Function,
    Language,
    /// Default privileges (`pg_default_acl`)
    DefaultAcl,
}

impl ObjectType {
    /// Name as it appears in the `objtype` column and in generated DDL
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Table => "table",
            ObjectType::View => "view",
            ObjectType::Schema => "schema",
            ObjectType::Database => "database",
            ObjectType::Function => "function",
            ObjectType::Language => "language",
            ObjectType::DefaultAcl => "default acl",
        }
    }

    /// Ordering key used by the view for grant rows
    pub fn grant_seq(&self) -> i32 {
        match self {
            ObjectType::Database => 0,
            ObjectType::Schema | ObjectType::Language => 1,
            ObjectType::Table | ObjectType::View | ObjectType::Function => 2,
            ObjectType::DefaultAcl => 3,
        }
    }

    /// Ordering key used by the view for revoke rows
    pub fn revoke_seq(&self) -> i32 {
        match self {
            ObjectType::DefaultAcl => 0,
            ObjectType::Function | ObjectType::Table | ObjectType::View => 1,
            ObjectType::Schema | ObjectType::Language => 2,
            ObjectType::Database => 3,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(ObjectType::Table),
            "view" => Ok(ObjectType::View),
            "schema" => Ok(ObjectType::Schema),
            "database" => Ok(ObjectType::Database),
            "function" => Ok(ObjectType::Function),
            "language" => Ok(ObjectType::Language),
            "default acl" => Ok(ObjectType::DefaultAcl),
            other => Err(anyhow::anyhow!("Unknown object type: {}", other)),
        }
    }
}

/// Whether a record restores (`grant`) or removes (`revoke`) a privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DdlKind {
    Grant,
    Revoke,
}

impl DdlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DdlKind::Grant => "grant",
            DdlKind::Revoke => "revoke",
        }
    }
}

impl fmt::Display for DdlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DdlKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grant" => Ok(DdlKind::Grant),
            "revoke" => Ok(DdlKind::Revoke),
            other => Err(anyhow::anyhow!("Unknown ddl type: {}", other)),
        }
    }
}

/// One row of `admin.v_generate_user_grant_revoke_ddl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRevokeRecord {
    pub objowner: Option<String>,
    pub schemaname: Option<String>,
    pub objname: String,
    pub objtype: ObjectType,
    pub grantor: String,
    /// `None` only for the synthetic rows that reset empty default ACLs
    pub grantee: Option<String>,
    pub ddltype: DdlKind,
    pub grantseq: i32,
    pub objseq: i32,
    pub ddl: String,
}

/// Kind of object reported by the ownership view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnedObjectKind {
    Function,
    Database,
    Schema,
    Table,
    View,
    /// Python UDF library; has no `ALTER ... OWNER TO`
    Library,
}

impl OwnedObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnedObjectKind::Function => "Function",
            OwnedObjectKind::Database => "Database",
            OwnedObjectKind::Schema => "Schema",
            OwnedObjectKind::Table => "Table",
            OwnedObjectKind::View => "View",
            OwnedObjectKind::Library => "Library",
        }
    }
}

impl fmt::Display for OwnedObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnedObjectKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Function" => Ok(OwnedObjectKind::Function),
            "Database" => Ok(OwnedObjectKind::Database),
            "Schema" => Ok(OwnedObjectKind::Schema),
            "Table" => Ok(OwnedObjectKind::Table),
            "View" => Ok(OwnedObjectKind::View),
            "Library" => Ok(OwnedObjectKind::Library),
            other => Err(anyhow::anyhow!("Unknown owned object type: {}", other)),
        }
    }
}

/// One row of `admin.v_find_dropuser_objs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub objtype: OwnedObjectKind,
    pub objowner: String,
    pub userid: i32,
    pub schemaname: Option<String>,
    pub objname: String,
    /// Statement template ending in `owner to `, or the no-DDL sentinel
    pub ddl: Option<String>,
}

/// What to do with an ownership record once the new owner is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipTransfer {
    /// Executable statement
    Statement(String),
    /// Object cannot be reassigned; carries the message to show the operator
    Unsupported(String),
    /// Template was empty or NULL
    Empty,
}

impl OwnershipRecord {
    /// Returns true if the view flagged this row as having no valid DDL
    pub fn has_no_ddl(&self) -> bool {
        self.objtype == OwnedObjectKind::Library
            || self
                .ddl
                .as_deref()
                .map_or(false, |ddl| ddl.contains(NO_DDL_SENTINEL))
    }

    /// Complete the DDL template with the new owner
    pub fn transfer_to(&self, new_owner: &str) -> OwnershipTransfer {
        if self.has_no_ddl() {
            let message = match self.ddl.as_deref() {
                Some(ddl) if !ddl.trim().is_empty() => ddl.to_string(),
                _ => format!(
                    "{} for {} {}. You should DROP OR REPLACE it",
                    NO_DDL_SENTINEL, self.objtype, self.objname
                ),
            };
            return OwnershipTransfer::Unsupported(message);
        }

        match self.ddl.as_deref() {
            Some(template) if !template.trim().is_empty() => {
                OwnershipTransfer::Statement(format!("{} {};", template.trim_end(), new_owner))
            }
            _ => OwnershipTransfer::Empty,
        }
    }
}
