use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Visibility of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "access_policy", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    /// Any authenticated actor.
    Public,
    /// Only the owning client or employee.
    Private,
    /// Elevated roles only.
    Restricted,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        AccessPolicy::Private
    }
}

impl Display for AccessPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AccessPolicy::Public => write!(f, "public"),
            AccessPolicy::Private => write!(f, "private"),
            AccessPolicy::Restricted => write!(f, "restricted"),
        }
    }
}

/// User role, mirroring the role claims issued by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Sales,
    Employee,
}

impl Role {
    /// Administrator-tier roles: may review, delete and read restricted documents.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Manager => write!(f, "manager"),
            Role::Sales => write!(f, "sales"),
            Role::Employee => write!(f, "employee"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "sales" => Ok(Role::Sales),
            "employee" => Ok(Role::Employee),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Authenticated identity handed to the core by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub actor_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(actor_id: i64, role: Role) -> Self {
        Self { actor_id, role }
    }

    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }
}
