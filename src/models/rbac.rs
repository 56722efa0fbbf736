use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};

pub const ADMIN: &str = "admin";
pub const CUSTOMER: &str = "customer";
pub const SERVICE_PROVIDER: &str = "service-provider";

/// Roles an admin may hand out through an invitation.
pub const INVITABLE_ROLES: [&str; 2] = [CUSTOMER, SERVICE_PROVIDER];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<Role> for RoleSummary {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            slug: role.slug,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoleDefinition {
    pub name: &'static str,
    pub slug: &'static str,
    pub permissions: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionDefinition {
    pub name: &'static str,
    pub slug: &'static str,
}

pub fn get_all_permissions() -> Vec<PermissionDefinition> {
    vec![
        PermissionDefinition {
            name: "Manage Users",
            slug: "manage-users",
        },
        PermissionDefinition {
            name: "Manage Roles",
            slug: "manage-roles",
        },
    ]
}

pub fn get_all_roles() -> Vec<RoleDefinition> {
    vec![
        RoleDefinition {
            name: "Admin",
            slug: ADMIN,
            permissions: &["manage-users", "manage-roles"],
        },
        RoleDefinition {
            name: "Customer",
            slug: CUSTOMER,
            permissions: &[],
        },
        RoleDefinition {
            name: "Service Provider",
            slug: SERVICE_PROVIDER,
            permissions: &[],
        },
    ]
}
