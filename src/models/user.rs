use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};

use super::rbac::RoleSummary;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub firebase_uid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub firebase_uid: Option<String>,
}

/// Public shape of a user, with the role list the front-end needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub firebase_uid: Option<String>,
    pub roles: Vec<RoleSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn new(user: User, roles: Vec<RoleSummary>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            firebase_uid: user.firebase_uid,
            roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Display name fallback when neither the request nor the identity token carries one.
pub fn name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_falls_back_to_local_part() {
        assert_eq!(name_from_email("jane.doe@example.com"), "jane.doe");
        assert_eq!(name_from_email("no-at-sign"), "no-at-sign");
    }
}
