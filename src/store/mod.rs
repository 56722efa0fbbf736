//! Persistence seams. Handlers talk to these traits; `PgStore` backs them with
//! Postgres and `MemoryStore` keeps everything in process for local runs and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Invitation, InvitationWithCreator, NewInvitation, NewUser, Permission, Role, Session, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::UniqueViolation(constraint);
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_firebase_uid(&self, firebase_uid: &str) -> StoreResult<Option<User>>;

    async fn create_user(&self, user: &NewUser) -> StoreResult<User>;

    /// Links an external identity to an existing account and refreshes its display name.
    async fn attach_firebase_uid(
        &self,
        user_id: i64,
        firebase_uid: &str,
        name: &str,
    ) -> StoreResult<User>;

    async fn update_user_profile(&self, user_id: i64, name: &str, email: &str)
        -> StoreResult<User>;

    async fn delete_user(&self, user_id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_role_by_slug(&self, slug: &str) -> StoreResult<Option<Role>>;

    async fn roles_for_user(&self, user_id: i64) -> StoreResult<Vec<Role>>;

    async fn user_has_role(&self, user_id: i64, slug: &str) -> StoreResult<bool>;

    async fn user_has_permission(&self, user_id: i64, slug: &str) -> StoreResult<bool>;

    /// Returns false when the user already had the role.
    async fn attach_role(&self, user_id: i64, role_id: i64) -> StoreResult<bool>;

    async fn upsert_role(&self, name: &str, slug: &str) -> StoreResult<Role>;

    async fn upsert_permission(&self, name: &str, slug: &str) -> StoreResult<Permission>;

    async fn grant_permission(&self, role_id: i64, permission_id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn invitation_code_exists(&self, code: &str) -> StoreResult<bool>;

    async fn insert_invitation(&self, invitation: &NewInvitation) -> StoreResult<Invitation>;

    /// Newest first. Returns the page and the total row count.
    async fn list_invitations(
        &self,
        page: i64,
        per_page: i64,
    ) -> StoreResult<(Vec<InvitationWithCreator>, i64)>;

    async fn find_invitation(&self, invitation_id: i64) -> StoreResult<Option<Invitation>>;

    async fn find_invitation_by_code(&self, code: &str) -> StoreResult<Option<Invitation>>;

    async fn delete_invitation(&self, invitation_id: i64) -> StoreResult<bool>;

    /// Atomically marks the invitation used, creates the user and grants the role.
    /// Returns `None` when the invitation was already consumed.
    async fn register_invited_user(
        &self,
        user: &NewUser,
        invitation_id: i64,
        role_id: i64,
    ) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, user_id: i64, expires_at: DateTime<Utc>)
        -> StoreResult<Session>;

    async fn find_session(&self, session_id: Uuid) -> StoreResult<Option<Session>>;

    async fn delete_session(&self, session_id: Uuid) -> StoreResult<()>;
}

pub trait Store: UserStore + RoleStore + InvitationStore + SessionStore {}

impl<T> Store for T where T: UserStore + RoleStore + InvitationStore + SessionStore {}
