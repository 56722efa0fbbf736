use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{InvitationStore, RoleStore, SessionStore, StoreResult, UserStore};
use crate::{
    database::Database,
    models::{
        invitation::InvitationListRow, Invitation, InvitationWithCreator, NewInvitation, NewUser,
        Permission, Role, Session, User,
    },
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Database,
}

impl PgStore {
    pub fn new(pool: Database) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Database {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_firebase_uid(&self, firebase_uid: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE firebase_uid = $1")
            .bind(firebase_uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, firebase_uid)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.firebase_uid)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn attach_firebase_uid(
        &self,
        user_id: i64,
        firebase_uid: &str,
        name: &str,
    ) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET firebase_uid = $2, name = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(firebase_uid)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user_profile(
        &self,
        user_id: i64,
        name: &str,
        email: &str,
    ) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET name = $2, email = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn find_role_by_slug(&self, slug: &str) -> StoreResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn roles_for_user(&self, user_id: i64) -> StoreResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.* FROM roles r
            JOIN role_user ru ON r.id = ru.role_id
            WHERE ru.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn user_has_role(&self, user_id: i64, slug: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM role_user ru
                JOIN roles r ON r.id = ru.role_id
                WHERE ru.user_id = $1 AND r.slug = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn user_has_permission(&self, user_id: i64, slug: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM role_user ru
                JOIN permission_role pr ON pr.role_id = ru.role_id
                JOIN permissions p ON p.id = pr.permission_id
                WHERE ru.user_id = $1 AND p.slug = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn attach_role(&self, user_id: i64, role_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO role_user (role_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_role(&self, name: &str, slug: &str) -> StoreResult<Role> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, slug) VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(role)
    }

    async fn upsert_permission(&self, name: &str, slug: &str) -> StoreResult<Permission> {
        let permission = sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (name, slug) VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(permission)
    }

    async fn grant_permission(&self, role_id: i64, permission_id: i64) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO permission_role (permission_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(permission_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl InvitationStore for PgStore {
    async fn invitation_code_exists(&self, code: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM invitations WHERE code = $1)",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_invitation(&self, invitation: &NewInvitation) -> StoreResult<Invitation> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (created_by, code, role_slug, redirect_url, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(invitation.created_by)
        .bind(&invitation.code)
        .bind(&invitation.role_slug)
        .bind(&invitation.redirect_url)
        .bind(invitation.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(invitation)
    }

    async fn list_invitations(
        &self,
        page: i64,
        per_page: i64,
    ) -> StoreResult<(Vec<InvitationWithCreator>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invitations")
            .fetch_one(&self.pool)
            .await?;

        let offset = (page.max(1) - 1).saturating_mul(per_page);
        let invitations = sqlx::query_as::<_, InvitationListRow>(
            r#"
            SELECT i.*, u.name AS creator_name, u.email AS creator_email
            FROM invitations i
            LEFT JOIN users u ON u.id = i.created_by
            ORDER BY i.created_at DESC, i.id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(InvitationWithCreator::from)
        .collect();

        Ok((invitations, total))
    }

    async fn find_invitation(&self, invitation_id: i64) -> StoreResult<Option<Invitation>> {
        let invitation = sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invitation)
    }

    async fn find_invitation_by_code(&self, code: &str) -> StoreResult<Option<Invitation>> {
        let invitation =
            sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(invitation)
    }

    async fn delete_invitation(&self, invitation_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn register_invited_user(
        &self,
        user: &NewUser,
        invitation_id: i64,
        role_id: i64,
    ) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE invitations SET is_used = TRUE, updated_at = NOW()
            WHERE id = $1 AND is_used = FALSE
              AND (expires_at IS NULL OR expires_at >= NOW())
            "#,
        )
        .bind(invitation_id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, firebase_uid)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.firebase_uid)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO role_user (role_id, user_id) VALUES ($1, $2)")
            .bind(role_id)
            .bind(created.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(created))
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(
        &self,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        let session = sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_session(&self, session_id: Uuid) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn delete_session(&self, session_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
