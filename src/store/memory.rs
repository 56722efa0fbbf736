use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{InvitationStore, RoleStore, SessionStore, StoreError, StoreResult, UserStore};
use crate::models::{
    invitation::Creator, Invitation, InvitationWithCreator, NewInvitation, NewUser, Permission,
    Role, Session, User,
};

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    role_user: Vec<(i64, i64)>,
    permission_role: Vec<(i64, i64)>,
    invitations: Vec<Invitation>,
    sessions: Vec<Session>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_user(&mut self, user: &NewUser) -> StoreResult<User> {
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        if let Some(uid) = &user.firebase_uid {
            if self.users.iter().any(|u| u.firebase_uid.as_ref() == Some(uid)) {
                return Err(StoreError::UniqueViolation("users_firebase_uid_key".to_string()));
            }
        }

        let now = Utc::now();
        let created = User {
            id: self.next_id(),
            name: user.name.clone(),
            email: user.email.clone(),
            password: user.password_hash.clone(),
            firebase_uid: user.firebase_uid.clone(),
            created_at: now,
            updated_at: now,
        };
        self.users.push(created.clone());
        Ok(created)
    }

    fn user_mut(&mut self, user_id: i64) -> StoreResult<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }
}

/// Process-local store used by `serve --in-memory` and the test suite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_firebase_uid(&self, firebase_uid: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.firebase_uid.as_deref() == Some(firebase_uid))
            .cloned())
    }

    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        self.state.write().await.insert_user(user)
    }

    async fn attach_firebase_uid(
        &self,
        user_id: i64,
        firebase_uid: &str,
        name: &str,
    ) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .iter()
            .any(|u| u.id != user_id && u.firebase_uid.as_deref() == Some(firebase_uid))
        {
            return Err(StoreError::UniqueViolation("users_firebase_uid_key".to_string()));
        }

        let user = state.user_mut(user_id)?;
        user.firebase_uid = Some(firebase_uid.to_string());
        user.name = name.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_user_profile(
        &self,
        user_id: i64,
        name: &str,
        email: &str,
    ) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.id != user_id && u.email == email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }

        let user = state.user_mut(user_id)?;
        user.name = name.to_string();
        user.email = email.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let before = state.users.len();
        state.users.retain(|u| u.id != user_id);
        state.role_user.retain(|(_, uid)| *uid != user_id);
        state.sessions.retain(|s| s.user_id != user_id);
        state.invitations.retain(|i| i.created_by != user_id);
        Ok(state.users.len() < before)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn find_role_by_slug(&self, slug: &str) -> StoreResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.iter().find(|r| r.slug == slug).cloned())
    }

    async fn roles_for_user(&self, user_id: i64) -> StoreResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .roles
            .iter()
            .filter(|r| state.role_user.contains(&(r.id, user_id)))
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn user_has_role(&self, user_id: i64, slug: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .iter()
            .any(|r| r.slug == slug && state.role_user.contains(&(r.id, user_id))))
    }

    async fn user_has_permission(&self, user_id: i64, slug: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        let Some(permission) = state.permissions.iter().find(|p| p.slug == slug) else {
            return Ok(false);
        };
        Ok(state
            .role_user
            .iter()
            .filter(|(_, uid)| *uid == user_id)
            .any(|(role_id, _)| state.permission_role.contains(&(permission.id, *role_id))))
    }

    async fn attach_role(&self, user_id: i64, role_id: i64) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if state.role_user.contains(&(role_id, user_id)) {
            return Ok(false);
        }
        state.role_user.push((role_id, user_id));
        Ok(true)
    }

    async fn upsert_role(&self, name: &str, slug: &str) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        if let Some(role) = state.roles.iter_mut().find(|r| r.slug == slug) {
            role.name = name.to_string();
            role.updated_at = now;
            return Ok(role.clone());
        }

        let role = Role {
            id: state.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn upsert_permission(&self, name: &str, slug: &str) -> StoreResult<Permission> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        if let Some(permission) = state.permissions.iter_mut().find(|p| p.slug == slug) {
            permission.name = name.to_string();
            permission.updated_at = now;
            return Ok(permission.clone());
        }

        let permission = Permission {
            id: state.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.permissions.push(permission.clone());
        Ok(permission)
    }

    async fn grant_permission(&self, role_id: i64, permission_id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.permission_role.contains(&(permission_id, role_id)) {
            state.permission_role.push((permission_id, role_id));
        }
        Ok(())
    }
}

#[async_trait]
impl InvitationStore for MemoryStore {
    async fn invitation_code_exists(&self, code: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.invitations.iter().any(|i| i.code == code))
    }

    async fn insert_invitation(&self, invitation: &NewInvitation) -> StoreResult<Invitation> {
        let mut state = self.state.write().await;
        if state.invitations.iter().any(|i| i.code == invitation.code) {
            return Err(StoreError::UniqueViolation("invitations_code_key".to_string()));
        }

        let now = Utc::now();
        let created = Invitation {
            id: state.next_id(),
            created_by: invitation.created_by,
            code: invitation.code.clone(),
            role_slug: invitation.role_slug.clone(),
            redirect_url: invitation.redirect_url.clone(),
            is_used: false,
            expires_at: invitation.expires_at,
            created_at: now,
            updated_at: now,
        };
        state.invitations.push(created.clone());
        Ok(created)
    }

    async fn list_invitations(
        &self,
        page: i64,
        per_page: i64,
    ) -> StoreResult<(Vec<InvitationWithCreator>, i64)> {
        let state = self.state.read().await;
        let total = state.invitations.len() as i64;

        let mut ordered: Vec<&Invitation> = state.invitations.iter().collect();
        ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from((page.max(1) - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
        let data = ordered
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .map(|invitation| {
                let creator = state
                    .users
                    .iter()
                    .find(|u| u.id == invitation.created_by)
                    .map(|u| Creator {
                        id: u.id,
                        name: u.name.clone(),
                        email: u.email.clone(),
                    });
                InvitationWithCreator {
                    invitation: invitation.clone(),
                    creator,
                }
            })
            .collect();

        Ok((data, total))
    }

    async fn find_invitation(&self, invitation_id: i64) -> StoreResult<Option<Invitation>> {
        let state = self.state.read().await;
        Ok(state.invitations.iter().find(|i| i.id == invitation_id).cloned())
    }

    async fn find_invitation_by_code(&self, code: &str) -> StoreResult<Option<Invitation>> {
        let state = self.state.read().await;
        Ok(state.invitations.iter().find(|i| i.code == code).cloned())
    }

    async fn delete_invitation(&self, invitation_id: i64) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let before = state.invitations.len();
        state.invitations.retain(|i| i.id != invitation_id);
        Ok(state.invitations.len() < before)
    }

    async fn register_invited_user(
        &self,
        user: &NewUser,
        invitation_id: i64,
        role_id: i64,
    ) -> StoreResult<Option<User>> {
        let mut state = self.state.write().await;

        let now = Utc::now();
        let open = state
            .invitations
            .iter()
            .any(|i| i.id == invitation_id && i.is_valid(now));
        if !open {
            return Ok(None);
        }

        // insert first so a duplicate email leaves the invitation untouched
        let created = state.insert_user(user)?;
        state.role_user.push((role_id, created.id));
        if let Some(invitation) = state.invitations.iter_mut().find(|i| i.id == invitation_id) {
            invitation.is_used = true;
            invitation.updated_at = now;
        }

        Ok(Some(created))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        state.sessions.retain(|s| s.is_active(now));

        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            expires_at,
            created_at: now,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session(&self, session_id: Uuid) -> StoreResult<Option<Session>> {
        let state = self.state.read().await;
        Ok(state.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn delete_session(&self, session_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.sessions.retain(|s| s.id != session_id);
        Ok(())
    }
}
