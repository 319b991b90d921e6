//! Identity/role collaborator.

use async_trait::async_trait;

use crate::domain::conversation::UserRole;
use crate::domain::foundation::UserId;

use super::RepositoryError;

/// Resolves the role gating admin-only tasks.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    async fn get_user_role(&self, user: &UserId) -> Result<UserRole, RepositoryError>;
}
