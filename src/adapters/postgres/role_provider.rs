//! Role lookup from the `user_roles` table. Unknown users are plain users.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::conversation::UserRole;
use crate::domain::foundation::UserId;
use crate::ports::{RepositoryError, RoleProvider};

#[derive(Clone)]
pub struct PostgresRoleProvider {
    pool: PgPool,
}

impl PostgresRoleProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleProvider for PostgresRoleProvider {
    async fn get_user_role(&self, user: &UserId) -> Result<UserRole, RepositoryError> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1")
                .bind(user.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepositoryError::Storage(format!("Failed to fetch role: {}", e)))?;

        Ok(match role.as_deref() {
            Some("admin") => UserRole::Admin,
            _ => UserRole::User,
        })
    }
}
