//! Fixed role assignments.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::conversation::UserRole;
use crate::domain::foundation::UserId;
use crate::ports::{RepositoryError, RoleProvider};

/// Admins are listed explicitly; everyone else gets the default role.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleProvider {
    admins: HashSet<UserId>,
    default_role: UserRole,
}

impl StaticRoleProvider {
    pub fn new(default_role: UserRole) -> Self {
        Self {
            admins: HashSet::new(),
            default_role,
        }
    }

    pub fn with_admin(mut self, user: UserId) -> Self {
        self.admins.insert(user);
        self
    }
}

#[async_trait]
impl RoleProvider for StaticRoleProvider {
    async fn get_user_role(&self, user: &UserId) -> Result<UserRole, RepositoryError> {
        if self.admins.contains(user) {
            Ok(UserRole::Admin)
        } else {
            Ok(self.default_role)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listed_admins_are_admin() {
        let admin = UserId::new("boss").unwrap();
        let provider = StaticRoleProvider::new(UserRole::User).with_admin(admin.clone());

        assert_eq!(provider.get_user_role(&admin).await.unwrap(), UserRole::Admin);
        let guest = UserId::new("guest").unwrap();
        assert_eq!(provider.get_user_role(&guest).await.unwrap(), UserRole::User);
    }
}
