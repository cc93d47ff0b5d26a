//! Request-scoped authenticated identity

use pm_core::Id;
use pm_models::{Role, User};

/// Identity attached to a request by the authentication filter.
///
/// Ephemeral and request-scoped: built from a fresh identity lookup on every
/// authenticated request, never persisted.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Id,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    /// Authority strings derived from the role
    pub authorities: Vec<String>,
}

impl CurrentUser {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name(),
            role: user.role,
            authorities: vec![user.role.authority()],
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_authorities_from_role() {
        let user = User {
            id: 5,
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@example.com".into(),
            password_hash: String::new(),
            role: Role::Admin,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let current = CurrentUser::from_user(&user);
        assert_eq!(current.id, 5);
        assert_eq!(current.full_name, "Grace Hopper");
        assert!(current.is_admin());
        assert_eq!(current.authorities, vec!["ROLE_ADMIN".to_string()]);
    }
}
