//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered member of the course platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Login name (unique)
    pub username: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Name shown next to posts and comments
    pub display_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an unsaved user. The password must already be hashed.
    pub fn new(username: String, password_hash: String, display_name: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            password_hash,
            display_name,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Owners may modify their own content; admins may modify anything.
    pub fn can_moderate(&self, author_id: i64) -> bool {
        self.is_admin() || self.id == author_id
    }

    /// Admins moderate the forum but do not author posts.
    pub fn can_post(&self) -> bool {
        !self.is_admin()
    }

    pub fn can_create_course(&self) -> bool {
        matches!(self.role, UserRole::Teacher | UserRole::Admin)
    }
}

/// Platform role. The numeric codes match the legacy user type column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl UserRole {
    pub fn code(self) -> i32 {
        match self {
            UserRole::Student => 1,
            UserRole::Teacher => 2,
            UserRole::Admin => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(UserRole::Student),
            2 => Some(UserRole::Teacher),
            3 => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "admin",
        };
        f.write_str(name)
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "teacher" => Ok(UserRole::Teacher),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        let mut user = User::new(format!("user{}", id), "hash".into(), format!("User {}", id), role);
        user.id = id;
        user
    }

    #[test]
    fn test_user_new_defaults() {
        let user = User::new("alice".into(), "hash".into(), "Alice".into(), UserRole::Student);
        assert_eq!(user.id, 0);
        assert_eq!(user.role, UserRole::Student);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_can_moderate() {
        let admin = user(1, UserRole::Admin);
        let student = user(2, UserRole::Student);

        assert!(admin.can_moderate(2));
        assert!(admin.can_moderate(999));
        assert!(student.can_moderate(2));
        assert!(!student.can_moderate(1));
    }

    #[test]
    fn test_admins_do_not_post() {
        assert!(!user(1, UserRole::Admin).can_post());
        assert!(user(2, UserRole::Teacher).can_post());
        assert!(user(3, UserRole::Student).can_post());
    }

    #[test]
    fn test_course_creation_roles() {
        assert!(user(1, UserRole::Admin).can_create_course());
        assert!(user(2, UserRole::Teacher).can_create_course());
        assert!(!user(3, UserRole::Student).can_create_course());
    }

    #[test]
    fn test_role_codes() {
        for role in [UserRole::Student, UserRole::Teacher, UserRole::Admin] {
            assert_eq!(UserRole::from_code(role.code()), Some(role));
        }
        assert_eq!(UserRole::from_code(0), None);
        assert_eq!(UserRole::from_code(4), None);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!(UserRole::from_str("Teacher").unwrap(), UserRole::Teacher);
        assert_eq!(UserRole::from_str("ADMIN").unwrap(), UserRole::Admin);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::Student.to_string(), "student");
    }
}
