//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketstall_core::{Email, UserId};

/// A storefront account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email, normalized to lowercase.
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name to show for this user.
    ///
    /// First and last name joined, or the email local part when both are blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email.local_part().to_string()
        } else {
            full.to_string()
        }
    }
}

/// Fields for a new account (password handled separately).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.phone.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        User {
            id: UserId::new(1),
            email: Email::parse("jane@example.com").unwrap(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_joins_names() {
        assert_eq!(user("Jane", "Doe").display_name(), "Jane Doe");
        assert_eq!(user("Jane", "").display_name(), "Jane");
        assert_eq!(user("", " Doe ").display_name(), "Doe");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        assert_eq!(user("", "  ").display_name(), "jane");
    }

    #[test]
    fn test_profile_update_is_empty() {
        assert!(ProfileUpdate::default().is_empty());
        let update = ProfileUpdate {
            phone: Some("555".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
