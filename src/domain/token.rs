//! Single-use tokens delivered by email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::BookingStatus;

/// What a token authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
    GuestBooking,
    BookingAction,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
            TokenPurpose::GuestBooking => "guest_booking",
            TokenPurpose::BookingAction => "booking_action",
        }
    }
}

/// Stored token
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub id: i32,
    pub token: String,
    pub purpose: String,
    pub email: String,
    pub booking_id: Option<i32>,
    pub payload: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    /// Usable when unused, unexpired and issued for `purpose`.
    pub fn is_usable_for(&self, purpose: TokenPurpose, now: DateTime<Utc>) -> bool {
        self.purpose == purpose.as_str() && self.used_at.is_none() && self.expires_at > now
    }
}

/// Payload of a `booking_action` token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingActionPayload {
    pub action: BookingStatus,
}

/// Random URL-safe token value
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(purpose: TokenPurpose, expires_in: Duration, used: bool) -> AuthToken {
        AuthToken {
            id: 1,
            token: generate_token(),
            purpose: purpose.as_str().to_string(),
            email: "a@example.com".to_string(),
            booking_id: None,
            payload: None,
            expires_at: Utc::now() + expires_in,
            used_at: used.then(Utc::now),
        }
    }

    #[test]
    fn test_token_usability() {
        let now = Utc::now();
        assert!(token(TokenPurpose::PasswordReset, Duration::hours(1), false)
            .is_usable_for(TokenPurpose::PasswordReset, now));
        assert!(!token(TokenPurpose::PasswordReset, Duration::hours(1), true)
            .is_usable_for(TokenPurpose::PasswordReset, now));
        assert!(!token(TokenPurpose::PasswordReset, Duration::hours(-1), false)
            .is_usable_for(TokenPurpose::PasswordReset, now));
        assert!(!token(TokenPurpose::EmailVerification, Duration::hours(1), false)
            .is_usable_for(TokenPurpose::PasswordReset, now));
    }

    #[test]
    fn test_generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
