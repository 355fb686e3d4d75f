//! Identity provider error types.

use std::fmt;

use thiserror::Error;

/// Result type for identity provider operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors that can occur while talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Firebase authentication is not configured: {0}")]
    NotConfigured(String),

    #[error("Identity provider rejected the request ({code}): {message}")]
    Provider { code: AuthErrorCode, message: String },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("No signed-in user")]
    NoSession,

    #[error("Operation not supported by this identity provider: {0}")]
    Unsupported(&'static str),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IdentityError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    /// Build a provider error from the provider's error message, e.g.
    /// `"WEAK_PASSWORD : Password should be at least 6 characters"`.
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Provider {
            code: AuthErrorCode::parse(&message),
            message,
        }
    }

    pub fn code(&self) -> Option<&AuthErrorCode> {
        match self {
            IdentityError::Provider { code, .. } => Some(code),
            _ => None,
        }
    }

    /// True when the provider no longer accepts the session's refresh
    /// credential and the user has to sign in again.
    pub fn is_session_revoked(&self) -> bool {
        matches!(
            self.code(),
            Some(AuthErrorCode::SessionExpired | AuthErrorCode::UserDisabled | AuthErrorCode::UserNotFound)
        )
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            IdentityError::Provider { code, .. } => code.user_message().to_string(),
            IdentityError::InvalidCredentials(msg) => msg.clone(),
            IdentityError::Network(_) => "Network error. Please check your connection".to_string(),
            IdentityError::NotConfigured(_) => {
                "Authentication is not available right now. Please contact support".to_string()
            }
            IdentityError::NoSession => "Please sign in to continue".to_string(),
            _ => "Authentication failed. Please try again.".to_string(),
        }
    }
}

/// Classified identity provider error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorCode {
    InvalidEmail,
    UserDisabled,
    UserNotFound,
    WrongPassword,
    InvalidLoginCredentials,
    EmailAlreadyInUse,
    WeakPassword,
    OperationNotAllowed,
    TooManyRequests,
    InvalidApiKey,
    SessionExpired,
    Unknown(String),
}

impl AuthErrorCode {
    /// Classify a provider message. Only the leading code is significant;
    /// anything after `" : "` is free text.
    pub fn parse(message: &str) -> Self {
        let code = message.split(" : ").next().unwrap_or(message).trim();

        match code {
            "INVALID_EMAIL" => AuthErrorCode::InvalidEmail,
            "USER_DISABLED" => AuthErrorCode::UserDisabled,
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => AuthErrorCode::UserNotFound,
            "INVALID_PASSWORD" => AuthErrorCode::WrongPassword,
            "INVALID_LOGIN_CREDENTIALS" => AuthErrorCode::InvalidLoginCredentials,
            "EMAIL_EXISTS" => AuthErrorCode::EmailAlreadyInUse,
            "WEAK_PASSWORD" => AuthErrorCode::WeakPassword,
            "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => AuthErrorCode::OperationNotAllowed,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthErrorCode::TooManyRequests,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" => {
                AuthErrorCode::SessionExpired
            }
            c if c.starts_with("API key not valid") || c == "API_KEY_INVALID" => {
                AuthErrorCode::InvalidApiKey
            }
            other => AuthErrorCode::Unknown(other.to_string()),
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            AuthErrorCode::InvalidEmail => "Invalid email address",
            AuthErrorCode::UserDisabled => "This account has been disabled",
            AuthErrorCode::UserNotFound => "No account found with this email",
            AuthErrorCode::WrongPassword => "Incorrect password",
            AuthErrorCode::InvalidLoginCredentials => "Incorrect email or password",
            AuthErrorCode::EmailAlreadyInUse => "An account already exists with this email",
            AuthErrorCode::WeakPassword => "Password should be at least 6 characters",
            AuthErrorCode::OperationNotAllowed => "This operation is not allowed",
            AuthErrorCode::TooManyRequests => "Too many failed attempts. Please try again later",
            AuthErrorCode::InvalidApiKey => "Invalid Firebase configuration. Please contact support",
            AuthErrorCode::SessionExpired => "Your session has expired. Please sign in again",
            AuthErrorCode::Unknown(_) => "Authentication failed",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorCode::Unknown(code) => write!(f, "{}", code),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_free_text() {
        let code = AuthErrorCode::parse("WEAK_PASSWORD : Password should be at least 6 characters");
        assert_eq!(code, AuthErrorCode::WeakPassword);
    }

    #[test]
    fn test_parse_api_key_message() {
        let code = AuthErrorCode::parse("API key not valid. Please pass a valid API key.");
        assert_eq!(code, AuthErrorCode::InvalidApiKey);
    }

    #[test]
    fn test_parse_unknown_code() {
        let code = AuthErrorCode::parse("SOMETHING_NEW");
        assert_eq!(code, AuthErrorCode::Unknown("SOMETHING_NEW".to_string()));
        assert_eq!(code.user_message(), "Authentication failed");
    }

    #[test]
    fn test_user_messages() {
        let err = IdentityError::from_provider_message("EMAIL_NOT_FOUND");
        assert_eq!(err.user_message(), "No account found with this email");

        let err = IdentityError::from_provider_message("EMAIL_EXISTS");
        assert_eq!(err.user_message(), "An account already exists with this email");

        let err = IdentityError::from_provider_message("TOO_MANY_ATTEMPTS_TRY_LATER");
        assert_eq!(err.user_message(), "Too many failed attempts. Please try again later");
    }

    #[test]
    fn test_session_revoked_codes() {
        assert!(IdentityError::from_provider_message("TOKEN_EXPIRED").is_session_revoked());
        assert!(IdentityError::from_provider_message("USER_DISABLED").is_session_revoked());
        assert!(!IdentityError::from_provider_message("INVALID_EMAIL").is_session_revoked());
        assert!(!IdentityError::NoSession.is_session_revoked());
    }
}
