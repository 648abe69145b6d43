//! Authorization error types.
//!
//! Every failure the grant engine can produce is one variant of [`AuthError`].
//! Each variant maps to exactly one OAuth 2.0 error string (`invalid_grant`,
//! `invalid_scope`, `invalid_request` or `server_error`) and carries a stable
//! numeric [`ErrorCode`] so clients can tell failure kinds apart.

use std::fmt;

use uuid::Uuid;

use crate::storage::StorageError;
use crate::token::jwt::JwtError;

/// Errors that can occur while processing grants, nonces and identity tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A request field is missing, blank, or holds an unacceptable value.
    #[error("Invalid request: {field}: {description}")]
    InvalidRequest {
        /// Name of the offending field.
        field: String,
        /// Description of the problem.
        description: String,
        /// Stable error code.
        code: ErrorCode,
    },

    /// A caller-supplied container could not be decoded.
    #[error("Malformed {field}")]
    Malformed {
        /// Name of the field that held the container.
        field: String,
        /// The decoding failure.
        #[source]
        source: JwtError,
    },

    /// A requested scope is not available to the client or token.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
        /// Stable error code.
        code: ErrorCode,
    },

    /// A credential or record needed by the grant does not exist.
    ///
    /// Reported to clients as `invalid_grant` without saying which part was missing.
    #[error("Not found: {message}")]
    NotFound {
        /// Internal description, never sent to the client.
        message: String,
        /// Stable error code.
        code: ErrorCode,
    },

    /// An authorization code was redeemed more than once.
    #[error("Authorization code {auth_code_id} was already used")]
    CompromisedCode {
        /// The reused authorization code.
        auth_code_id: Uuid,
    },

    /// A refresh token was redeemed more than once.
    #[error("Refresh token {refresh_token_id} was already used")]
    CompromisedRefreshToken {
        /// The reused refresh token.
        refresh_token_id: Uuid,
    },

    /// An authorization code could not be stored.
    #[error("Failed to insert auth code: {reason}. Attempted {attempts} times, code size is {code_size}")]
    AuthCodeInsert {
        /// Why the insert failed.
        reason: AuthCodeInsertFailure,
        /// Number of insert attempts made.
        attempts: u32,
        /// Code size used by the last attempt.
        code_size: usize,
    },

    /// An identity token could not be encoded or signed.
    #[error("Failed to encode identity token: {message}")]
    Encoding {
        /// Description of the encoding failure.
        message: String,
    },

    /// A password could not be hashed.
    #[error("Failed to hash password: {message}")]
    PasswordHash {
        /// Description of the hashing failure.
        message: String,
    },

    /// An error occurred while storing or retrieving data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

/// Why an authorization code insert was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCodeInsertFailure {
    /// Every attempt collided on the code column.
    KnownKeyExhausted,
    /// A uniqueness constraint other than the code column was violated.
    UnknownKey {
        /// Logical key reported by storage, `unknown` when none was reported.
        key: String,
    },
}

impl fmt::Display for AuthCodeInsertFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KnownKeyExhausted => write!(f, "code collisions exhausted retries"),
            Self::UnknownKey { key } => write!(f, "unknown key, {key}, did not retry"),
        }
    }
}

impl AuthError {
    /// Creates an `InvalidRequest` error for a missing or blank field.
    #[must_use]
    pub fn missing_field(field: impl Into<String>, description: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field: field.into(),
            description: description.into(),
            code: ErrorCode::MissingField,
        }
    }

    /// Creates an `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(
        field: impl Into<String>,
        description: impl Into<String>,
        code: ErrorCode,
    ) -> Self {
        Self::InvalidRequest {
            field: field.into(),
            description: description.into(),
            code,
        }
    }

    /// Creates an `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
            code: ErrorCode::ScopesNotSupported,
        }
    }

    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::NotFound {
            message: message.into(),
            code,
        }
    }

    /// Creates an `Encoding` error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates a `PasswordHash` error.
    #[must_use]
    pub fn password_hash(message: impl Into<String>) -> Self {
        Self::PasswordHash {
            message: message.into(),
        }
    }

    /// Creates a `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::AuthCodeInsert { .. }
                | Self::Encoding { .. }
                | Self::PasswordHash { .. }
                | Self::Storage { .. }
                | Self::Configuration { .. }
        )
    }

    /// Returns `true` if this error reports reuse of a single-use credential.
    #[must_use]
    pub fn is_compromise(&self) -> bool {
        matches!(
            self,
            Self::CompromisedCode { .. } | Self::CompromisedRefreshToken { .. }
        )
    }

    /// Returns the error category for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. } | Self::Malformed { .. } | Self::InvalidScope { .. } => {
                ErrorCategory::Validation
            }
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::CompromisedCode { .. } | Self::CompromisedRefreshToken { .. } => {
                ErrorCategory::Compromise
            }
            Self::AuthCodeInsert {
                reason: AuthCodeInsertFailure::KnownKeyExhausted,
                ..
            } => ErrorCategory::Exhaustion,
            Self::AuthCodeInsert {
                reason: AuthCodeInsertFailure::UnknownKey { .. },
                ..
            } => ErrorCategory::Infrastructure,
            Self::Encoding { .. } | Self::PasswordHash { .. } => ErrorCategory::Encoding,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Returns the OAuth 2.0 error string for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } | Self::Malformed { .. } => "invalid_request",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::NotFound { .. }
            | Self::CompromisedCode { .. }
            | Self::CompromisedRefreshToken { .. } => "invalid_grant",
            Self::AuthCodeInsert { .. }
            | Self::Encoding { .. }
            | Self::PasswordHash { .. }
            | Self::Storage { .. }
            | Self::Configuration { .. } => "server_error",
        }
    }

    /// Returns the stable numeric code for this error.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest { code, .. }
            | Self::InvalidScope { code, .. }
            | Self::NotFound { code, .. } => *code,
            Self::Malformed { .. } => ErrorCode::MalformedNonce,
            Self::CompromisedCode { .. } => ErrorCode::CompromisedAuthCode,
            Self::CompromisedRefreshToken { .. } => ErrorCode::CompromisedRefreshToken,
            Self::AuthCodeInsert {
                reason: AuthCodeInsertFailure::KnownKeyExhausted,
                ..
            } => ErrorCode::AuthCodeInsertFailed,
            Self::AuthCodeInsert {
                reason: AuthCodeInsertFailure::UnknownKey { .. },
                ..
            } => ErrorCode::AuthCodeInsertUnknownKey,
            Self::Encoding { .. } => ErrorCode::JwtEncodingError,
            Self::PasswordHash { .. } => ErrorCode::PasswordHashFailed,
            Self::Storage { .. } => ErrorCode::StorageFailure,
            Self::Configuration { .. } => ErrorCode::ConfigurationInvalid,
        }
    }

    /// Returns the description that is safe to send to the client.
    #[must_use]
    pub fn client_description(&self) -> &'static str {
        self.error_code().description()
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::storage(err.to_string())
    }
}

/// Stable numeric codes that let clients tell failure kinds apart.
///
/// Values are part of the public contract and must never be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    MissingField = 1,
    PasswordMismatch = 3,
    ScopesNotSupported = 10,
    AuthCodeNotFound = 20,
    RedirectUriMismatch = 21,
    CompromisedAuthCode = 22,
    RefreshTokenNotFound = 30,
    CompromisedRefreshToken = 31,
    ResourceOwnerNotFound = 40,
    ProfileNotFound = 41,
    NonceNotFound = 50,
    MalformedNonce = 51,
    JwtEncodingError = 60,
    PasswordHashFailed = 61,
    AuthCodeInsertFailed = 70,
    AuthCodeInsertUnknownKey = 71,
    StorageFailure = 80,
    ConfigurationInvalid = 81,
}

impl ErrorCode {
    /// Returns the numeric value.
    #[must_use]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Returns a short description suitable for an `error_description`.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::MissingField => "a required field is missing",
            Self::PasswordMismatch => "passwords do not match",
            Self::ScopesNotSupported => "scope is not available for this client",
            Self::AuthCodeNotFound => "authorization code was not found",
            Self::RedirectUriMismatch => "redirect uri does not match the authorization request",
            Self::CompromisedAuthCode => "authorization code was already used",
            Self::RefreshTokenNotFound => "refresh token was not found",
            Self::CompromisedRefreshToken => "refresh token was already used",
            Self::ResourceOwnerNotFound => "resource owner was not found",
            Self::ProfileNotFound => "profile was not found",
            Self::NonceNotFound => "nonce was not found",
            Self::MalformedNonce => "nonce could not be decoded",
            Self::JwtEncodingError => "identity token could not be encoded",
            Self::PasswordHashFailed => "password could not be stored",
            Self::AuthCodeInsertFailed => "authorization code could not be issued",
            Self::AuthCodeInsertUnknownKey => "authorization code could not be stored",
            Self::StorageFailure => "storage is unavailable",
            Self::ConfigurationInvalid => "server is misconfigured",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Categories of grant errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad, missing or unknown input.
    Validation,
    /// A credential or record does not exist.
    NotFound,
    /// A single-use credential was reused.
    Compromise,
    /// A bounded retry ran out.
    Exhaustion,
    /// Token encoding or signing failed.
    Encoding,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Compromise => write!(f, "compromise"),
            Self::Exhaustion => write!(f, "exhaustion"),
            Self::Encoding => write!(f, "encoding"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_display() {
        let err = AuthError::missing_field("email", "Email is required");
        assert_eq!(err.to_string(), "Invalid request: email: Email is required");

        let err = AuthError::AuthCodeInsert {
            reason: AuthCodeInsertFailure::KnownKeyExhausted,
            attempts: 2,
            code_size: 9,
        };
        assert_eq!(
            err.to_string(),
            "Failed to insert auth code: code collisions exhausted retries. Attempted 2 times, code size is 9"
        );
    }

    #[test]
    fn test_oauth_error_code() {
        assert_eq!(
            AuthError::missing_field("nonce", "Nonce is required").oauth_error_code(),
            "invalid_request"
        );
        assert_eq!(
            AuthError::invalid_scope("profile").oauth_error_code(),
            "invalid_scope"
        );
        assert_eq!(
            AuthError::not_found("code", ErrorCode::AuthCodeNotFound).oauth_error_code(),
            "invalid_grant"
        );
        assert_eq!(
            AuthError::CompromisedCode {
                auth_code_id: Uuid::new_v4()
            }
            .oauth_error_code(),
            "invalid_grant"
        );
        assert_eq!(
            AuthError::CompromisedRefreshToken {
                refresh_token_id: Uuid::new_v4()
            }
            .oauth_error_code(),
            "invalid_grant"
        );
        assert_eq!(AuthError::encoding("bad key").oauth_error_code(), "server_error");
        assert_eq!(AuthError::storage("down").oauth_error_code(), "server_error");
    }

    #[test]
    fn test_compromised_refresh_token_code() {
        let err = AuthError::CompromisedRefreshToken {
            refresh_token_id: Uuid::new_v4(),
        };
        assert_eq!(err.error_code(), ErrorCode::CompromisedRefreshToken);
        assert!(err.is_compromise());
        assert!(err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::Compromise);
    }

    #[test]
    fn test_server_errors() {
        let err = AuthError::AuthCodeInsert {
            reason: AuthCodeInsertFailure::UnknownKey {
                key: "id".to_string(),
            },
            attempts: 1,
            code_size: 8,
        };
        assert!(err.is_server_error());
        assert_eq!(err.category(), ErrorCategory::Infrastructure);
        assert_eq!(err.error_code(), ErrorCode::AuthCodeInsertUnknownKey);

        let err = AuthError::AuthCodeInsert {
            reason: AuthCodeInsertFailure::KnownKeyExhausted,
            attempts: 2,
            code_size: 9,
        };
        assert_eq!(err.category(), ErrorCategory::Exhaustion);
        assert_eq!(err.error_code(), ErrorCode::AuthCodeInsertFailed);
    }

    #[test]
    fn test_error_codes_are_unique() {
        let codes = [
            ErrorCode::MissingField,
            ErrorCode::PasswordMismatch,
            ErrorCode::ScopesNotSupported,
            ErrorCode::AuthCodeNotFound,
            ErrorCode::RedirectUriMismatch,
            ErrorCode::CompromisedAuthCode,
            ErrorCode::RefreshTokenNotFound,
            ErrorCode::CompromisedRefreshToken,
            ErrorCode::ResourceOwnerNotFound,
            ErrorCode::ProfileNotFound,
            ErrorCode::NonceNotFound,
            ErrorCode::MalformedNonce,
            ErrorCode::JwtEncodingError,
            ErrorCode::PasswordHashFailed,
            ErrorCode::AuthCodeInsertFailed,
            ErrorCode::AuthCodeInsertUnknownKey,
            ErrorCode::StorageFailure,
            ErrorCode::ConfigurationInvalid,
        ];
        let unique: HashSet<u16> = codes.iter().map(|c| c.code()).collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::Compromise.to_string(), "compromise");
        assert_eq!(ErrorCategory::Exhaustion.to_string(), "exhaustion");
    }
}
