//! Error types for the caching subsystem and the services built on it.

use std::fmt;

/// Result type for cache and service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache layer and the owning services.
///
/// The cache layer itself only ever produces [`Error::ConfigError`] (at
/// construction time). Everything else originates in a service or in the
/// persistence collaborator and passes through the caches untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Persistence collaborator failure (database, connection, query).
    ///
    /// Never cached and never retried by the cache layer. A compute-on-miss
    /// callback that fails leaves the cache exactly as it was.
    ///
    /// **Recovery:** Retry after connection recovery.
    RepositoryError(String),

    /// A record the caller asked for does not exist.
    ///
    /// At the cache boundary absence is an `Option::None` (and is cached as a
    /// negative entry); services turn it into this variant.
    NotFound {
        /// Entity name, e.g. `"User"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// A uniqueness rule was violated (duplicate email, duplicate stock row).
    Duplicate {
        /// Entity name
        entity: &'static str,
        /// Field carrying the unique value
        field: &'static str,
        /// The conflicting value
        value: String,
    },

    /// An argument or business rule check failed before touching persistence.
    InvalidArgument(String),

    /// Login failed: unknown email or wrong password.
    ///
    /// Both cases share one variant so callers cannot tell them apart.
    InvalidCredentials,

    /// Configuration error during cache construction.
    ///
    /// Common causes:
    /// - Capacity of zero or below
    /// - Negative TTL
    /// - Malformed settings JSON
    ///
    /// **Recovery:** Fix configuration and restart.
    ConfigError(String),
}

impl Error {
    /// Build a [`Error::NotFound`] for the given entity and id.
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Build a [`Error::Duplicate`] for the given entity, field and value.
    pub fn duplicate(entity: &'static str, field: &'static str, value: impl fmt::Display) -> Self {
        Error::Duplicate {
            entity,
            field,
            value: value.to_string(),
        }
    }

    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
            Error::NotFound { entity, id } => write!(f, "{} with ID {} not found", entity, id),
            Error::Duplicate {
                entity,
                field,
                value,
            } => write!(f, "{} with {} '{}' already exists", entity, field, value),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidCredentials => write!(f, "Invalid email or password"),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}
