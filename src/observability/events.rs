//! Security Events
//!
//! Structured records for authentication and account activity. Every
//! record carries `security_event`, `category` and `severity` fields so log
//! pipelines can filter on them without parsing messages.
//!
//! Passwords, hashes and session tokens are never logged.
//!
//! ```ignore
//! security_event!(
//!     SecurityEvent::AuthenticationFailure,
//!     username = %username,
//!     reason = "invalid_credentials",
//!     "Authentication failed"
//! );
//! ```

use std::fmt;

/// Security-relevant events emitted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    /// Credentials verified or an active session presented
    AuthenticationSuccess,
    /// Unknown user or wrong password
    AuthenticationFailure,
    /// Session revoked by its holder
    Logout,
    SessionCreated,
    SessionDestroyed,
    /// New account stored
    UserRegistered,
    /// Signup rejected because the username exists
    DuplicateRegistration,
    /// Credential store or session cache failed or timed out
    DependencyUnavailable,
    SystemStartup,
    SystemShutdown,
    DatabaseConnected,
    CacheConnected,
}

impl SecurityEvent {
    /// Event category for filtering and grouping
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess
            | Self::AuthenticationFailure
            | Self::Logout
            | Self::SessionCreated
            | Self::SessionDestroyed => "authentication",

            Self::UserRegistered | Self::DuplicateRegistration => "user_management",

            Self::DependencyUnavailable
            | Self::SystemStartup
            | Self::SystemShutdown
            | Self::DatabaseConnected
            | Self::CacheConnected => "system",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::DependencyUnavailable => Severity::Critical,

            Self::AuthenticationFailure | Self::DuplicateRegistration => Severity::High,

            Self::AuthenticationSuccess | Self::UserRegistered | Self::SystemStartup => {
                Severity::Medium
            }

            Self::Logout
            | Self::SessionCreated
            | Self::SessionDestroyed
            | Self::SystemShutdown
            | Self::DatabaseConnected
            | Self::CacheConnected => Severity::Low,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess => "authentication_success",
            Self::AuthenticationFailure => "authentication_failure",
            Self::Logout => "logout",
            Self::SessionCreated => "session_created",
            Self::SessionDestroyed => "session_destroyed",
            Self::UserRegistered => "user_registered",
            Self::DuplicateRegistration => "duplicate_registration",
            Self::DependencyUnavailable => "dependency_unavailable",
            Self::SystemStartup => "system_startup",
            Self::SystemShutdown => "system_shutdown",
            Self::DatabaseConnected => "database_connected",
            Self::CacheConnected => "cache_connected",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Event severity, mapped onto tracing levels by [`security_event!`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Logged at DEBUG
    Low,
    /// Logged at INFO
    Medium,
    /// Logged at WARN
    High,
    /// Logged at ERROR
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log a [`SecurityEvent`] at the tracing level matching its severity.
///
/// Trailing tokens are passed to the tracing macro unchanged, so fields
/// and the message use the usual `tracing` syntax.
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($rest:tt)*) => {{
        let event: $crate::observability::SecurityEvent = $event;
        let name = event.name();
        let category = event.category();
        let severity = event.severity();

        match severity {
            $crate::observability::Severity::Critical => ::tracing::error!(
                security_event = name,
                category = category,
                severity = severity.as_str(),
                $($rest)*
            ),
            $crate::observability::Severity::High => ::tracing::warn!(
                security_event = name,
                category = category,
                severity = severity.as_str(),
                $($rest)*
            ),
            $crate::observability::Severity::Medium => ::tracing::info!(
                security_event = name,
                category = category,
                severity = severity.as_str(),
                $($rest)*
            ),
            $crate::observability::Severity::Low => ::tracing::debug!(
                security_event = name,
                category = category,
                severity = severity.as_str(),
                $($rest)*
            ),
        }
    }};
}

pub use security_event;
