//! Error taxonomy for the Azure PowerShell credential.
//!
//! Sentinels shared with the PowerShell script and every user-facing message
//! live here; nothing else in the crate spells them out.
//!
//! # Error kinds
//!
//! | Kind                  | Meaning                                                      |
//! |-----------------------|--------------------------------------------------------------|
//! | CredentialUnavailable | PowerShell could not produce a token; try another credential |
//! | AuthenticationFailed  | PowerShell ran but its output did not yield a usable token   |
//! | InvalidRequest        | The caller's scopes or tenant were rejected before spawning  |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use crate::credential::runner::RunError;
use thiserror::Error;

/// Written by the script when Az.Accounts cannot be imported.
pub const NO_AZ_ACCOUNT_MODULE: &str = "NO_AZ_ACCOUNT_MODULE";
/// Prefix of the single line carrying the token and its expiry.
pub const TOKEN_LINE_MARKER: &str = "azsdk%";
/// Field separator within the token line.
pub const TOKEN_LINE_DELIMITER: char = '%';

/// stderr fragment emitted by cmd.exe when an executable cannot be resolved.
pub const NOT_RECOGNIZED_PATTERN: &str = "' is not recognized";
/// stderr fragment emitted by Az.Accounts when no session exists.
pub const NOT_LOGGED_IN_PATTERN: &str = "Run Connect-AzAccount to login";
/// stderr fragment emitted when the execution policy blocks the script.
pub const EXECUTION_POLICY_PATTERN: &str = "AuthorizationManager check failed";
/// Exit status of a POSIX shell that could not find the command.
pub const COMMAND_NOT_FOUND_EXIT_CODE: i32 = 127;

pub const AZ_ACCOUNT_NOT_INSTALLED: &str = "Az.Account module >= 2.2.0 is not installed";
pub const BLOCKED_BY_EXECUTION_POLICY: &str =
    "Execution policy prevented invoking Azure PowerShell";
pub const FAILED_TO_INVOKE_POWERSHELL: &str = "Failed to invoke PowerShell";
pub const POWERSHELL_NOT_INSTALLED: &str = "PowerShell is not installed";
pub const POWERSHELL_TIMED_OUT: &str = "Azure PowerShell did not return a token before the timeout";
pub const RUN_CONNECT_AZ_ACCOUNT: &str = "Please run \"Connect-AzAccount\" to set up account";
pub const SYSTEMROOT_NOT_SET: &str = "Environment variable 'SYSTEMROOT' has no value";

/// Top-level kind of a [`CredentialError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CredentialUnavailable,
    AuthenticationFailed,
    InvalidRequest,
}

/// Errors returned by `get_token`.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// PowerShell, Az.Accounts or a signed-in session is missing.
    #[error("{message}")]
    Unavailable {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<RunError>,
    },

    /// PowerShell ran but did not return a usable token.
    #[error("{message}")]
    AuthenticationFailed { code: ErrorCode, message: String },

    /// The request was rejected before any process was started.
    #[error("{message}")]
    InvalidRequest { code: ErrorCode, message: String },
}

/// Result type for credential operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

impl CredentialError {
    /// Unavailable error carrying the catalog message for `code`.
    pub fn unavailable(code: ErrorCode) -> Self {
        Self::Unavailable {
            code,
            message: code.message().to_string(),
            source: None,
        }
    }

    /// Unavailable error caused by a failed process invocation.
    pub fn unavailable_from(code: ErrorCode, source: RunError) -> Self {
        Self::Unavailable {
            code,
            message: code.message().to_string(),
            source: Some(source),
        }
    }

    pub fn authentication_failed(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_request(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable { .. } => ErrorKind::CredentialUnavailable,
            Self::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable { code, .. }
            | Self::AuthenticationFailed { code, .. }
            | Self::InvalidRequest { code, .. } => *code,
        }
    }

    /// True when a chained credential should move on to the next source.
    pub fn is_unavailable(&self) -> bool {
        self.kind() == ErrorKind::CredentialUnavailable
    }

    /// Catalog entry with this error's own message.
    pub fn entry(&self) -> ErrorEntry {
        let mut entry = self.code().entry();
        entry.message = self.to_string();
        entry
    }
}
