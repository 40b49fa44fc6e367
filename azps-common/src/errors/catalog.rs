//! Error Catalog for the Azure PowerShell credential
//!
//! Every failure the credential can surface has a stable code, a fixed
//! user-facing message, and remediation steps.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                              |
//! |------------|-------------|------------------------------------------|
//! | E001-E099  | Request     | Invalid scopes, tenants, configuration   |
//! | E100-E199  | Environment | PowerShell / Az.Accounts unavailable     |
//! | E200-E299  | Token       | PowerShell ran but produced no token     |

use super::{
    AZ_ACCOUNT_NOT_INSTALLED, BLOCKED_BY_EXECUTION_POLICY, FAILED_TO_INVOKE_POWERSHELL,
    POWERSHELL_NOT_INSTALLED, POWERSHELL_TIMED_OUT, RUN_CONNECT_AZ_ACCOUNT,
    SYSTEMROOT_NOT_SET,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering every credential failure.
///
/// Each variant maps to a unique code in the AZPS-Exxx format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Request Errors (E001-E099)
    // =========================================================================
    /// Not exactly one scope was requested
    ScopeCount,
    /// Scope contains characters that cannot be embedded in the script
    InvalidScope,
    /// Tenant id contains invalid characters
    InvalidTenantId,
    /// Environment variable has invalid value
    ConfigEnvError,

    // =========================================================================
    // Environment Errors (E100-E199)
    // =========================================================================
    /// The shell or PowerShell process could not be started
    InvocationFailed,
    /// PowerShell did not finish within the timeout
    InvocationTimedOut,
    /// PowerShell is not on the PATH
    PowerShellNotInstalled,
    /// Az.Accounts is missing or too old
    AzAccountNotInstalled,
    /// No Azure PowerShell session
    NotLoggedIn,
    /// Execution policy refused to run the script
    ExecutionPolicyBlocked,
    /// SYSTEMROOT is unset, so no safe working directory exists
    WorkingDirectoryUnavailable,

    // =========================================================================
    // Token Errors (E200-E299)
    // =========================================================================
    /// Get-AzAccessToken output did not contain a token line
    UnexpectedOutput,
    /// Requested tenant differs from the configured one
    TenantNotAllowed,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ScopeCount => 1,
            Self::InvalidScope => 2,
            Self::InvalidTenantId => 3,
            Self::ConfigEnvError => 10,

            Self::InvocationFailed => 100,
            Self::InvocationTimedOut => 101,
            Self::PowerShellNotInstalled => 102,
            Self::AzAccountNotInstalled => 103,
            Self::NotLoggedIn => 104,
            Self::ExecutionPolicyBlocked => 105,
            Self::WorkingDirectoryUnavailable => 106,

            Self::UnexpectedOutput => 200,
            Self::TenantNotAllowed => 201,
        }
    }

    /// Returns the formatted error code string (e.g., "AZPS-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("AZPS-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Request,
            100..=199 => ErrorCategory::Environment,
            _ => ErrorCategory::Token,
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Returns the fixed user-facing message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ScopeCount => "This credential requires exactly one scope per token request",
            Self::InvalidScope => "Scope contains characters that are not allowed",
            Self::InvalidTenantId => "Tenant id contains characters that are not allowed",
            Self::ConfigEnvError => "Environment variable has invalid value",

            Self::InvocationFailed => FAILED_TO_INVOKE_POWERSHELL,
            Self::InvocationTimedOut => POWERSHELL_TIMED_OUT,
            Self::PowerShellNotInstalled => POWERSHELL_NOT_INSTALLED,
            Self::AzAccountNotInstalled => AZ_ACCOUNT_NOT_INSTALLED,
            Self::NotLoggedIn => RUN_CONNECT_AZ_ACCOUNT,
            Self::ExecutionPolicyBlocked => BLOCKED_BY_EXECUTION_POLICY,
            Self::WorkingDirectoryUnavailable => SYSTEMROOT_NOT_SET,

            Self::UnexpectedOutput => "Unexpected output from Get-AzAccessToken",
            Self::TenantNotAllowed => {
                "The requested tenant does not match the configured tenant and multitenant authentication is disabled"
            }
        }
    }

    /// Returns remediation steps for this error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ScopeCount => &[
                "Request a token for a single scope, e.g. 'https://management.azure.com/.default'",
            ],
            Self::InvalidScope => &[
                "Scopes may only contain letters, digits and the characters '-_.:/'",
                "Check for stray quotes or whitespace in the scope",
            ],
            Self::InvalidTenantId => &[
                "Tenant ids may only contain letters, digits, '-' and '.'",
                "Use the tenant GUID or its primary domain name",
            ],
            Self::ConfigEnvError => &[
                "Run 'azps config' to see which variable is invalid",
                "Unset the variable to fall back to the default",
            ],
            Self::InvocationFailed => &[
                "Verify PowerShell runs from a terminal: 'pwsh -NonInteractive -Command $PSVersionTable'",
                "Re-run with --verbose to see the captured stderr",
            ],
            Self::InvocationTimedOut => &[
                "Check that 'Get-AzAccessToken' completes quickly in an interactive session",
                "Raise AZPS_TIMEOUT_SECS if PowerShell starts slowly on this machine",
            ],
            Self::PowerShellNotInstalled => &[
                "Install PowerShell: https://aka.ms/powershell",
                "Ensure 'pwsh' (or 'powershell' on Windows) is on the PATH",
            ],
            Self::AzAccountNotInstalled => &[
                "Install the module: 'Install-Module Az.Accounts -MinimumVersion 2.2.0'",
                "Update an existing module: 'Update-Module Az.Accounts'",
            ],
            Self::NotLoggedIn => &["Run 'Connect-AzAccount' in PowerShell to sign in"],
            Self::ExecutionPolicyBlocked => &[
                "Inspect the policy with 'Get-ExecutionPolicy -List'",
                "Allow signed scripts: 'Set-ExecutionPolicy -Scope CurrentUser RemoteSigned'",
            ],
            Self::WorkingDirectoryUnavailable => {
                &["Set SYSTEMROOT to the Windows directory, e.g. C:\\Windows"]
            }
            Self::UnexpectedOutput => &[
                "Update Az.Accounts: 'Update-Module Az.Accounts'",
                "Check that profile scripts do not write 'azsdk%' lines to the output stream",
            ],
            Self::TenantNotAllowed => &[
                "Omit the tenant to use the configured one",
                "Set AZPS_ALLOW_MULTITENANT=true to allow any tenant the account belongs to",
            ],
        }
    }

    /// Returns all error codes.
    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::ScopeCount,
            Self::InvalidScope,
            Self::InvalidTenantId,
            Self::ConfigEnvError,
            Self::InvocationFailed,
            Self::InvocationTimedOut,
            Self::PowerShellNotInstalled,
            Self::AzAccountNotInstalled,
            Self::NotLoggedIn,
            Self::ExecutionPolicyBlocked,
            Self::WorkingDirectoryUnavailable,
            Self::UnexpectedOutput,
            Self::TenantNotAllowed,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Caller input and configuration errors (E001-E099)
    Request,
    /// PowerShell environment errors (E100-E199)
    Environment,
    /// Token output errors (E200-E299)
    Token,
}

impl ErrorCategory {
    /// Returns a human-readable name for the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Request => "Request",
            Self::Environment => "Environment",
            Self::Token => "Token",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "AZPS-E001")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("\nRemediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        output
    }

    /// Formats the error as a single line.
    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}
