//! Azure PowerShell credential.
//!
//! Obtains Microsoft Entra access tokens from the account signed in to
//! Azure PowerShell (`Connect-AzAccount`) by running `Get-AzAccessToken`
//! in a short-lived, non-interactive PowerShell process.
//!
//! ```ignore
//! use azps_common::{AzurePowerShellCredential, CredentialConfig};
//!
//! let options = CredentialConfig::from_env()?.options();
//! let credential = AzurePowerShellCredential::new(options);
//! let token = credential
//!     .get_token(&["https://management.azure.com/.default"], None)
//!     .await?;
//! ```

pub mod config;
pub mod credential;
pub mod errors;
pub mod logging;
pub mod types;

pub use config::{ConfigError, ConfigSource, CredentialConfig, Sourced};
pub use credential::{
    AzurePowerShellCredential, CommandLine, CommandRunner, CredentialOptions, Platform,
    ProcessOutput, ProcessRunner, RunError,
};
pub use errors::{CredentialError, ErrorCategory, ErrorCode, ErrorEntry, ErrorKind};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use types::{AccessToken, TokenRequest};
