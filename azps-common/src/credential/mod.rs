//! Azure PowerShell credential.
//!
//! Acquires tokens by running `Get-AzAccessToken` in a non-interactive
//! PowerShell session, using whatever account `Connect-AzAccount` signed in.
//!
//! Flow per call:
//! 1. Resolve the single resource and the tenant (no process is started if
//!    either is rejected).
//! 2. Build one [`CommandLine`] for the host platform.
//! 3. Run it; on Windows, if `pwsh` is not recognized, run it once more with
//!    `powershell`.
//! 4. Classify the result, then parse the token line.
//!
//! Tokens are not cached; callers own them.

pub mod classify;
pub mod command;
pub mod parser;
pub mod process_group;
pub mod runner;
pub mod scopes;

pub use command::{CommandLine, Platform};
pub use runner::{CommandRunner, ProcessOutput, ProcessRunner, RunError};

use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::errors::{CredentialError, ErrorCode, Result};
use crate::types::{AccessToken, TokenRequest};
use command::{POWERSHELL_EXECUTABLE, WINDOWS_POWERSHELL_EXECUTABLE};
use std::time::Duration;
use tracing::{debug, info, warn};

const CREDENTIAL_NAME: &str = "AzurePowerShellCredential";

/// Settings for [`AzurePowerShellCredential`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialOptions {
    /// Bound on each PowerShell invocation.
    pub timeout: Duration,
    /// Accept per-request tenants that differ from `tenant_id`.
    pub allow_multitenant: bool,
    /// Tenant used when a request names none.
    pub tenant_id: Option<String>,
    /// Ignore per-request tenants entirely.
    pub disable_multitenant: bool,
}

impl Default for CredentialOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            allow_multitenant: false,
            tenant_id: None,
            disable_multitenant: false,
        }
    }
}

/// Authenticates by requesting a token from Azure PowerShell.
pub struct AzurePowerShellCredential<R = ProcessRunner> {
    runner: R,
    platform: Platform,
    options: CredentialOptions,
}

impl AzurePowerShellCredential {
    /// Credential for the host platform using real processes.
    pub fn new(options: CredentialOptions) -> Self {
        let platform = Platform::current();
        Self {
            runner: ProcessRunner::new(platform),
            platform,
            options,
        }
    }
}

impl<R: CommandRunner> AzurePowerShellCredential<R> {
    pub fn with_runner(runner: R, options: CredentialOptions) -> Self {
        Self {
            runner,
            platform: Platform::current(),
            options,
        }
    }

    /// Override the platform used to shape the command line.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn options(&self) -> &CredentialOptions {
        &self.options
    }

    /// Request an access token for exactly one scope.
    pub async fn get_token(
        &self,
        scopes: &[&str],
        tenant_id: Option<&str>,
    ) -> Result<AccessToken> {
        let mut request = TokenRequest::new(scopes.iter().copied());
        request.tenant_id = tenant_id.map(String::from);
        self.request_token(&request).await
    }

    /// Same as [`get_token`](Self::get_token) for a prepared request.
    pub async fn request_token(&self, request: &TokenRequest) -> Result<AccessToken> {
        match self.acquire(request).await {
            Ok(token) => {
                info!("{}.get_token succeeded", CREDENTIAL_NAME);
                Ok(token)
            }
            Err(e) => {
                warn!("{}.get_token failed: {}", CREDENTIAL_NAME, e);
                Err(e)
            }
        }
    }

    async fn acquire(&self, request: &TokenRequest) -> Result<AccessToken> {
        let resource = scopes::scopes_to_resource(&request.scopes)?;
        let tenant = scopes::resolve_tenant(
            self.options.tenant_id.as_deref(),
            request.tenant_id.as_deref(),
            self.options.allow_multitenant,
            self.options.disable_multitenant,
        )?;

        let command = command::build_command_line(self.platform, &resource, tenant.as_deref());
        let output = self.run_with_fallback(&command).await?;

        classify::classify(&output)?;
        parser::parse_token(&output.stdout)
    }

    /// Run `command`, retrying once with Windows PowerShell when cmd.exe
    /// cannot find `pwsh`.
    async fn run_with_fallback(&self, command: &CommandLine) -> Result<ProcessOutput> {
        let output = self.run_once(command).await?;

        if self.platform == Platform::Windows && classify::executable_not_recognized(&output) {
            debug!(
                "'{}' is not on the PATH; retrying with '{}'",
                POWERSHELL_EXECUTABLE, WINDOWS_POWERSHELL_EXECUTABLE
            );
            let fallback = command
                .with_last_arg_replaced(POWERSHELL_EXECUTABLE, WINDOWS_POWERSHELL_EXECUTABLE);
            return self.run_once(&fallback).await;
        }

        Ok(output)
    }

    async fn run_once(&self, command: &CommandLine) -> Result<ProcessOutput> {
        self.runner
            .run(command, self.options.timeout)
            .await
            .map_err(|e| {
                let code = match e {
                    RunError::TimedOut { .. } => ErrorCode::InvocationTimedOut,
                    RunError::WorkingDirectory(_) => ErrorCode::WorkingDirectoryUnavailable,
                    RunError::Spawn { .. } | RunError::Io(_) => ErrorCode::InvocationFailed,
                };
                debug!("PowerShell invocation failed: {}", e);
                CredentialError::unavailable_from(code, e)
            })
    }
}
