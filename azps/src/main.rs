//! Azure PowerShell credential - command line
//!
//! Fetches an access token from the account signed in to Azure PowerShell
//! and prints it, or shows the script and settings that would be used.

#![forbid(unsafe_code)]

use anyhow::Result;
use azps_common::credential::command::{build_script, encode_script};
use azps_common::credential::scopes::{resolve_tenant, scopes_to_resource};
use azps_common::{
    AccessToken, AzurePowerShellCredential, CredentialConfig, CredentialError, ErrorCode,
    ErrorEntry, ErrorKind, LogConfig, TokenRequest, init_logging,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::process::ExitCode;
use thiserror::Error;
use tracing::debug;

/// Exit status when PowerShell cannot provide a token.
const EXIT_UNAVAILABLE: u8 = 2;
/// Exit status when PowerShell ran but authentication failed.
const EXIT_AUTHENTICATION_FAILED: u8 = 3;
/// Exit status for bad arguments or settings (EX_USAGE).
const EXIT_INVALID_REQUEST: u8 = 64;

/// A failure already described by a catalog entry, mapped to an exit status.
#[derive(Debug, Error)]
#[error("[{}] {}", .entry.code, .entry.message)]
struct CommandFailed {
    entry: ErrorEntry,
    exit_code: u8,
}

impl CommandFailed {
    fn new(entry: ErrorEntry, exit_code: u8) -> Self {
        Self { entry, exit_code }
    }
}

impl From<CredentialError> for CommandFailed {
    fn from(error: CredentialError) -> Self {
        Self::new(error.entry(), exit_code(error.kind()))
    }
}

#[derive(Parser)]
#[command(name = "azps")]
#[command(author, version, about = "Access tokens from Azure PowerShell")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Request an access token
    GetToken {
        /// Scope to request, e.g. https://management.azure.com/.default
        ///
        /// Exactly one scope is accepted; the flag may be repeated so the
        /// error is reported the same way library callers see it.
        #[arg(short, long = "scope", required = true)]
        scopes: Vec<String>,

        /// Tenant to request the token from
        #[arg(short, long)]
        tenant_id: Option<String>,

        /// Seconds to wait for PowerShell (overrides AZPS_TIMEOUT_SECS)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Print the token as JSON with its expiry
        #[arg(long)]
        json: bool,
    },

    /// Print the PowerShell script without running it
    Script {
        /// Scope the script requests a token for
        #[arg(short, long)]
        scope: String,

        /// Tenant passed to Get-AzAccessToken
        #[arg(short, long)]
        tenant_id: Option<String>,

        /// Print the -EncodedCommand form instead of the script text
        #[arg(long)]
        encoded: bool,
    },

    /// Show resolved settings and where they came from
    Config,
}

#[derive(Debug, Serialize)]
struct TokenOutput<'a> {
    token: &'a str,
    expires_on: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

impl<'a> From<&'a AccessToken> for TokenOutput<'a> {
    fn from(token: &'a AccessToken) -> Self {
        Self {
            token: &token.token,
            expires_on: token.expires_on,
            expires_at: token.expires_at().map(|at| at.to_rfc3339()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }

    let code = execute(cli.command, log_config).await?;
    Ok(ExitCode::from(code))
}

/// Run `command` with logging installed and return the exit status.
///
/// The logging guards are dropped here, so the file log is flushed before the
/// process exits on every path.
async fn execute(command: Commands, log_config: LogConfig) -> Result<u8> {
    let _logging_guards = init_logging(&log_config)?;

    match run(command, &log_config).await {
        Ok(()) => Ok(0),
        Err(err) => match err.downcast::<CommandFailed>() {
            Ok(failed) => {
                eprint!("{}", failed.entry.format_full());
                Ok(failed.exit_code)
            }
            Err(err) => Err(err),
        },
    }
}

async fn run(command: Commands, log_config: &LogConfig) -> Result<()> {
    let config = match CredentialConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let mut entry = ErrorCode::ConfigEnvError.entry();
            entry.message = e.to_string();
            return Err(CommandFailed::new(entry, EXIT_INVALID_REQUEST).into());
        }
    };

    match command {
        Commands::GetToken {
            scopes,
            tenant_id,
            timeout_secs,
            json,
        } => {
            let config = config.with_timeout_override(timeout_secs);
            debug!(
                "Timeout {}s from {}",
                config.timeout_secs.value,
                config.timeout_secs.describe_source()
            );

            let mut request = TokenRequest::new(scopes);
            request.tenant_id = tenant_id;

            let credential = AzurePowerShellCredential::new(config.options());
            let token = credential
                .request_token(&request)
                .await
                .map_err(CommandFailed::from)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&TokenOutput::from(&token))?);
            } else {
                println!("{}", token.token);
            }
            Ok(())
        }

        Commands::Script {
            scope,
            tenant_id,
            encoded,
        } => {
            let options = config.options();
            let script = scopes_to_resource(&[scope]).and_then(|resource| {
                let tenant = resolve_tenant(
                    options.tenant_id.as_deref(),
                    tenant_id.as_deref(),
                    options.allow_multitenant,
                    options.disable_multitenant,
                )?;
                Ok(build_script(&resource, tenant.as_deref()))
            });

            let script = script.map_err(CommandFailed::from)?;
            if encoded {
                println!("{}", encode_script(&script));
            } else {
                print!("{}", script);
            }
            Ok(())
        }

        Commands::Config => {
            println!("Azure PowerShell credential settings");
            println!(
                "  timeout_secs        = {:<40} [{}]",
                config.timeout_secs.value,
                config.timeout_secs.describe_source()
            );
            println!(
                "  allow_multitenant   = {:<40} [{}]",
                config.allow_multitenant.value,
                config.allow_multitenant.describe_source()
            );
            println!(
                "  tenant_id           = {:<40} [{}]",
                config.tenant_id.value.as_deref().unwrap_or("(none)"),
                config.tenant_id.describe_source()
            );
            println!(
                "  disable_multitenant = {:<40} [{}]",
                config.disable_multitenant.value,
                config.disable_multitenant.describe_source()
            );
            println!();
            println!("Logging");
            println!("  level  = {}", log_config.level);
            println!("  format = {:?}", log_config.format);
            if let Some(file) = &log_config.file {
                println!("  file   = {}", file.display());
            }
            Ok(())
        }
    }
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::CredentialUnavailable => EXIT_UNAVAILABLE,
        ErrorKind::AuthenticationFailed => EXIT_AUTHENTICATION_FAILED,
        ErrorKind::InvalidRequest => EXIT_INVALID_REQUEST,
    }
}
