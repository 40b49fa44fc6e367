//! Builds the PowerShell invocation for a token request.
//!
//! The script is passed with `-EncodedCommand` (base64 over UTF-16LE), so the
//! resource and tenant never appear in shell syntax.

use crate::errors::{NO_AZ_ACCOUNT_MODULE, TOKEN_LINE_MARKER};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// PowerShell 7+ executable.
pub const POWERSHELL_EXECUTABLE: &str = "pwsh";
/// Windows PowerShell executable, tried when `pwsh` is not on the PATH.
pub const WINDOWS_POWERSHELL_EXECUTABLE: &str = "powershell";
/// Oldest Az.Accounts release that has Get-AzAccessToken.
pub const MIN_AZ_ACCOUNTS_VERSION: &str = "2.2.0";

/// Host platform, which decides the outer shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }
}

/// An executable plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Copy with the first `from` in the final argument replaced by `to`.
    pub fn with_last_arg_replaced(&self, from: &str, to: &str) -> Self {
        let mut args = self.args.clone();
        if let Some(last) = args.last_mut() {
            *last = last.replacen(from, to, 1);
        }
        Self {
            program: self.program.clone(),
            args,
        }
    }
}

impl fmt::Display for CommandLine {
    /// Long arguments are elided so encoded scripts stay out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_ARG: usize = 48;

        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.len() > MAX_ARG {
                let head: String = arg.chars().take(MAX_ARG).collect();
                write!(f, " {}...({} bytes)", head, arg.len())?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Render the script that fetches a token for `resource`.
pub fn build_script(resource: &str, tenant_id: Option<&str>) -> String {
    let tenant_argument = tenant_id
        .map(|tenant| format!(" -TenantId {}", tenant))
        .unwrap_or_default();

    format!(
        "$ErrorActionPreference = 'Stop'
[version]$minimumVersion = '{min_version}'

$m = Import-Module Az.Accounts -MinimumVersion $minimumVersion -PassThru -ErrorAction SilentlyContinue

if (! $m) {{
    Write-Output {sentinel}
    exit
}}

$token = Get-AzAccessToken -ResourceUrl '{resource}'{tenant_argument}

Write-Output \"`n{marker}$($token.Token)%$($token.ExpiresOn.ToUnixTimeSeconds())`n\"
",
        min_version = MIN_AZ_ACCOUNTS_VERSION,
        sentinel = NO_AZ_ACCOUNT_MODULE,
        marker = TOKEN_LINE_MARKER,
    )
}

/// Base64 over UTF-16LE, the encoding `-EncodedCommand` expects.
pub fn encode_script(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    STANDARD.encode(bytes)
}

/// Build the full invocation for `platform`.
pub fn build_command_line(
    platform: Platform,
    resource: &str,
    tenant_id: Option<&str>,
) -> CommandLine {
    let script = build_script(resource, tenant_id);
    let command = format!(
        "{} -NonInteractive -EncodedCommand {}",
        POWERSHELL_EXECUTABLE,
        encode_script(&script)
    );

    match platform {
        Platform::Unix => CommandLine::new("/bin/sh", ["-c".to_string(), command]),
        Platform::Windows => CommandLine::new("cmd", ["/c".to_string(), command]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_script(encoded: &str) -> String {
        let bytes = STANDARD.decode(encoded).expect("valid base64");
        assert_eq!(bytes.len() % 2, 0, "UTF-16LE has an even byte count");
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).expect("valid UTF-16")
    }

    fn decoded_from(command: &CommandLine) -> String {
        let last = command.args().last().expect("command has arguments");
        let encoded = last
            .strip_prefix("pwsh -NonInteractive -EncodedCommand ")
            .expect("pwsh invocation");
        decode_script(encoded)
    }

    #[test]
    fn test_unix_command_shape() {
        let command = build_command_line(Platform::Unix, "https://management.azure.com", None);
        assert_eq!(command.program(), "/bin/sh");
        assert_eq!(command.args().len(), 2);
        assert_eq!(command.args()[0], "-c");
        assert!(command.args()[1].starts_with("pwsh -NonInteractive -EncodedCommand "));
    }

    #[test]
    fn test_windows_command_shape() {
        let command = build_command_line(Platform::Windows, "https://management.azure.com", None);
        assert_eq!(command.program(), "cmd");
        assert_eq!(command.args()[0], "/c");
        assert!(command.args()[1].starts_with("pwsh -NonInteractive -EncodedCommand "));
    }

    #[test]
    fn test_script_contains_resource_and_tenant() {
        let command = build_command_line(
            Platform::Unix,
            "https://vault.azure.net",
            Some("72f988bf-86f1-41af-91ab-2d7cd011db47"),
        );
        let script = decoded_from(&command);
        assert!(script.contains("-ResourceUrl 'https://vault.azure.net'"));
        assert!(script.contains(" -TenantId 72f988bf-86f1-41af-91ab-2d7cd011db47"));
    }

    #[test]
    fn test_script_without_tenant_has_no_tenant_flag() {
        let command = build_command_line(Platform::Windows, "https://vault.azure.net", None);
        let script = decoded_from(&command);
        assert!(script.contains("-ResourceUrl 'https://vault.azure.net'\n"));
        assert!(!script.contains("-TenantId"));
    }

    #[test]
    fn test_script_checks_module_and_emits_marker() {
        let script = build_script("https://storage.azure.com", None);
        assert!(script.starts_with("$ErrorActionPreference = 'Stop'\n"));
        assert!(script.contains("[version]$minimumVersion = '2.2.0'"));
        assert!(script.contains("Import-Module Az.Accounts -MinimumVersion $minimumVersion"));
        assert!(script.contains("Write-Output NO_AZ_ACCOUNT_MODULE\n    exit"));
        assert!(script.contains(
            "Write-Output \"`nazsdk%$($token.Token)%$($token.ExpiresOn.ToUnixTimeSeconds())`n\""
        ));
    }

    #[test]
    fn test_encode_script_is_utf16le_base64() {
        // "A" -> [0x41, 0x00] -> "QQA="
        assert_eq!(encode_script("A"), "QQA=");
        assert_eq!(decode_script(&encode_script("Get-AzAccessToken é")), "Get-AzAccessToken é");
    }

    #[test]
    fn test_with_last_arg_replaced_only_touches_first_match_in_last_arg() {
        let command = CommandLine::new("cmd", ["/c pwsh", "pwsh -NonInteractive pwsh"]);
        let fallback = command.with_last_arg_replaced("pwsh", "powershell");
        assert_eq!(fallback.program(), "cmd");
        assert_eq!(fallback.args()[0], "/c pwsh");
        assert_eq!(fallback.args()[1], "powershell -NonInteractive pwsh");
        assert_eq!(command.args()[1], "pwsh -NonInteractive pwsh");
    }

    #[test]
    fn test_display_elides_long_arguments() {
        let command = build_command_line(Platform::Unix, "https://management.azure.com", None);
        let shown = command.to_string();
        assert!(shown.starts_with("/bin/sh -c pwsh -NonInteractive -EncodedCommand "));
        assert!(shown.contains("bytes)"));
        assert!(shown.len() < command.args()[1].len());
    }

    #[test]
    fn test_platform_current_matches_target() {
        let expected = if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        };
        assert_eq!(Platform::current(), expected);
    }
}
