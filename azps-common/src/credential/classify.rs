//! Maps a finished PowerShell invocation to success or a typed error.

use super::runner::ProcessOutput;
use crate::errors::{
    COMMAND_NOT_FOUND_EXIT_CODE, CredentialError, EXECUTION_POLICY_PATTERN, ErrorCode,
    NO_AZ_ACCOUNT_MODULE, NOT_LOGGED_IN_PATTERN, NOT_RECOGNIZED_PATTERN, Result,
};
use tracing::debug;

/// Decide whether `output` can be parsed for a token.
///
/// Rules are checked in order and the first match wins. stderr is never
/// copied into an error message.
pub fn classify(output: &ProcessOutput) -> Result<()> {
    if output.success() {
        if output.stdout.contains(NO_AZ_ACCOUNT_MODULE) {
            return Err(CredentialError::unavailable(ErrorCode::AzAccountNotInstalled));
        }
        return Ok(());
    }

    let code = classify_failure(output);
    if code == ErrorCode::InvocationFailed && !output.stderr.is_empty() {
        debug!(
            "AzurePowerShellCredential received an error from Azure PowerShell: \"{}\"",
            output.stderr.trim_end()
        );
    }
    Err(CredentialError::unavailable(code))
}

fn classify_failure(output: &ProcessOutput) -> ErrorCode {
    let stderr = &output.stderr;
    if output.exit_code == Some(COMMAND_NOT_FOUND_EXIT_CODE)
        || stderr.contains(NOT_RECOGNIZED_PATTERN)
    {
        ErrorCode::PowerShellNotInstalled
    } else if stderr.contains(NOT_LOGGED_IN_PATTERN) {
        ErrorCode::NotLoggedIn
    } else if stderr.contains(EXECUTION_POLICY_PATTERN) {
        ErrorCode::ExecutionPolicyBlocked
    } else {
        ErrorCode::InvocationFailed
    }
}

/// stderr shows the shell could not resolve the PowerShell executable.
pub fn executable_not_recognized(output: &ProcessOutput) -> bool {
    output.stderr.contains(NOT_RECOGNIZED_PATTERN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{
        AZ_ACCOUNT_NOT_INSTALLED, BLOCKED_BY_EXECUTION_POLICY, ErrorKind,
        FAILED_TO_INVOKE_POWERSHELL, POWERSHELL_NOT_INSTALLED, RUN_CONNECT_AZ_ACCOUNT,
    };

    fn unavailable_message(output: ProcessOutput) -> String {
        let err = classify(&output).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialUnavailable);
        err.to_string()
    }

    #[test]
    fn test_clean_exit_is_success() {
        assert!(classify(&ProcessOutput::new(0, "azsdk%abc%1\n", "")).is_ok());
    }

    #[test]
    fn test_clean_exit_with_sentinel_is_module_missing() {
        let message = unavailable_message(ProcessOutput::new(0, "NO_AZ_ACCOUNT_MODULE\n", ""));
        assert_eq!(message, AZ_ACCOUNT_NOT_INSTALLED);
    }

    #[test]
    fn test_exit_127_is_not_installed_regardless_of_stderr() {
        let message = unavailable_message(ProcessOutput::new(
            127,
            "",
            "Run Connect-AzAccount to login. AuthorizationManager check failed",
        ));
        assert_eq!(message, POWERSHELL_NOT_INSTALLED);
    }

    #[test]
    fn test_not_recognized_is_not_installed() {
        let message = unavailable_message(ProcessOutput::new(
            1,
            "",
            "'pwsh' is not recognized as an internal or external command,\r\noperable program or batch file.\r\n",
        ));
        assert_eq!(message, POWERSHELL_NOT_INSTALLED);
    }

    #[test]
    fn test_login_required() {
        let message = unavailable_message(ProcessOutput::new(
            1,
            "",
            "Get-AzAccessToken: Run Connect-AzAccount to login.",
        ));
        assert_eq!(message, RUN_CONNECT_AZ_ACCOUNT);
    }

    #[test]
    fn test_login_checked_before_execution_policy() {
        let message = unavailable_message(ProcessOutput::new(
            1,
            "",
            "AuthorizationManager check failed. Run Connect-AzAccount to login.",
        ));
        assert_eq!(message, RUN_CONNECT_AZ_ACCOUNT);
    }

    #[test]
    fn test_execution_policy_blocked() {
        let message = unavailable_message(ProcessOutput::new(
            1,
            "",
            "File cannot be loaded. AuthorizationManager check failed.",
        ));
        assert_eq!(message, BLOCKED_BY_EXECUTION_POLICY);
    }

    #[test]
    fn test_unknown_failure_hides_stderr() {
        let output = ProcessOutput::new(1, "", "secret-ish diagnostic text");
        let err = classify(&output).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvocationFailed);
        assert_eq!(err.to_string(), FAILED_TO_INVOKE_POWERSHELL);
        assert!(!err.to_string().contains("secret-ish"));
        assert!(!err.entry().format_full().contains("secret-ish"));
    }

    #[test]
    fn test_signal_termination_is_failure() {
        let output = ProcessOutput {
            exit_code: None,
            stdout: "azsdk%abc%1".to_string(),
            stderr: String::new(),
        };
        assert_eq!(
            classify(&output).unwrap_err().code(),
            ErrorCode::InvocationFailed
        );
    }

    #[test]
    fn test_sentinel_ignored_on_failure_exit() {
        let output = ProcessOutput::new(2, "NO_AZ_ACCOUNT_MODULE", "");
        assert_eq!(
            classify(&output).unwrap_err().code(),
            ErrorCode::InvocationFailed
        );
    }

    #[test]
    fn test_executable_not_recognized() {
        assert!(executable_not_recognized(&ProcessOutput::new(
            1,
            "",
            "'pwsh' is not recognized as an internal or external command"
        )));
        assert!(!executable_not_recognized(&ProcessOutput::new(
            127,
            "",
            "sh: 1: pwsh: not found"
        )));
    }
}
