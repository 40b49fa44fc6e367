//! Extracts the token line from Get-AzAccessToken output.

use crate::errors::{CredentialError, ErrorCode, Result, TOKEN_LINE_DELIMITER, TOKEN_LINE_MARKER};
use crate::types::AccessToken;

/// Parse `azsdk%<token>%<expires_on>` out of the script's stdout.
///
/// Only the first marker line is considered; anything else the profile or
/// module prints is ignored.
pub fn parse_token(output: &str) -> Result<AccessToken> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with(TOKEN_LINE_MARKER))
        .and_then(parse_token_line)
        .ok_or_else(|| {
            CredentialError::authentication_failed(
                ErrorCode::UnexpectedOutput,
                format!("{}: \"{}\"", ErrorCode::UnexpectedOutput.message(), output),
            )
        })
}

fn parse_token_line(line: &str) -> Option<AccessToken> {
    let fields: Vec<&str> = line.split(TOKEN_LINE_DELIMITER).collect();
    let [_, token, expires_on] = fields.as_slice() else {
        return None;
    };
    if token.is_empty() {
        return None;
    }
    let expires_on = expires_on.parse::<i64>().ok()?;
    Some(AccessToken::new(*token, expires_on))
}
