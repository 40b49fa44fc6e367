//! Scope and tenant resolution.
//!
//! Both values end up inside the PowerShell script, so they are restricted to
//! characters that cannot break out of the quoted literal they are placed in.

use crate::errors::{CredentialError, ErrorCode, Result};
use tracing::info;

const DEFAULT_SUFFIX: &str = "/.default";

/// Reduce the requested scopes to the single resource Get-AzAccessToken accepts.
pub fn scopes_to_resource<S: AsRef<str>>(scopes: &[S]) -> Result<String> {
    let [scope] = scopes else {
        return Err(CredentialError::invalid_request(
            ErrorCode::ScopeCount,
            format!(
                "{} (got {})",
                ErrorCode::ScopeCount.message(),
                scopes.len()
            ),
        ));
    };
    let scope = scope.as_ref();

    if !is_valid_scope(scope) {
        return Err(CredentialError::invalid_request(
            ErrorCode::InvalidScope,
            format!("Invalid scope '{}': only letters, digits and '-_.:/' are allowed", scope),
        ));
    }

    let resource = scope.strip_suffix(DEFAULT_SUFFIX).unwrap_or(scope);
    if resource.is_empty() {
        return Err(CredentialError::invalid_request(
            ErrorCode::InvalidScope,
            format!("Invalid scope '{}': no resource before '{}'", scope, DEFAULT_SUFFIX),
        ));
    }
    Ok(resource.to_string())
}

fn is_valid_scope(scope: &str) -> bool {
    !scope.is_empty()
        && scope
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/'))
}

pub fn is_valid_tenant_id(tenant_id: &str) -> bool {
    !tenant_id.is_empty()
        && tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'))
}

fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    if is_valid_tenant_id(tenant_id) {
        Ok(())
    } else {
        Err(CredentialError::invalid_request(
            ErrorCode::InvalidTenantId,
            format!(
                "Invalid tenant id '{}': only letters, digits, '-' and '.' are allowed",
                tenant_id
            ),
        ))
    }
}

/// Pick the tenant for a request.
///
/// A requested tenant that differs from the default is only honored when
/// multitenant authentication is allowed, and is ignored entirely when it
/// has been disabled process-wide.
pub fn resolve_tenant(
    default_tenant: Option<&str>,
    requested: Option<&str>,
    allow_multitenant: bool,
    disable_multitenant: bool,
) -> Result<Option<String>> {
    if let Some(default) = default_tenant {
        validate_tenant_id(default)?;
    }

    let Some(requested) = requested else {
        return Ok(default_tenant.map(String::from));
    };
    validate_tenant_id(requested)?;

    if disable_multitenant {
        info!(
            "Ignoring tenant_id '{}': multitenant authentication is disabled by AZURE_IDENTITY_DISABLE_MULTITENANTAUTH",
            requested
        );
        return Ok(default_tenant.map(String::from));
    }

    if default_tenant == Some(requested) {
        return Ok(Some(requested.to_string()));
    }

    if !allow_multitenant {
        return Err(CredentialError::authentication_failed(
            ErrorCode::TenantNotAllowed,
            format!(
                "The specified tenant for this token request, \"{}\", does not match the configured tenant, and multitenant authentication is not allowed",
                requested
            ),
        ));
    }

    Ok(Some(requested.to_string()))
}
