use std::borrow::Cow;

use validator::ValidationError;

use super::CreateProvider;
use crate::providers::requires_api_version;

/// Validate that a provider base URL is an absolute http(s) URL with a host.
pub fn validate_base_url(base_url: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(base_url).map_err(|e| {
        let mut err = ValidationError::new("invalid_url");
        err.message = Some(Cow::Owned(format!("Invalid base URL: {e}")));
        err
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        let mut err = ValidationError::new("invalid_scheme");
        err.message = Some(Cow::Owned(format!(
            "Base URL scheme must be http or https, got '{}'",
            parsed.scheme()
        )));
        return Err(err);
    }

    if parsed.host_str().is_none() {
        let mut err = ValidationError::new("missing_host");
        err.message = Some(Cow::Borrowed("Base URL must include a host"));
        return Err(err);
    }

    Ok(())
}

/// Anthropic and Azure providers must carry a non-empty API version.
pub fn validate_provider_api_version(input: &CreateProvider) -> Result<(), ValidationError> {
    let has_version = input
        .api_version
        .as_deref()
        .is_some_and(|v| !v.trim().is_empty());

    if requires_api_version(Some(input.kind)) && !has_version {
        let mut err = ValidationError::new("api_version_required");
        err.message = Some(Cow::Owned(format!(
            "Provider kind '{}' requires an api_version (e.g. \"{}\")",
            input.kind,
            input.kind.describe().default_version_hint
        )));
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://api.openai.com/v1").is_ok());
        assert!(validate_base_url("http://localhost:11434").is_ok());

        let err = validate_base_url("ftp://example.com").unwrap_err();
        assert_eq!(err.code, "invalid_scheme");

        let err = validate_base_url("not a url").unwrap_err();
        assert_eq!(err.code, "invalid_url");
    }
}
