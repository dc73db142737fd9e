use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates a redirect target and returns it trimmed.
///
/// Only absolute `http`/`https` URLs with a host are accepted. When
/// `own_host` is given, targets on that host are refused so a short link
/// cannot point at another short link.
pub fn validate_original_url(
    raw: &str,
    max_len: usize,
    own_host: Option<&str>,
) -> Result<String, ValidationError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(ValidationError {
            code: "URL_EMPTY",
            message: "URL is required".to_string(),
        });
    }

    if trimmed.len() > max_len {
        return Err(ValidationError {
            code: "URL_TOO_LONG",
            message: format!("URL exceeds maximum length of {} bytes", max_len),
        });
    }

    let parsed = Url::parse(trimmed).map_err(|e| ValidationError {
        code: "URL_INVALID",
        message: format!("URL could not be parsed: {}", e),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError {
            code: "URL_SCHEME",
            message: format!("Scheme '{}' is not allowed", parsed.scheme()),
        });
    }

    let host = parsed.host_str().ok_or_else(|| ValidationError {
        code: "URL_NO_HOST",
        message: "URL must include a host".to_string(),
    })?;

    if let Some(own) = own_host {
        if host.eq_ignore_ascii_case(own) {
            return Err(ValidationError {
                code: "URL_SELF_REFERENCE",
                message: "URL must not point at this service".to_string(),
            });
        }
    }

    Ok(trimmed.to_string())
}
