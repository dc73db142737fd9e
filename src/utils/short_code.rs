use crate::entities::links::MAX_SHORT_CODE_LEN;
use rand::Rng;

/// Shortest code a user may pick by hand.
pub const MIN_CUSTOM_CODE_LEN: usize = 3;

/// First path segments owned by the router. A short code equal to one of
/// these (ignoring case) would be shadowed or would shadow a route.
pub const RESERVED_CODES: &[&str] = &[
    "api",
    "api-docs",
    "auth",
    "favicon.ico",
    "health",
    "links",
    "login",
    "logout",
    "robots.txt",
    "swagger-ui",
];

/// Random code over the 62-symbol alphanumeric alphabet.
pub fn generate(len: usize) -> String {
    let len = len.clamp(1, MAX_SHORT_CODE_LEN);
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(code))
}

/// Checks a user-chosen code. Returns a message suitable for a 400 body.
pub fn validate_custom(code: &str) -> Result<(), String> {
    let len = code.chars().count();
    if !(MIN_CUSTOM_CODE_LEN..=MAX_SHORT_CODE_LEN).contains(&len) {
        return Err(format!(
            "short code must be between {} and {} characters",
            MIN_CUSTOM_CODE_LEN, MAX_SHORT_CODE_LEN
        ));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("short code may only contain letters, digits, '-' and '_'".to_string());
    }
    if is_reserved(code) {
        return Err(format!("short code '{}' is reserved", code));
    }
    Ok(())
}
