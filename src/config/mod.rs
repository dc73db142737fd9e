use std::env;

/// Runtime configuration for the link service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Public origin prepended to short codes (default: "http://localhost:3000")
    pub public_base_url: String,

    /// Length of generated short codes (default: 7)
    pub short_code_length: usize,

    /// Insert attempts before giving up on a generated code (default: 5)
    pub short_code_max_attempts: u32,

    /// Maximum accepted length of an original URL in bytes (default: 2048)
    pub max_url_length: usize,

    /// Resolve cache entry lifetime in seconds (default: 300)
    pub cache_ttl_secs: u64,

    /// Maximum number of cached short codes (default: 10_000)
    pub cache_capacity: usize,

    /// OIDC Issuer URL
    pub oidc_issuer_url: Option<String>,
    /// OIDC Client ID
    pub oidc_client_id: Option<String>,
    /// OIDC Client Secret
    pub oidc_client_secret: Option<String>,
    /// OIDC Redirect URL
    pub oidc_redirect_url: Option<String>,
    /// Skip OIDC Discovery (use derived endpoints)
    pub oidc_skip_discovery: bool,
    /// Unfinished logins held at once before new ones are refused (default: 10_000)
    pub oidc_max_pending_logins: usize,

    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// PEM public key of the identity provider; enables RS256 bearer tokens
    pub jwt_public_key: Option<String>,

    /// Lifetime of issued session tokens in hours (default: 24)
    pub session_ttl_hours: i64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            short_code_length: 7,
            short_code_max_attempts: 5,
            max_url_length: 2048,
            cache_ttl_secs: 300,
            cache_capacity: 10_000,
            oidc_issuer_url: None,
            oidc_client_id: None,
            oidc_client_secret: None,
            oidc_redirect_url: None,
            oidc_skip_discovery: false,
            oidc_max_pending_logins: 10_000,
            jwt_secret: "secret".to_string(),
            jwt_public_key: None,
            session_ttl_hours: 24,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

fn origins(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.public_base_url),
            short_code_length: parsed("SHORT_CODE_LENGTH", default.short_code_length),
            short_code_max_attempts: parsed(
                "SHORT_CODE_MAX_ATTEMPTS",
                default.short_code_max_attempts,
            ),
            max_url_length: parsed("MAX_URL_LENGTH", default.max_url_length),
            cache_ttl_secs: parsed("CACHE_TTL_SECS", default.cache_ttl_secs),
            cache_capacity: parsed("CACHE_CAPACITY", default.cache_capacity),

            oidc_issuer_url: env::var("OIDC_ISSUER_URL").ok(),
            oidc_client_id: env::var("OIDC_CLIENT_ID").ok(),
            oidc_client_secret: env::var("OIDC_CLIENT_SECRET").ok(),
            oidc_redirect_url: env::var("OIDC_REDIRECT_URL").ok(),
            oidc_skip_discovery: flag("OIDC_SKIP_DISCOVERY"),
            oidc_max_pending_logins: parsed(
                "OIDC_MAX_PENDING_LOGINS",
                default.oidc_max_pending_logins,
            ),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret), // dev fallback, production() enforces it
            jwt_public_key: env::var("JWT_PUBLIC_KEY").ok(),
            session_ttl_hours: parsed("SESSION_TTL_HOURS", default.session_ttl_hours),

            allowed_origins: origins("ALLOWED_ORIGINS").unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (short cache, relaxed origins)
    pub fn development() -> Self {
        Self {
            cache_ttl_secs: 30,
            allowed_origins: vec!["*".to_string()],
            ..Self::default()
        }
    }

    /// Create config for production (secret must come from the environment)
    pub fn production() -> Self {
        let from_env = Self::from_env();
        Self {
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            allowed_origins: origins("ALLOWED_ORIGINS")
                .unwrap_or_else(|| vec![from_env.public_base_url.clone()]),
            ..from_env
        }
    }

    /// True when enough OIDC settings are present to run the login flow
    pub fn oidc_enabled(&self) -> bool {
        self.oidc_issuer_url.is_some()
            && self.oidc_client_id.is_some()
            && self.oidc_redirect_url.is_some()
    }

    /// Host part of `public_base_url`, used to refuse self-referencing links
    pub fn public_host(&self) -> Option<String> {
        url::Url::parse(&self.public_base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }
}
