use crate::api::error::AppError;
use crate::config::AppConfig;
use anyhow::Context;
use dashmap::DashMap;
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreJsonWebKeySet, CoreJwsSigningAlgorithm,
    CoreProviderMetadata, CoreResponseType, CoreSubjectIdentifierType,
};
use openidconnect::{
    AuthUrl, AuthorizationCode, ClaimsVerificationError, ClientId, ClientSecret, CsrfToken,
    EmptyAdditionalProviderMetadata, EndpointMaybeSet, EndpointNotSet, EndpointSet, IssuerUrl,
    JsonWebKeySetUrl, Nonce, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, ResponseTypes,
    Scope, SignatureVerificationError, TokenResponse, TokenUrl, UserInfoUrl,
};
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};

/// How long an authorization request may stay unanswered.
pub const PENDING_LOGIN_TTL: Duration = Duration::from_secs(600);

type ProviderClient = CoreClient<
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

struct OidcSettings {
    issuer: IssuerUrl,
    client_id: ClientId,
    client_secret: Option<ClientSecret>,
    redirect_url: RedirectUrl,
    skip_discovery: bool,
}

struct PendingLogin {
    nonce: Nonce,
    pkce_verifier: PkceCodeVerifier,
    created_at: Instant,
}

/// Identity asserted by the provider after a successful login.
#[derive(Debug, Clone)]
pub struct OidcIdentity {
    pub subject: String,
    pub email: Option<String>,
}

pub struct OidcService {
    settings: Option<OidcSettings>,
    metadata: OnceCell<CoreProviderMetadata>,
    /// Signing keys fetched after startup; replaced when the provider rotates them.
    jwks: RwLock<Option<CoreJsonWebKeySet>>,
    pending: DashMap<String, PendingLogin>,
    max_pending: usize,
    http: reqwest::Client,
}

impl OidcService {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let settings = match (
            &config.oidc_issuer_url,
            &config.oidc_client_id,
            &config.oidc_redirect_url,
        ) {
            (Some(issuer), Some(client_id), Some(redirect)) => Some(OidcSettings {
                issuer: IssuerUrl::new(issuer.clone()).context("invalid OIDC_ISSUER_URL")?,
                client_id: ClientId::new(client_id.clone()),
                client_secret: config.oidc_client_secret.clone().map(ClientSecret::new),
                redirect_url: RedirectUrl::new(redirect.clone())
                    .context("invalid OIDC_REDIRECT_URL")?,
                skip_discovery: config.oidc_skip_discovery,
            }),
            _ => None,
        };

        // Provider requests must not follow redirects
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build OIDC HTTP client")?;

        Ok(Self {
            settings,
            metadata: OnceCell::new(),
            jwks: RwLock::new(None),
            pending: DashMap::new(),
            max_pending: config.oidc_max_pending_logins,
            http,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.is_some()
    }

    fn settings(&self) -> Result<&OidcSettings, AppError> {
        self.settings
            .as_ref()
            .ok_or_else(|| AppError::NotFound("OIDC login is not configured".to_string()))
    }

    async fn metadata(&self, settings: &OidcSettings) -> Result<&CoreProviderMetadata, AppError> {
        self.metadata
            .get_or_try_init(|| async {
                if settings.skip_discovery {
                    info!("🔑 Using derived OIDC endpoints for {}", settings.issuer.as_str());
                    derived_metadata(&settings.issuer)
                } else {
                    info!("🔑 Discovering OIDC provider {}", settings.issuer.as_str());
                    CoreProviderMetadata::discover_async(settings.issuer.clone(), &self.http)
                        .await
                        .map_err(|e| AppError::Internal(format!("OIDC discovery failed: {}", e)))
                }
            })
            .await
    }

    fn client(&self, settings: &OidcSettings, metadata: CoreProviderMetadata) -> ProviderClient {
        CoreClient::from_provider_metadata(
            metadata,
            settings.client_id.clone(),
            settings.client_secret.clone(),
        )
        .set_redirect_uri(settings.redirect_url.clone())
    }

    /// Starts a login: returns the provider URL the browser must visit.
    pub async fn authorize(&self) -> Result<String, AppError> {
        let settings = self.settings()?;
        if self.pending.len() >= self.max_pending {
            warn!(
                pending = self.pending.len(),
                "Too many unfinished OIDC logins, refusing a new one"
            );
            return Err(AppError::ServiceUnavailable(
                "Too many logins in progress, try again later".to_string(),
            ));
        }

        let metadata = self.metadata(settings).await?.clone();
        let client = self.client(settings, metadata);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_token, nonce) = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        self.pending.insert(
            csrf_token.secret().clone(),
            PendingLogin {
                nonce,
                pkce_verifier,
                created_at: Instant::now(),
            },
        );

        Ok(auth_url.to_string())
    }

    /// Finishes a login started by [`OidcService::authorize`].
    pub async fn complete(&self, code: String, state: &str) -> Result<OidcIdentity, AppError> {
        let settings = self.settings()?;

        let (_, pending) = self
            .pending
            .remove(state)
            .ok_or_else(|| AppError::BadRequest("Unknown or expired login state".to_string()))?;
        if pending.created_at.elapsed() > PENDING_LOGIN_TTL {
            return Err(AppError::BadRequest(
                "Unknown or expired login state".to_string(),
            ));
        }

        let metadata = self.metadata(settings).await?.clone();
        let keys = self.signing_keys(&metadata, false).await?;
        let client = self.client(settings, metadata.clone().set_jwks(keys));

        let token_response = client
            .exchange_code(AuthorizationCode::new(code))
            .map_err(|e| AppError::Internal(format!("OIDC token endpoint missing: {}", e)))?
            .set_pkce_verifier(pending.pkce_verifier)
            .request_async(&self.http)
            .await
            .map_err(|e| AppError::Internal(format!("Token exchange failed: {}", e)))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| AppError::Internal("Provider returned no ID token".to_string()))?;

        let rejected = |e: ClaimsVerificationError| {
            warn!("ID token rejected: {}", e);
            AppError::Unauthorized("Invalid identity token".to_string())
        };

        let claims = match id_token.claims(&client.id_token_verifier(), &pending.nonce) {
            Ok(claims) => claims,
            Err(ClaimsVerificationError::SignatureVerification(
                SignatureVerificationError::NoMatchingKey,
            )) => {
                // Unknown key id: the provider rotated its keys
                let keys = self.signing_keys(&metadata, true).await?;
                let client = self.client(settings, metadata.set_jwks(keys));
                id_token
                    .claims(&client.id_token_verifier(), &pending.nonce)
                    .map_err(rejected)?
            }
            Err(e) => return Err(rejected(e)),
        };

        Ok(OidcIdentity {
            subject: claims.subject().to_string(),
            email: claims.email().map(|e| e.to_string()),
        })
    }

    /// Provider signing keys: the latest fetched set, else the discovered
    /// one. `refresh` forces a new fetch from the JWKS endpoint.
    async fn signing_keys(
        &self,
        metadata: &CoreProviderMetadata,
        refresh: bool,
    ) -> Result<CoreJsonWebKeySet, AppError> {
        if !refresh {
            if let Some(keys) = self.jwks.read().await.as_ref() {
                return Ok(keys.clone());
            }
            if !metadata.jwks().keys().is_empty() {
                return Ok(metadata.jwks().clone());
            }
        }

        info!("🔑 Fetching OIDC signing keys from {}", metadata.jwks_uri().as_str());
        let keys = CoreJsonWebKeySet::fetch_async(metadata.jwks_uri(), &self.http)
            .await
            .map_err(|e| AppError::Internal(format!("JWKS fetch failed: {}", e)))?;
        *self.jwks.write().await = Some(keys.clone());
        Ok(keys)
    }

    /// Drops abandoned login attempts and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, login| login.created_at.elapsed() <= PENDING_LOGIN_TTL);
        before.saturating_sub(self.pending.len())
    }

    pub fn pending_logins(&self) -> usize {
        self.pending.len()
    }
}

/// Provider metadata built from the issuer URL alone, for providers whose
/// discovery document is unavailable.
fn derived_metadata(issuer: &IssuerUrl) -> Result<CoreProviderMetadata, AppError> {
    let base = issuer.as_str().trim_end_matches('/');
    let endpoint = |path: &str| format!("{}/{}", base, path);
    let invalid = |e: url::ParseError| {
        AppError::Internal(format!("Invalid derived OIDC endpoint: {}", e))
    };

    Ok(CoreProviderMetadata::new(
        issuer.clone(),
        AuthUrl::new(endpoint("auth")).map_err(invalid)?,
        JsonWebKeySetUrl::new(endpoint("jwks")).map_err(invalid)?,
        vec![ResponseTypes::new(vec![CoreResponseType::Code])],
        vec![CoreSubjectIdentifierType::Public],
        vec![CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256],
        EmptyAdditionalProviderMetadata {},
    )
    .set_token_endpoint(Some(TokenUrl::new(endpoint("token")).map_err(invalid)?))
    .set_userinfo_endpoint(Some(
        UserInfoUrl::new(endpoint("userinfo")).map_err(invalid)?,
    )))
}
