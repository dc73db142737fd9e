use crate::config::AppConfig;
use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // identity provider subject
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub fn create_jwt(
    subject: &str,
    email: Option<String>,
    secret: &str,
    ttl_hours: i64,
) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| anyhow::anyhow!("session expiry out of range"))?
        .timestamp();

    let claims = Claims {
        sub: subject.to_owned(),
        exp: expiration as usize,
        jti: Some(uuid::Uuid::new_v4().to_string()),
        email,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

/// Accepts our own HS256 session tokens, or RS256 tokens signed by the
/// identity provider when its public key is configured.
pub fn validate_jwt(token: &str, config: &AppConfig) -> Result<Claims> {
    let header = jsonwebtoken::decode_header(token)?;

    let (decoding_key, validation) = match (&config.jwt_public_key, header.alg) {
        (Some(public_key), Algorithm::RS256) => {
            let mut val = Validation::new(Algorithm::RS256);
            val.validate_aud = false; // Allow any audience for generic OIDC compatibility
            (DecodingKey::from_rsa_pem(public_key.as_bytes())?, val)
        }
        _ => (
            DecodingKey::from_secret(config.jwt_secret.as_ref()),
            Validation::default(),
        ),
    };

    let token_data = decode::<Claims>(token, &decoding_key, &validation)?;

    Ok(token_data.claims)
}
