use crate::AppState;
use crate::utils::auth::validate_jwt;
use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};

/// Rejects requests without a valid bearer token and exposes the caller's
/// [`Claims`](crate::utils::auth::Claims) to handlers as an extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    let Some(token) = token else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    match validate_jwt(&token, &state.config) {
        Ok(claims) if !claims.sub.is_empty() => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Ok(_) => Err(StatusCode::UNAUTHORIZED),
        Err(e) => {
            tracing::debug!("Bearer token rejected: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
