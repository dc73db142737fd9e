use crate::api::error::AppError;
use crate::utils::auth::{Claims, create_jwt};
use axum::{
    Extension, Json,
    extract::{Query, State},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub user_id: String,
    pub email: Option<String>,
}

/// Start an OIDC login
#[utoipa::path(
    get,
    path = "/auth/oidc/login",
    responses(
        (status = 303, description = "Redirect to the identity provider"),
        (status = 404, description = "OIDC is not configured"),
        (status = 503, description = "Too many logins in progress")
    ),
    tag = "auth"
)]
pub async fn login_oidc(State(state): State<crate::AppState>) -> Result<Redirect, AppError> {
    let url = state.oidc.authorize().await?;
    Ok(Redirect::to(&url))
}

/// Finish an OIDC login and receive a session token
#[utoipa::path(
    get,
    path = "/auth/oidc/callback",
    params(
        ("code" = String, Query, description = "Authorization code"),
        ("state" = String, Query, description = "CSRF state issued at login")
    ),
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing parameters or unknown state"),
        (status = 401, description = "Identity token rejected")
    ),
    tag = "auth"
)]
pub async fn callback_oidc(
    State(state): State<crate::AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<AuthResponse>, AppError> {
    let identity = state.oidc.complete(query.code, &query.state).await?;

    let token = create_jwt(
        &identity.subject,
        identity.email,
        &state.config.jwt_secret,
        state.config.session_ttl_hours,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!(user_id = %identity.subject, "Session issued");

    Ok(Json(AuthResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.session_ttl_hours * 3600,
    }))
}

/// Current caller
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Authenticated user", body = MeResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn me(Extension(claims): Extension<Claims>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: claims.sub,
        email: claims.email,
    })
}
