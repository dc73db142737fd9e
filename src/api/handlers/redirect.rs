use crate::api::error::AppError;
use crate::entities::links::MAX_SHORT_CODE_LEN;
use axum::{
    extract::{Path, State},
    response::Redirect,
};
use tracing::info;

/// Follow a short link
#[utoipa::path(
    get,
    path = "/{code}",
    params(
        ("code" = String, Path, description = "Short code")
    ),
    responses(
        (status = 307, description = "Redirect to the original URL"),
        (status = 404, description = "Unknown short code")
    ),
    tag = "redirect"
)]
pub async fn follow_link(
    State(state): State<crate::AppState>,
    Path(code): Path<String>,
) -> Result<Redirect, AppError> {
    if code.is_empty() || code.chars().count() > MAX_SHORT_CODE_LEN {
        return Err(AppError::NotFound("Short link not found".to_string()));
    }

    let url = state.links.resolve(&code).await?;
    info!(short_code = %code, "Redirecting");
    Ok(Redirect::temporary(&url))
}
