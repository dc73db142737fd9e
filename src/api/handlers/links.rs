use crate::api::error::AppError;
use crate::entities::links;
use crate::services::link_service::{DEFAULT_PAGE_SIZE, LinkService};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

// ── Request / Response Types ──────────────────────────────────────────

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateLinkRequest {
    #[validate(length(min = 1))]
    pub original_url: String,
    /// Optional custom code; generated when absent
    #[validate(length(min = 3, max = 20))]
    pub short_code: Option<String>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateLinkRequest {
    #[validate(length(min = 1))]
    pub original_url: Option<String>,
    #[validate(length(min = 3, max = 20))]
    pub short_code: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LinkResponse {
    pub id: i32,
    pub original_url: String,
    pub short_code: String,
    pub short_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LinkListResponse {
    pub items: Vec<LinkResponse>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

#[derive(Deserialize)]
pub struct ListLinksQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub search: Option<String>,
}

impl LinkResponse {
    fn from_model(service: &LinkService, link: links::Model) -> Self {
        Self {
            short_url: service.short_url(&link.short_code),
            id: link.id,
            original_url: link.original_url,
            short_code: link.short_code,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }
}

// ── Authenticated Endpoints ───────────────────────────────────────────

/// Create a short link
#[utoipa::path(
    post,
    path = "/links",
    request_body = CreateLinkRequest,
    responses(
        (status = 201, description = "Link created", body = LinkResponse),
        (status = 400, description = "Invalid URL or short code"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Short code already taken")
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn create_link(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    req.validate()?;

    let link = state
        .links
        .create(&claims.sub, &req.original_url, req.short_code.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LinkResponse::from_model(&state.links, link)),
    ))
}

/// List the caller's links, newest first
#[utoipa::path(
    get,
    path = "/links",
    params(
        ("page" = Option<u64>, Query, description = "1-based page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page (max 100)"),
        ("search" = Option<String>, Query, description = "Substring of URL or code")
    ),
    responses(
        (status = 200, description = "Page of links", body = LinkListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn list_links(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListLinksQuery>,
) -> Result<Json<LinkListResponse>, AppError> {
    let page = state
        .links
        .list(
            &claims.sub,
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
            query.search.as_deref(),
        )
        .await?;

    Ok(Json(LinkListResponse {
        items: page
            .items
            .into_iter()
            .map(|link| LinkResponse::from_model(&state.links, link))
            .collect(),
        page: page.page,
        per_page: page.per_page,
        total: page.total,
    }))
}

/// Get one of the caller's links
#[utoipa::path(
    get,
    path = "/links/{id}",
    params(
        ("id" = i32, Path, description = "Link ID")
    ),
    responses(
        (status = 200, description = "Link", body = LinkResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Link not found")
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn get_link(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> Result<Json<LinkResponse>, AppError> {
    let link = state.links.get(&claims.sub, id).await?;
    Ok(Json(LinkResponse::from_model(&state.links, link)))
}

/// Change the target URL and/or the short code of a link
#[utoipa::path(
    put,
    path = "/links/{id}",
    params(
        ("id" = i32, Path, description = "Link ID")
    ),
    request_body = UpdateLinkRequest,
    responses(
        (status = 200, description = "Link updated", body = LinkResponse),
        (status = 400, description = "Invalid URL or short code"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Link not found"),
        (status = 409, description = "Short code already taken")
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn update_link(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateLinkRequest>,
) -> Result<Json<LinkResponse>, AppError> {
    req.validate()?;

    let link = state
        .links
        .update(
            &claims.sub,
            id,
            req.original_url.as_deref(),
            req.short_code.as_deref(),
        )
        .await?;

    Ok(Json(LinkResponse::from_model(&state.links, link)))
}

/// Delete a link
#[utoipa::path(
    delete,
    path = "/links/{id}",
    params(
        ("id" = i32, Path, description = "Link ID")
    ),
    responses(
        (status = 204, description = "Link deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Link not found")
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn delete_link(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    state.links.delete(&claims.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
