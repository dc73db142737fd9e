pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::link_service::LinkService;
use crate::services::oidc::OidcService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::auth::login_oidc,
        api::handlers::auth::callback_oidc,
        api::handlers::auth::me,
        api::handlers::links::create_link,
        api::handlers::links::list_links,
        api::handlers::links::get_link,
        api::handlers::links::update_link,
        api::handlers::links::delete_link,
        api::handlers::redirect::follow_link,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::auth::AuthResponse,
            api::handlers::auth::MeResponse,
            api::handlers::links::CreateLinkRequest,
            api::handlers::links::UpdateLinkRequest,
            api::handlers::links::LinkResponse,
            api::handlers::links::LinkListResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "OIDC login and session endpoints"),
        (name = "links", description = "Short link management"),
        (name = "redirect", description = "Public short link resolution"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub links: Arc<LinkService>,
    pub oidc: Arc<OidcService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> anyhow::Result<Self> {
        let links = Arc::new(LinkService::new(db.clone(), config.clone()));
        let oidc = Arc::new(OidcService::new(&config)?);
        Ok(Self {
            db,
            links,
            oidc,
            config,
        })
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(origins)
}

pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/links",
            get(api::handlers::links::list_links).post(api::handlers::links::create_link),
        )
        .route(
            "/links/:id",
            get(api::handlers::links::get_link)
                .put(api::handlers::links::update_link)
                .delete(api::handlers::links::delete_link),
        )
        .route("/auth/me", get(api::handlers::auth::me))
        .layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/auth/oidc/login", get(api::handlers::auth::login_oidc))
        .route(
            "/auth/oidc/callback",
            get(api::handlers::auth::callback_oidc),
        )
        .merge(protected)
        .route("/:code", get(api::handlers::redirect::follow_link))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::security::security_headers))
        .layer(cors_layer(&state.config))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
