pub mod janitor;
pub mod link_cache;
pub mod link_service;
pub mod oidc;
