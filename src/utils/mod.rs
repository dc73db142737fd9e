pub mod auth;
pub mod short_code;
pub mod validation;
