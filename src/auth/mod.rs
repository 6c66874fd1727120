use crate::state::AppState;
use axum::Router;

mod claims;
pub mod cookies;
mod dto;
pub mod extractors;
mod handlers;
pub mod jwt;
pub mod password;
pub mod services;

pub use extractors::{AdminUser, AuthUser};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
