pub mod dto;
mod handlers;
pub mod repo;
pub mod repo_types;
pub(crate) mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
