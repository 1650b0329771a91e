use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod store;

pub use extract::{CurrentUser, MaybeUser};

pub fn router() -> Router<AppState> {
    handlers::session_routes()
}
