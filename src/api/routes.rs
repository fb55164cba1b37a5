use axum::Router;

use crate::api::state::AppState;

pub mod cache;
pub mod system;

pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(system::routes())
        .merge(cache::routes(state))
}
