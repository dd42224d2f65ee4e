pub mod reply;
pub mod session;
pub mod upload;

use crate::state::AppState;
use axum::Router;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(reply::routes(state.clone()))
        .merge(session::routes(state.clone()))
        .merge(upload::routes(state))
}
