pub mod billing;
pub mod health;
pub mod webhook;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(billing::router())
        .merge(webhook::router())
        .merge(health::router())
}
