pub mod cases;
pub mod customers;
pub mod health;
pub mod technicians;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(cases::router())
        .merge(customers::router())
        .merge(technicians::router())
}
