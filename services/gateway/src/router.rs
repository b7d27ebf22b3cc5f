use crate::handlers::{drivers, rides};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/rides", post(rides::create_ride).get(rides::list_my_rides))
        .route("/rides/:id", get(rides::ride_status))
        .route("/rides/:id/cancel", post(rides::cancel_ride))
        .route("/drivers/me", get(drivers::me))
        .route("/drivers/availability", put(drivers::set_availability))
        .route("/drivers/location", put(drivers::set_location))
        .route("/drivers/offers", get(drivers::active_offers))
        .route("/drivers/offers/:id/accept", post(drivers::accept_offer))
        .route("/drivers/offers/:id/reject", post(drivers::reject_offer))
        .route("/drivers/rides", get(drivers::my_rides))
        .route("/drivers/rides/:id/status", post(drivers::report_ride_status));

    Router::new()
        .nest("/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
