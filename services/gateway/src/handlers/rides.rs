use crate::auth::AuthPassenger;
use crate::error::AppError;
use crate::models::{CreateRideRequest, RideResponse};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use types::ids::RideId;
use uuid::Uuid;

pub async fn create_ride(
    State(state): State<AppState>,
    AuthPassenger(passenger_id): AuthPassenger,
    Json(payload): Json<CreateRideRequest>,
) -> Result<Json<RideResponse>, AppError> {
    state
        .rate_limiter
        .check(&format!("{}:ride_create", passenger_id), 10)?;

    let ride = state.rides.create(passenger_id, payload.into_draft())?;
    Ok(Json(RideResponse::from_ride(ride, None)))
}

pub async fn ride_status(
    State(state): State<AppState>,
    AuthPassenger(passenger_id): AuthPassenger,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, AppError> {
    let (ride, driver) = state
        .rides
        .status_for_passenger(passenger_id, RideId::from_uuid(ride_id))?;
    Ok(Json(RideResponse::from_ride(ride, driver)))
}

pub async fn list_my_rides(
    State(state): State<AppState>,
    AuthPassenger(passenger_id): AuthPassenger,
) -> Result<Json<Vec<RideResponse>>, AppError> {
    let rides = state.rides.history_for_passenger(passenger_id)?;
    Ok(Json(
        rides
            .into_iter()
            .map(|ride| RideResponse::from_ride(ride, None))
            .collect(),
    ))
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    AuthPassenger(passenger_id): AuthPassenger,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, AppError> {
    state
        .rate_limiter
        .check(&format!("{}:ride_cancel", passenger_id), 30)?;

    let ride = state
        .rides
        .cancel_by_passenger(passenger_id, RideId::from_uuid(ride_id))?;
    Ok(Json(RideResponse::from_ride(ride, None)))
}
