use crate::auth::AuthDriver;
use crate::error::AppError;
use crate::models::{
    AcceptedRideResponse, DriverResponse, OfferResponse, RideResponse, RideStatusUpdateRequest,
    SetAvailabilityRequest, SetLocationRequest,
};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use types::ids::{OfferId, RideId};
use uuid::Uuid;

pub async fn me(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
) -> Result<Json<DriverResponse>, AppError> {
    let driver = state.registry.get(driver_id)?;
    Ok(Json(driver.into()))
}

pub async fn set_availability(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
    Json(payload): Json<SetAvailabilityRequest>,
) -> Result<Json<DriverResponse>, AppError> {
    state
        .rate_limiter
        .check(&format!("{}:availability", driver_id), 60)?;

    let update = payload.into_update()?;
    let driver = state.registry.set_availability(driver_id, update)?;
    Ok(Json(driver.into()))
}

pub async fn set_location(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
    Json(payload): Json<SetLocationRequest>,
) -> Result<Json<DriverResponse>, AppError> {
    // Location pings are the chattiest write a driver sends.
    state
        .rate_limiter
        .check(&format!("{}:location", driver_id), 120)?;

    let driver = state
        .registry
        .set_location(driver_id, payload.lat, payload.lng)?;
    Ok(Json(driver.into()))
}

/// Standing offers only: the implicit sweep runs first, so nothing past its
/// deadline and nothing a peer already won is ever returned.
pub async fn active_offers(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
) -> Result<Json<Vec<OfferResponse>>, AppError> {
    let offers = state.offers.active(driver_id)?;
    Ok(Json(
        offers
            .into_iter()
            .map(|(offer, ride)| OfferResponse::from_pair(offer, ride))
            .collect(),
    ))
}

pub async fn accept_offer(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
    Path(offer_id): Path<Uuid>,
) -> Result<Json<AcceptedRideResponse>, AppError> {
    state
        .rate_limiter
        .check(&format!("{}:offer_accept", driver_id), 30)?;

    let accepted = state
        .offers
        .accept(driver_id, OfferId::from_uuid(offer_id))?;
    let passenger = accepted.passenger;
    Ok(Json(AcceptedRideResponse {
        ride: RideResponse::from_ride(accepted.ride, None),
        passenger_name: passenger.name,
        passenger_phone: passenger.phone,
    }))
}

pub async fn reject_offer(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
    Path(offer_id): Path<Uuid>,
) -> Result<Json<OfferResponse>, AppError> {
    state
        .rate_limiter
        .check(&format!("{}:offer_reject", driver_id), 30)?;

    let offer = state
        .offers
        .reject(driver_id, OfferId::from_uuid(offer_id))?;
    let ride = state
        .store
        .get_ride(offer.ride_request_id)?
        .ok_or_else(|| types::errors::CoreError::internal("ride row missing for offer"))?;
    Ok(Json(OfferResponse::from_pair(offer, ride)))
}

pub async fn my_rides(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
) -> Result<Json<Vec<RideResponse>>, AppError> {
    let rides = state.rides.history_for_driver(driver_id)?;
    Ok(Json(
        rides
            .into_iter()
            .map(|ride| RideResponse::from_ride(ride, None))
            .collect(),
    ))
}

pub async fn report_ride_status(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
    Path(ride_id): Path<Uuid>,
    Json(payload): Json<RideStatusUpdateRequest>,
) -> Result<Json<RideResponse>, AppError> {
    state
        .rate_limiter
        .check(&format!("{}:ride_status", driver_id), 30)?;

    let ride = state.rides.driver_report_status(
        driver_id,
        RideId::from_uuid(ride_id),
        payload.status,
    )?;
    Ok(Json(RideResponse::from_ride(ride, None)))
}
