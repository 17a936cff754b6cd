use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use natours_booking::ensure_booking_references;
use natours_core::entity::{self, Entity};
use natours_core::query::{Filter, FilterOp, FilterValue, MAX_LIMIT};
use natours_core::{Booking, CoreError, ListQuery, Role, Tour};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppJson};
use crate::factory;
use crate::middleware::{authenticated, guarded, CurrentUser};
use crate::state::AppState;

const MANAGERS: &[Role] = &[Role::Admin, Role::LeadGuide];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/checkout-session/{tour_id}", authenticated(get(get_checkout_session), state))
        .route("/me", authenticated(get(my_tours), state))
        .route(
            "/",
            guarded(get(factory::get_all::<Booking>).post(create_booking), state, MANAGERS),
        )
        .route(
            "/{id}",
            guarded(
                get(get_booking)
                    .patch(update_booking)
                    .delete(factory::delete_one::<Booking>),
                state,
                MANAGERS,
            ),
        )
}

/// GET /api/v1/bookings/checkout-session/{tour_id}
/// Opens a provider checkout session; the booking itself arrives via webhook.
pub async fn get_checkout_session(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(tour_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tour_id = factory::parse_id(&tour_id)?;
    let session = state.checkout.create_session(tour_id, &user).await?;

    Ok(Json(json!({
        "status": "success",
        "session": session,
    })))
}

/// GET /api/v1/bookings/me
/// The tours the current user has booked.
pub async fn my_tours(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let query = ListQuery {
        filters: vec![Filter {
            field: "user".to_string(),
            op: FilterOp::Eq,
            value: FilterValue::Text(user.id.to_string()),
        }],
        limit: MAX_LIMIT,
        ..ListQuery::default()
    };
    let bookings = state.repos.bookings.find_all(query).await?;

    let mut tour_ids: Vec<Uuid> = Vec::with_capacity(bookings.len());
    for booking in &bookings {
        if !tour_ids.contains(&booking.tour) {
            tour_ids.push(booking.tour);
        }
    }

    let mut tours: Vec<Tour> = Vec::with_capacity(tour_ids.len());
    for id in tour_ids {
        match state.repos.tours.find_by_id(id).await? {
            Some(tour) => tours.push(tour),
            None => tracing::warn!("Booked tour {} no longer exists", id),
        }
    }

    let docs = tours.iter().map(entity::to_document).collect::<Result<Vec<_>, _>>()?;
    Ok(factory::many(docs))
}

/// POST /api/v1/bookings
/// Manual booking by staff; tour and user must exist.
pub async fn create_booking(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let booking: Booking = entity::build(payload)?;
    ensure_booking_references(state.repos.tours.as_ref(), state.repos.users.as_ref(), &booking).await?;

    let booking = factory::insert(&state, booking).await?;
    factory::created(&booking)
}

/// PATCH /api/v1/bookings/{id}
/// The merged booking must still point at an existing tour and user.
pub async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(patch): AppJson<Value>,
) -> Result<Json<Value>, AppError> {
    let current: Booking = factory::load(&state, &id).await?;
    let merged = entity::merge_patch(&current, patch.clone())?;
    ensure_booking_references(state.repos.tours.as_ref(), state.repos.users.as_ref(), &merged).await?;

    let booking = state
        .repos
        .bookings
        .update_by_id(current.id, patch)
        .await?
        .ok_or_else(|| CoreError::not_found(Booking::NAME, current.id))?;
    Ok(factory::single(entity::to_document(&booking)?))
}

/// GET /api/v1/bookings/{id}, with tour and user summaries embedded.
pub async fn get_booking(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, AppError> {
    let booking: Booking = factory::load(&state, &id).await?;
    let mut doc = entity::to_document(&booking)?;

    if let Some(tour) = state.repos.tours.find_by_id(booking.tour).await? {
        doc["tour"] = json!({ "id": tour.id, "name": tour.name, "price": tour.price });
    }
    if let Some(user) = state.repos.users.find_by_id(booking.user).await? {
        doc["user"] = json!({ "id": user.id, "name": user.name, "email": user.email });
    }

    Ok(factory::single(doc))
}
