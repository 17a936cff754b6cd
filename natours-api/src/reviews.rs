use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use natours_core::entity::{self, Entity};
use natours_core::query::{Filter, FilterOp, FilterValue, MAX_LIMIT};
use natours_core::{CoreError, CoreResult, ListQuery, Review, Role, Tour, User};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppJson};
use crate::factory::{self, QueryParams};
use crate::middleware::{authenticated, guarded, CurrentUser};
use crate::state::AppState;

const AUTHORS: &[Role] = &[Role::User];
const EDITORS: &[Role] = &[Role::User, Role::Admin];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            authenticated(get(factory::get_all::<Review>), state).merge(guarded(post(create_review), state, AUTHORS)),
        )
        .route(
            "/{id}",
            authenticated(get(factory::get_one::<Review>), state)
                .merge(guarded(patch(update_review).delete(delete_review), state, EDITORS)),
        )
}

pub fn tour_filter(tour: Uuid) -> Filter {
    Filter {
        field: "tour".to_string(),
        op: FilterOp::Eq,
        value: FilterValue::Text(tour.to_string()),
    }
}

/// GET /api/v1/tours/{id}/reviews
pub async fn get_tour_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): QueryParams,
) -> Result<Json<Value>, AppError> {
    let tour = factory::parse_id(&id)?;
    let mut query = ListQuery::parse(params)?;
    query.filters.push(tour_filter(tour));
    factory::list::<Review>(&state, &query).await
}

/// POST /api/v1/tours/{id}/reviews
pub async fn create_tour_review(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let tour = factory::parse_id(&id)?;
    insert_review(&state, user.id, Some(tour), payload).await
}

/// POST /api/v1/reviews
pub async fn create_review(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppJson(payload): AppJson<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    insert_review(&state, user.id, None, payload).await
}

async fn insert_review(
    state: &AppState,
    author: Uuid,
    tour: Option<Uuid>,
    payload: Value,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Value::Object(mut fields) = payload else {
        return Err(AppError::ValidationError("Review payload must be a JSON object".to_string()));
    };
    // Reviews are always written as the caller.
    fields.insert("user".to_string(), json!(author));
    if let Some(tour) = tour {
        fields.insert("tour".to_string(), json!(tour));
    }

    let review: Review = entity::build(Value::Object(fields))?;
    if state.repos.tours.find_by_id(review.tour).await?.is_none() {
        return Err(CoreError::not_found("Tour", review.tour).into());
    }

    let review = factory::insert(state, review).await?;
    refresh_tour_ratings(state, review.tour).await?;
    factory::created(&review)
}

/// PATCH /api/v1/reviews/{id}
/// Authors edit their own reviews; admins may edit any. `user` and `tour`
/// are fixed at creation and dropped from the patch.
pub async fn update_review(
    State(state): State<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(id): Path<String>,
    AppJson(patch): AppJson<Value>,
) -> Result<Json<Value>, AppError> {
    let Value::Object(mut fields) = patch else {
        return Err(AppError::ValidationError("Review payload must be a JSON object".to_string()));
    };
    let current: Review = factory::load(&state, &id).await?;
    ensure_may_edit(&caller, &current)?;

    fields.remove("user");
    fields.remove("tour");
    let review = state
        .repos
        .reviews
        .update_by_id(current.id, Value::Object(fields))
        .await?
        .ok_or_else(|| CoreError::not_found(Review::NAME, current.id))?;

    refresh_tour_ratings(&state, current.tour).await?;
    Ok(factory::single(entity::to_document(&review)?))
}

/// DELETE /api/v1/reviews/{id}
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let review: Review = factory::load(&state, &id).await?;
    ensure_may_edit(&caller, &review)?;

    if !state.repos.reviews.delete_by_id(review.id).await? {
        return Err(CoreError::not_found(Review::NAME, review.id).into());
    }

    refresh_tour_ratings(&state, review.tour).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_may_edit(caller: &User, review: &Review) -> Result<(), AppError> {
    if review.user == caller.id || caller.role == Role::Admin {
        return Ok(());
    }
    tracing::warn!("User {} tried to modify review {} owned by {}", caller.id, review.id, review.user);
    Err(AppError::AuthorizationError("You can only modify your own reviews".to_string()))
}

/// Recomputes `ratingsAverage` and `ratingsQuantity` from all of the tour's reviews.
pub async fn refresh_tour_ratings(state: &AppState, tour: Uuid) -> CoreResult<()> {
    let query = ListQuery {
        filters: vec![tour_filter(tour)],
        limit: MAX_LIMIT,
        ..ListQuery::default()
    };
    let reviews = state.repos.reviews.find_all(query).await?;
    let (average, quantity) = rating_summary(&reviews);

    let patch = json!({ "ratingsAverage": average, "ratingsQuantity": quantity });
    if state.repos.tours.update_by_id(tour, patch).await?.is_none() {
        tracing::warn!("Tour {} disappeared while refreshing ratings", tour);
    }
    Ok(())
}

fn rating_summary(reviews: &[Review]) -> (f64, u32) {
    if reviews.is_empty() {
        return (Tour::DEFAULT_RATING, 0);
    }
    let total: f64 = reviews.iter().map(|r| r.rating).sum();
    let average = total / reviews.len() as f64;
    ((average * 10.0).round() / 10.0, reviews.len() as u32)
}
