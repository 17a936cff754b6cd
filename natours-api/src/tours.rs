use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use natours_core::entity::{self, Entity};
use natours_core::query::MAX_LIMIT;
use natours_core::{CoreResult, ListQuery, Review, Role, Tour};
use serde_json::Value;

use crate::error::AppError;
use crate::factory::{self, QueryParams};
use crate::middleware::guarded;
use crate::reviews;
use crate::state::AppState;

const MANAGERS: &[Role] = &[Role::Admin, Role::LeadGuide];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(factory::get_all::<Tour>).merge(guarded(post(factory::create_one::<Tour>), state, MANAGERS)),
        )
        .route("/top-5-cheap", get(top_five_cheap))
        .route(
            "/{id}",
            get(get_tour).merge(guarded(
                patch(factory::update_one::<Tour>).delete(factory::delete_one::<Tour>),
                state,
                MANAGERS,
            )),
        )
        .route(
            "/{id}/reviews",
            get(reviews::get_tour_reviews).merge(guarded(post(reviews::create_tour_review), state, &[Role::User])),
        )
}

/// GET /api/v1/tours/{id}, with the tour's reviews embedded.
pub async fn get_tour(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, AppError> {
    let tour: Tour = factory::load(&state, &id).await?;
    let reviews = reviews_of(&state, &tour).await?;

    let mut doc = entity::to_document(&tour)?;
    doc["reviews"] = Value::Array(reviews);
    Ok(factory::single(doc))
}

/// GET /api/v1/tours/top-5-cheap: best rated, then cheapest.
pub async fn top_five_cheap(
    State(state): State<AppState>,
    Query(params): QueryParams,
) -> Result<Json<Value>, AppError> {
    let alias = [
        ("limit", "5"),
        ("sort", "-ratingsAverage,price"),
        ("fields", "name,price,ratingsAverage,summary,difficulty"),
    ]
    .map(|(k, v)| (k.to_string(), v.to_string()));

    let query = ListQuery::parse(params.into_iter().chain(alias))?;
    factory::list::<Tour>(&state, &query).await
}

async fn reviews_of(state: &AppState, tour: &Tour) -> CoreResult<Vec<Value>> {
    let query = ListQuery {
        filters: vec![reviews::tour_filter(tour.id())],
        limit: MAX_LIMIT,
        ..ListQuery::default()
    };

    let reviews: Vec<Review> = state.repos.reviews.find_all(query).await?;
    reviews.iter().map(entity::to_document).collect()
}
