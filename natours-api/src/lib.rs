use axum::{
    http::{header, Method, Uri},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod error;
pub mod factory;
pub mod middleware;
pub mod reviews;
pub mod state;
pub mod tours;
pub mod users;
pub mod webhooks;

pub use error::AppError;
pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    let api = Router::new()
        .nest("/api/v1/tours", tours::routes(&state))
        .nest("/api/v1/users", users::routes(&state))
        .nest("/api/v1/reviews", reviews::routes(&state))
        .nest("/api/v1/bookings", bookings::routes(&state));

    Router::new()
        .merge(webhooks::routes())
        .merge(api)
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFoundError(format!("Can't find {} on this server!", uri.path()))
}
