use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use axum_extra::headers::{authorization::Bearer, Authorization, Cookie, HeaderMapExt};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use natours_core::{Role, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

pub const JWT_COOKIE: &str = "jwt";
const LOGGED_OUT: &str = "loggedout";

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated account, inserted into request extensions by `protect`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: now,
        exp: now + auth.expiration as i64,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

/// `Set-Cookie` value carrying the token; browsers send it back on every request.
pub fn token_cookie(auth: &AuthConfig, token: &str) -> Result<HeaderValue, AppError> {
    cookie_header(token, auth.expiration, auth.cookie_secure)
}

/// Overwrites the token cookie with a short-lived placeholder.
pub fn logout_cookie(auth: &AuthConfig) -> Result<HeaderValue, AppError> {
    cookie_header(LOGGED_OUT, 10, auth.cookie_secure)
}

fn cookie_header(value: &str, max_age: u64, secure: bool) -> Result<HeaderValue, AppError> {
    let mut cookie = format!("{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax", JWT_COOKIE, value, max_age);
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::InternalServerError(format!("Invalid cookie: {}", e)))
}

fn request_token(headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }
    headers
        .typed_get::<Cookie>()
        .and_then(|cookies| cookies.get(JWT_COOKIE).map(str::to_string))
        .filter(|token| token != LOGGED_OUT)
}

// ============================================================================
// Middleware
// ============================================================================

pub async fn protect(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let token = request_token(req.headers()).ok_or_else(|| {
        AppError::AuthenticationError("You are not logged in! Please log in to get access.".to_string())
    })?;

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::AuthenticationError("Invalid token. Please log in again!".to_string())
    })?;

    let user = state
        .repos
        .users
        .find_by_id(token_data.claims.sub)
        .await?
        .filter(|user| user.active)
        .ok_or_else(|| {
            AppError::AuthenticationError("The user belonging to this token no longer exists.".to_string())
        })?;

    if user.changed_password_after(token_data.claims.iat) {
        return Err(AppError::AuthenticationError(
            "User recently changed password! Please log in again.".to_string(),
        ));
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

pub async fn restrict_to(State(roles): State<&'static [Role]>, req: Request, next: Next) -> Result<Response, AppError> {
    let role = req
        .extensions()
        .get::<CurrentUser>()
        .map(|current| current.0.role)
        .ok_or_else(|| AppError::AuthenticationError("You are not logged in! Please log in to get access.".to_string()))?;

    if !roles.contains(&role) {
        return Err(AppError::AuthorizationError(
            "You do not have permission to perform this action".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Requires a valid token on every method of `route`.
pub fn authenticated(route: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.clone(), protect))
}

/// Requires a valid token and one of `roles`.
pub fn guarded(route: MethodRouter<AppState>, state: &AppState, roles: &'static [Role]) -> MethodRouter<AppState> {
    authenticated(route.route_layer(from_fn_with_state(roles, restrict_to)), state)
}
