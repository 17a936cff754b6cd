use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use natours_core::entity;
use natours_core::notify::MailMessage;
use natours_core::password::{self, RESET_TOKEN_TTL_MINUTES};
use natours_core::{CoreError, ListQuery, Role, User};
use natours_shared::Masked;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{AppError, AppJson};
use crate::factory;
use crate::middleware::{authenticated, guarded, issue_token, logout_cookie, token_cookie, CurrentUser};
use crate::state::AppState;

const ADMINS: &[Role] = &[Role::Admin];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgotPassword", post(forgot_password))
        .route("/resetPassword/{token}", patch(reset_password))
        .route("/updateMyPassword", authenticated(patch(update_my_password), state))
        .route("/me", authenticated(get(get_me).patch(update_me).delete(delete_me), state))
        .route(
            "/",
            guarded(get(factory::get_all::<User>).post(factory::create_one::<User>), state, ADMINS),
        )
        .route(
            "/{id}",
            guarded(
                get(factory::get_one::<User>)
                    .patch(factory::update_one::<User>)
                    .delete(factory::delete_one::<User>),
                state,
                ADMINS,
            ),
        )
}

// ============================================================================
// Signup & login
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: Masked<String>,
    pub password_confirm: Masked<String>,
    pub photo: Option<String>,
}

/// POST /api/v1/users/signup
/// Creates a `user` account and logs it in.
pub async fn signup(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignupRequest>,
) -> Result<Response, AppError> {
    password::validate_new_password(&req.password.0, &req.password_confirm.0)?;
    let hash = hash_password(req.password.into_inner()).await?;

    let mut payload = json!({ "name": req.name, "email": req.email, "passwordHash": hash });
    if let Some(photo) = req.photo {
        payload["photo"] = json!(photo);
    }

    let user: User = entity::build(payload)?;
    let user = factory::insert(&state, user).await?;
    tracing::info!(user_id = %user.id, email = %Masked(&user.email), "New signup");

    let url = format!("{}/me", state.base_url);
    if let Err(e) = state.mailer.send(MailMessage::welcome(&user, &url)).await {
        tracing::warn!("Welcome email to {} failed: {}", Masked(&user.email), e);
    }

    token_response(&state, &user, StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<Masked<String>>,
}

/// POST /api/v1/users/login
pub async fn login(State(state): State<AppState>, AppJson(req): AppJson<LoginRequest>) -> Result<Response, AppError> {
    let (Some(email), Some(Masked(candidate))) = (req.email, req.password) else {
        return Err(AppError::ValidationError("Please provide email and password!".to_string()));
    };

    let incorrect = || AppError::AuthenticationError("Incorrect email or password".to_string());
    let user = active_user_by_email(&state, &email).await?.ok_or_else(incorrect)?;
    if !password_matches(&user, candidate).await? {
        tracing::info!("Failed login for {}", Masked(&user.email));
        return Err(incorrect());
    }

    token_response(&state, &user, StatusCode::OK)
}

/// GET /api/v1/users/logout
pub async fn logout(State(state): State<AppState>) -> Result<Response, AppError> {
    let cookie = logout_cookie(&state.auth)?;
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(json!({ "status": "success" }))).into_response())
}

// ============================================================================
// Password management
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: Masked<String>,
    pub password: Masked<String>,
    pub password_confirm: Masked<String>,
}

/// PATCH /api/v1/users/updateMyPassword
/// Requires the current password; tokens issued before the change stop working.
pub async fn update_my_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppJson(req): AppJson<UpdatePasswordRequest>,
) -> Result<Response, AppError> {
    if !password_matches(&user, req.password_current.into_inner()).await? {
        return Err(AppError::AuthenticationError("Your current password is wrong.".to_string()));
    }

    let user = store_new_password(&state, &user, req.password, req.password_confirm, json!({})).await?;
    tracing::info!("User {} changed their password", user.id);
    token_response(&state, &user, StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// POST /api/v1/users/forgotPassword
/// Mails a single-use reset link; only the token's digest is stored.
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let user = active_user_by_email(&state, &req.email)
        .await?
        .ok_or_else(|| AppError::NotFoundError("There is no user with email address.".to_string()))?;

    let (token, digest) = password::new_reset_token();
    let expires = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    update_user(&state, &user, json!({ "passwordResetToken": digest, "passwordResetExpires": expires })).await?;

    let url = format!("{}/api/v1/users/resetPassword/{}", state.base_url, token);
    if let Err(e) = state.mailer.send(MailMessage::password_reset(&user, &url)).await {
        tracing::error!("Password reset email to {} failed: {}", Masked(&user.email), e);
        update_user(&state, &user, json!({ "passwordResetToken": null, "passwordResetExpires": null })).await?;
        return Err(AppError::InternalServerError(
            "There was an error sending the email. Try again later!".to_string(),
        ));
    }

    Ok(Json(json!({ "status": "success", "message": "Token sent to email!" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: Masked<String>,
    pub password_confirm: Masked<String>,
}

/// PATCH /api/v1/users/resetPassword/{token}
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    let digest = password::digest_reset_token(&token);
    let user = state
        .repos
        .users
        .find_one(ListQuery::by_field("passwordResetToken", digest))
        .await?
        .filter(|user| user.active && user.reset_token_valid_at(Utc::now()))
        .ok_or_else(|| AppError::ValidationError("Token is invalid or has expired".to_string()))?;

    let consumed = json!({ "passwordResetToken": null, "passwordResetExpires": null });
    let user = store_new_password(&state, &user, req.password, req.password_confirm, consumed).await?;
    tracing::info!("User {} reset their password", user.id);
    token_response(&state, &user, StatusCode::OK)
}

/// Validates, hashes and saves a new password along with `extra` fields.
/// `passwordChangedAt` lands a second in the past so the token issued next is newer.
async fn store_new_password(
    state: &AppState,
    user: &User,
    password: Masked<String>,
    confirm: Masked<String>,
    extra: Value,
) -> Result<User, AppError> {
    password::validate_new_password(&password.0, &confirm.0)?;
    let hash = hash_password(password.into_inner()).await?;

    let mut patch = json!({
        "passwordHash": hash,
        "passwordChangedAt": Utc::now() - Duration::seconds(1),
    });
    if let (Value::Object(patch), Value::Object(extra)) = (&mut patch, extra) {
        patch.extend(extra);
    }
    update_user(state, user, patch).await
}

// Argon2 blocks for tens of milliseconds; run it on the blocking pool.
async fn hash_password(plain: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))??;
    Ok(hash)
}

async fn password_matches(user: &User, candidate: String) -> Result<bool, AppError> {
    let user = user.clone();
    tokio::task::spawn_blocking(move || user.password_matches(&candidate))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))
}

async fn active_user_by_email(state: &AppState, email: &str) -> Result<Option<User>, AppError> {
    let email = email.trim().to_lowercase();
    let user = state.repos.users.find_one(ListQuery::by_field("email", email)).await?;
    Ok(user.filter(|user| user.active))
}

async fn update_user(state: &AppState, user: &User, patch: Value) -> Result<User, AppError> {
    let updated = state
        .repos
        .users
        .update_by_id(user.id, patch)
        .await?
        .ok_or_else(|| CoreError::not_found("User", user.id))?;
    Ok(updated)
}

/// Issues a fresh token as both body field and cookie.
fn token_response(state: &AppState, user: &User, status: StatusCode) -> Result<Response, AppError> {
    let token = issue_token(&state.auth, user)?;
    let cookie = token_cookie(&state.auth, &token)?;
    let body = Json(json!({
        "status": "success",
        "token": token,
        "data": { "user": entity::to_public_document(user)? },
    }));

    Ok((status, [(header::SET_COOKIE, cookie)], body).into_response())
}

// ============================================================================
// Current user
// ============================================================================

pub async fn get_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Result<Json<Value>, AppError> {
    Ok(factory::single(entity::to_public_document(&user)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub password: Option<Masked<String>>,
    pub password_confirm: Option<Masked<String>>,
}

/// PATCH /api/v1/users/me
/// Only profile fields; role and status stay with administrators.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppJson(req): AppJson<UpdateMeRequest>,
) -> Result<Json<Value>, AppError> {
    if req.password.is_some() || req.password_confirm.is_some() {
        return Err(AppError::ValidationError(
            "This route is not for password updates. Please use /updateMyPassword.".to_string(),
        ));
    }

    let mut patch = Map::new();
    for (key, value) in [("name", req.name), ("email", req.email), ("photo", req.photo)] {
        if let Some(value) = value {
            patch.insert(key.to_string(), Value::String(value));
        }
    }

    let updated = update_user(&state, &user, Value::Object(patch)).await?;
    Ok(factory::single(entity::to_public_document(&updated)?))
}

/// DELETE /api/v1/users/me
/// Deactivates the account; its token stops working.
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<StatusCode, AppError> {
    update_user(&state, &user, json!({ "active": false })).await?;

    tracing::info!("User {} deactivated", user.id);
    Ok(StatusCode::NO_CONTENT)
}
