//! Generic CRUD handlers shared by every collection.
//!
//! Each handler is instantiated per entity, e.g. `get(factory::get_all::<Tour>)`.
//! Authorisation is applied by the router in front of them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use natours_core::entity::{self, Entity};
use natours_core::{CoreError, CoreResult, ListQuery};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppJson};
use crate::state::{AppState, HasRepository};

pub type QueryParams = Query<Vec<(String, String)>>;

pub async fn create_one<E: Entity>(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Value>,
) -> Result<(StatusCode, Json<Value>), AppError>
where
    AppState: HasRepository<E>,
{
    let record: E = entity::build(public_payload::<E>(payload))?;
    let record = insert(&state, record).await?;
    created(&record)
}

pub async fn get_one<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError>
where
    AppState: HasRepository<E>,
{
    let record: E = load(&state, &id).await?;
    Ok(single(entity::to_public_document(&record)?))
}

pub async fn get_all<E: Entity>(
    State(state): State<AppState>,
    Query(params): QueryParams,
) -> Result<Json<Value>, AppError>
where
    AppState: HasRepository<E>,
{
    let query = ListQuery::parse(params)?;
    list::<E>(&state, &query).await
}

pub async fn update_one<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(patch): AppJson<Value>,
) -> Result<Json<Value>, AppError>
where
    AppState: HasRepository<E>,
{
    let id = parse_id(&id)?;
    let record = HasRepository::<E>::repository(&state)
        .update_by_id(id, public_payload::<E>(patch))
        .await?
        .ok_or_else(|| CoreError::not_found(E::NAME, id))?;

    tracing::info!("{} {} updated", E::NAME, id);
    Ok(single(entity::to_public_document(&record)?))
}

pub async fn delete_one<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError>
where
    AppState: HasRepository<E>,
{
    let id = parse_id(&id)?;
    if !HasRepository::<E>::repository(&state).delete_by_id(id).await? {
        return Err(CoreError::not_found(E::NAME, id).into());
    }

    tracing::info!("{} {} deleted", E::NAME, id);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Building blocks for handlers with extra rules
// ============================================================================

pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::ValidationError(format!("Invalid id: {}", raw)))
}

pub async fn load<E: Entity>(state: &AppState, id: &str) -> Result<E, AppError>
where
    AppState: HasRepository<E>,
{
    let id = parse_id(id)?;
    HasRepository::<E>::repository(state)
        .find_by_id(id)
        .await?
        .ok_or_else(|| CoreError::not_found(E::NAME, id).into())
}

pub async fn insert<E: Entity>(state: &AppState, record: E) -> Result<E, AppError>
where
    AppState: HasRepository<E>,
{
    let record = HasRepository::<E>::repository(state).create(record).await?;
    tracing::info!("{} {} created", E::NAME, record.id());
    Ok(record)
}

pub async fn list<E: Entity>(state: &AppState, query: &ListQuery) -> Result<Json<Value>, AppError>
where
    AppState: HasRepository<E>,
{
    let private = query
        .filters
        .iter()
        .map(|filter| filter.field.as_str())
        .chain(query.sort.iter().map(|key| key.field.as_str()))
        .find(|field| entity::is_private::<E>(field));
    if let Some(field) = private {
        return Err(AppError::ValidationError(format!("Cannot query on field: {}", field)));
    }

    let records = HasRepository::<E>::repository(state).find(query).await?;
    let docs = records
        .iter()
        .map(|record| entity::to_public_document(record).map(|doc| query.project(doc)))
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(many(docs))
}

pub fn created<E: Entity>(record: &E) -> Result<(StatusCode, Json<Value>), AppError> {
    Ok((StatusCode::CREATED, single(entity::to_public_document(record)?)))
}

/// Client payloads never carry private fields; non-objects pass through for `build` to reject.
fn public_payload<E: Entity>(payload: Value) -> Value {
    match payload {
        Value::Object(mut fields) => {
            entity::strip_private::<E>(&mut fields);
            Value::Object(fields)
        }
        other => other,
    }
}

pub fn single(doc: Value) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { "data": doc },
    }))
}

pub fn many(docs: Vec<Value>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": docs.len(),
        "data": { "data": docs },
    }))
}
